use thiserror::Error;

/// Failures of the engine itself. Bad *data* is never an error here: out-of-range
/// elevations, GPS gaps and impossible grades are reported as validation issues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("insufficient track data: {points} waypoint(s), at least 2 required")]
    InsufficientData { points: usize },
    #[error("ingestion produced an empty track")]
    EmptyTrack,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
