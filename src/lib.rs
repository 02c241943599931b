//! Course profiling and GPS data quality validation for cycling courses.
//!
//! [`analyze_course`] turns ordered waypoints into a [`CourseProfile`] (distance,
//! elevation gain, key climbs, technical sections); [`validate_course`] scores a
//! profile, and optionally the track behind it, across eight quality categories.
pub mod batch;
pub mod climbs;
pub mod config;
pub mod document;
pub mod error;
pub mod geo_distance;
pub mod gpx_reader;
pub mod profile;
pub mod smoothing;
pub mod technical;
pub mod track;
pub mod validation;

pub use climbs::ClimbSegment;
pub use config::{ClimbConfig, EngineConfig, SmoothingConfig, TechnicalConfig, ValidationThresholds};
pub use error::{EngineError, Result};
pub use profile::{CourseMetadata, CourseProfile};
pub use technical::TechnicalSection;
pub use track::{Track, TrackPoint, Waypoint};
pub use validation::{validate_course, DataQualityReport, QualityCategory, QualityRating, ValidationIssue};

use log::debug;

/// A built profile together with the smoothed track it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseAnalysis {
    pub profile: CourseProfile,
    pub track: Track,
}

impl CourseAnalysis {
    /// Validates the profile against its own track.
    pub fn validate(&self, config: &EngineConfig) -> DataQualityReport {
        validate_course(&self.profile, Some(&self.track.points), &config.validation)
    }
}

pub fn analyze_course(
    metadata: &CourseMetadata,
    waypoints: &[Waypoint],
    config: &EngineConfig,
) -> Result<CourseAnalysis> {
    config.validate()?;

    let raw = track::ingest(waypoints)?;
    let track = smoothing::smooth_track(&raw, &config.smoothing);

    let merge_gap = climbs::resolve_merge_gap(&track.points, &config.climbs, &config.smoothing);
    debug!("Merge gap for '{}': {:.3}mi", metadata.name, merge_gap);
    let climbs = climbs::detect_climbs(&track.points, &config.climbs, merge_gap);
    let technical_sections = technical::detect_technical_sections(&track.points, &config.technical);

    let profile = profile::build_profile(metadata, &track, climbs, technical_sections)?;
    Ok(CourseAnalysis { profile, track })
}
