//! Engine configuration - every threshold the pipeline and the validator consume.
//!
//! All sections deserialize with `#[serde(default)]`, so a JSON file only needs to
//! name the values it overrides:
//!
//! ```json
//! { "climbs": { "min_climb_grade": 4.0 }, "validation": { "max_point_gap_miles": 0.3 } }
//! ```
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub smoothing: SmoothingConfig,
    pub climbs: ClimbConfig,
    pub technical: TechnicalConfig,
    pub validation: ValidationThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub enabled: bool,
    /// Number of points in the centered moving average.
    pub window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            enabled: true,
            window: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbConfig {
    /// Grade (%) that opens a climb.
    pub min_climb_grade: f64,
    /// Grade (%) a climb must stay above to continue. Must not exceed `min_climb_grade`.
    pub continuation_grade: f64,
    pub min_climb_length_miles: f64,
    /// Grade (%) at or below which the track counts as descending.
    pub descent_threshold: f64,
    /// Maximum gap between two climbs that still merges them. `None` derives it
    /// from the smoothing window and the mean point spacing.
    pub merge_gap_miles: Option<f64>,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        ClimbConfig {
            min_climb_grade: 3.0,
            continuation_grade: 1.0,
            min_climb_length_miles: 0.5,
            descent_threshold: -8.0,
            merge_gap_miles: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalConfig {
    pub window_miles: f64,
    /// Population variance of grade (%^2) above which a window is technical.
    pub variance_threshold: f64,
    pub min_reversals: usize,
    /// Grades flatter than this are ignored when counting reversals.
    pub reversal_min_grade: f64,
    pub descent_threshold: f64,
    pub descent_continuation_grade: f64,
    pub min_descent_length_miles: f64,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        TechnicalConfig {
            window_miles: 0.25,
            variance_threshold: 16.0,
            min_reversals: 2,
            reversal_min_grade: 2.0,
            descent_threshold: -8.0,
            descent_continuation_grade: -3.0,
            min_descent_length_miles: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    pub min_distance_miles: f64,
    pub max_distance_miles: f64,
    pub min_elevation_ft: f64,
    pub max_elevation_ft: f64,
    pub max_gain_per_mile_ft: f64,
    pub max_grade_percent: f64,
    /// Point pairs closer than this are too short for a meaningful grade.
    pub min_grade_sample_miles: f64,
    pub max_point_gap_miles: f64,
    /// A gap of at least `max_point_gap_miles * critical_gap_multiplier` is critical.
    pub critical_gap_multiplier: f64,
    pub min_native_elevation_fraction: f64,
    pub min_gps_points: usize,
    /// Total climb gain may exceed course gain by at most this factor.
    pub max_climb_gain_ratio: f64,
    /// A course climbing faster than this with no detected climbs is suspicious.
    pub climbless_gain_per_mile_ft: f64,
    pub boundary_tolerance_miles: f64,
    pub critical_category_cap: f64,
    pub critical_aggregate_cap: f64,
    pub pass_score: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        ValidationThresholds {
            min_distance_miles: 5.0,
            max_distance_miles: 200.0,
            min_elevation_ft: -500.0,
            max_elevation_ft: 29_000.0,
            max_gain_per_mile_ft: 1500.0,
            max_grade_percent: 35.0,
            min_grade_sample_miles: 0.01,
            max_point_gap_miles: 1.0,
            critical_gap_multiplier: 5.0,
            min_native_elevation_fraction: 0.9,
            min_gps_points: 10,
            max_climb_gain_ratio: 1.5,
            climbless_gain_per_mile_ft: 100.0,
            boundary_tolerance_miles: 0.01,
            critical_category_cap: 4.0,
            critical_aggregate_cap: 59.0,
            pass_score: 75.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open config {}: {}", path.display(), e))?;
        let config: EngineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.smoothing.window == 0 {
            return Err(EngineError::InvalidConfig("smoothing window must be at least 1".into()));
        }

        let climbs = &self.climbs;
        if climbs.continuation_grade > climbs.min_climb_grade {
            return Err(EngineError::InvalidConfig(format!(
                "continuation grade {} exceeds climb-start grade {}",
                climbs.continuation_grade, climbs.min_climb_grade
            )));
        }
        if climbs.descent_threshold >= 0.0 {
            return Err(EngineError::InvalidConfig("descent threshold must be negative".into()));
        }
        if climbs.min_climb_length_miles < 0.0 || climbs.merge_gap_miles.map_or(false, |g| g < 0.0) {
            return Err(EngineError::InvalidConfig("climb distances must be non-negative".into()));
        }

        if self.technical.window_miles <= 0.0 {
            return Err(EngineError::InvalidConfig("technical window must be positive".into()));
        }

        let v = &self.validation;
        if v.min_distance_miles > v.max_distance_miles || v.min_elevation_ft > v.max_elevation_ft {
            return Err(EngineError::InvalidConfig("validation bounds are inverted".into()));
        }
        if !(0.0..=10.0).contains(&v.critical_category_cap) {
            return Err(EngineError::InvalidConfig("category cap must lie in 0..=10".into()));
        }

        Ok(())
    }
}
