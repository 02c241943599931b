//! Course profile assembly.
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::climbs::ClimbSegment;
use crate::error::{EngineError, Result};
use crate::technical::TechnicalSection;
use crate::track::{BoundingBox, Track, TrackPoint};

/// Caller-supplied labels for a course. Nothing here is validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub name: String,
    pub location: Option<String>,
    pub source_kind: String,
    pub source: String,
}

impl CourseMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        CourseMetadata {
            name: name.into(),
            location: None,
            source_kind: "gps".to_string(),
            source: "unknown".to_string(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_source(mut self, kind: impl Into<String>, source: impl Into<String>) -> Self {
        self.source_kind = kind.into();
        self.source = source.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub kind: String,
    pub source: String,
    pub total_gps_points: usize,
    /// Share of points whose elevation came from the device rather than interpolation.
    pub native_elevation_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationRange {
    pub min_ft: f64,
    pub max_ft: f64,
}

impl ElevationRange {
    /// Widens the range to cover `elevation_ft`. A NaN anywhere poisons both ends.
    pub fn including(self, elevation_ft: f64) -> Self {
        if elevation_ft.is_nan() || self.min_ft.is_nan() || self.max_ft.is_nan() {
            return ElevationRange {
                min_ft: f64::NAN,
                max_ft: f64::NAN,
            };
        }
        ElevationRange {
            min_ft: self.min_ft.min(elevation_ft),
            max_ft: self.max_ft.max(elevation_ft),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.min_ft.is_finite() && self.max_ft.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProfile {
    pub name: String,
    pub location: Option<String>,
    pub total_distance_miles: f64,
    pub total_elevation_gain_ft: f64,
    pub climbs: Vec<ClimbSegment>,
    pub technical_sections: Vec<TechnicalSection>,
    pub bounds: BoundingBox,
    /// Range of the unsmoothed elevations.
    pub elevation_range: ElevationRange,
    pub data_source: DataSource,
}

pub fn build_profile(
    metadata: &CourseMetadata,
    track: &Track,
    climbs: Vec<ClimbSegment>,
    technical_sections: Vec<TechnicalSection>,
) -> Result<CourseProfile> {
    let first = track.points.first().ok_or(EngineError::EmptyTrack)?;

    let elevation_range = track.points.iter().skip(1).fold(
        ElevationRange {
            min_ft: first.raw_elevation_ft,
            max_ft: first.raw_elevation_ft,
        },
        |r, p| r.including(p.raw_elevation_ft),
    );
    if !elevation_range.is_finite() {
        warn!("Track '{}' carries non-finite elevation values", metadata.name);
    }

    let profile = CourseProfile {
        name: metadata.name.clone(),
        location: metadata.location.clone(),
        total_distance_miles: track.total_distance_miles(),
        total_elevation_gain_ft: total_elevation_gain(&track.points),
        climbs,
        technical_sections,
        bounds: track.bounds,
        elevation_range,
        data_source: DataSource {
            kind: metadata.source_kind.clone(),
            source: metadata.source.clone(),
            total_gps_points: track.points.len(),
            native_elevation_fraction: track.native_elevation_fraction(),
        },
    };

    info!(
        "Built profile '{}': {:.1}mi, {:.0}ft gain, {} climbs, {} technical sections",
        profile.name,
        profile.total_distance_miles,
        profile.total_elevation_gain_ft,
        profile.climbs.len(),
        profile.technical_sections.len()
    );

    Ok(profile)
}

/// Sum of positive steps in smoothed elevation; descents never subtract.
pub fn total_elevation_gain(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].elevation_ft - w[0].elevation_ft).max(0.0))
        .sum()
}
