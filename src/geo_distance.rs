//! Great-circle distance between coordinate pairs.
//!
//! Uses the haversine formula on a spherical earth (mean radius 6 371 008.8 m).
//! Nothing here validates coordinates: NaN or out-of-range input yields NaN,
//! which the validator reports later.
use geo::{point, HaversineDistance};
use serde::{Deserialize, Serialize};

pub const METERS_PER_MILE: f64 = 1609.344;
pub const FEET_PER_MILE: f64 = 5280.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Miles,
    Kilometers,
    Meters,
}

impl DistanceUnit {
    fn from_meters(self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Miles => meters / METERS_PER_MILE,
            DistanceUnit::Kilometers => meters / 1000.0,
            DistanceUnit::Meters => meters,
        }
    }
}

/// Distance between two (latitude, longitude) pairs in degrees.
pub fn distance(a: (f64, f64), b: (f64, f64), unit: DistanceUnit) -> f64 {
    let from = point!(x: a.1, y: a.0);
    let to = point!(x: b.1, y: b.0);
    unit.from_meters(from.haversine_distance(&to))
}

pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance((lat1, lon1), (lat2, lon2), DistanceUnit::Miles)
}
