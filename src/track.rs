//! Track ingestion: raw waypoints in, ordered distance-annotated track points out.
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::geo_distance::haversine_miles;

/// A single raw GPS sample. Elevation is in feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_ft: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64, elevation_ft: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            elevation_ft,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Cumulative distance from the first point.
    pub distance_miles: f64,
    /// Native elevation, or the interpolated/held value when the sample had none.
    pub raw_elevation_ft: f64,
    /// Elevation after smoothing; equals `raw_elevation_ft` until a smoother runs.
    pub elevation_ft: f64,
    pub elevation_interpolated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn from_points(points: &[TrackPoint]) -> Option<Self> {
        let first = points.first()?;
        let init = BoundingBox {
            min_lat: first.latitude,
            max_lat: first.latitude,
            min_lon: first.longitude,
            max_lon: first.longitude,
        };
        Some(points.iter().skip(1).fold(init, |b, p| BoundingBox {
            min_lat: b.min_lat.min(p.latitude),
            max_lat: b.max_lat.max(p.latitude),
            min_lon: b.min_lon.min(p.longitude),
            max_lon: b.max_lon.max(p.longitude),
        }))
    }

    pub fn is_well_formed(&self) -> bool {
        self.min_lat <= self.max_lat
            && self.min_lon <= self.max_lon
            && (-90.0..=90.0).contains(&self.min_lat)
            && (-90.0..=90.0).contains(&self.max_lat)
            && (-180.0..=180.0).contains(&self.min_lon)
            && (-180.0..=180.0).contains(&self.max_lon)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub points: Vec<TrackPoint>,
    pub bounds: BoundingBox,
    pub native_elevation_points: usize,
}

impl Track {
    pub fn total_distance_miles(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.distance_miles)
    }

    pub fn native_elevation_fraction(&self) -> f64 {
        if self.points.is_empty() {
            0.0
        } else {
            self.native_elevation_points as f64 / self.points.len() as f64
        }
    }
}

pub fn ingest(waypoints: &[Waypoint]) -> Result<Track> {
    if waypoints.len() < 2 {
        return Err(EngineError::InsufficientData {
            points: waypoints.len(),
        });
    }

    let distances = cumulative_distances(waypoints);
    let native: Vec<Option<f64>> = waypoints.iter().map(|w| w.elevation_ft).collect();
    let native_elevation_points = native.iter().filter(|e| e.is_some()).count();
    let filled = fill_missing_elevations(&native, &distances);

    if native_elevation_points == 0 {
        warn!("No waypoint carries elevation; track elevation held at 0 ft");
    } else if native_elevation_points < waypoints.len() {
        debug!(
            "Filled elevation for {} of {} waypoints",
            waypoints.len() - native_elevation_points,
            waypoints.len()
        );
    }

    let points: Vec<TrackPoint> = waypoints
        .iter()
        .zip(distances)
        .zip(filled)
        .zip(&native)
        .map(|(((w, distance_miles), elevation), native)| TrackPoint {
            latitude: w.latitude,
            longitude: w.longitude,
            timestamp: w.timestamp,
            distance_miles,
            raw_elevation_ft: elevation,
            elevation_ft: elevation,
            elevation_interpolated: native.is_none(),
        })
        .collect();

    let bounds = BoundingBox::from_points(&points).ok_or(EngineError::EmptyTrack)?;

    Ok(Track {
        points,
        bounds,
        native_elevation_points,
    })
}

pub fn cumulative_distances(waypoints: &[Waypoint]) -> Vec<f64> {
    let mut distances = Vec::with_capacity(waypoints.len());
    let mut total = 0.0;

    for (i, w) in waypoints.iter().enumerate() {
        if i > 0 {
            let prev = &waypoints[i - 1];
            total += haversine_miles(prev.latitude, prev.longitude, w.latitude, w.longitude);
        }
        distances.push(total);
    }

    distances
}

/// Linear interpolation between the nearest known elevations, held constant past
/// the first and last known samples.
fn fill_missing_elevations(native: &[Option<f64>], distances: &[f64]) -> Vec<f64> {
    let known: Vec<usize> = native
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.map(|_| i))
        .collect();

    let (first_known, last_known) = match (known.first(), known.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return vec![0.0; native.len()],
    };

    let mut filled = Vec::with_capacity(native.len());
    let mut next_known = 0usize;

    for (i, elevation) in native.iter().enumerate() {
        if let Some(e) = elevation {
            filled.push(*e);
            next_known += 1;
            continue;
        }

        let value = if i < first_known {
            native[first_known].unwrap_or(0.0)
        } else if i > last_known {
            native[last_known].unwrap_or(0.0)
        } else {
            let before = known[next_known - 1];
            let after = known[next_known];
            interpolate(native, distances, before, after, i)
        };
        filled.push(value);
    }

    filled
}

fn interpolate(native: &[Option<f64>], distances: &[f64], before: usize, after: usize, i: usize) -> f64 {
    let e0 = native[before].unwrap_or(0.0);
    let e1 = native[after].unwrap_or(0.0);

    let span = distances[after] - distances[before];
    let fraction = if span > 0.0 {
        (distances[i] - distances[before]) / span
    } else {
        (i - before) as f64 / (after - before) as f64
    };

    e0 + (e1 - e0) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(elevations: &[Option<f64>]) -> Vec<Waypoint> {
        elevations
            .iter()
            .enumerate()
            .map(|(i, &e)| Waypoint::new(40.0 + i as f64 * 0.001, -77.0, e))
            .collect()
    }

    #[test]
    fn test_rejects_fewer_than_two_points() {
        assert_eq!(
            ingest(&[]).unwrap_err(),
            EngineError::InsufficientData { points: 0 }
        );
        assert_eq!(
            ingest(&line(&[Some(10.0)])).unwrap_err(),
            EngineError::InsufficientData { points: 1 }
        );
    }

    #[test]
    fn test_cumulative_distance_is_monotonic() {
        let mut waypoints = line(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        // repeated coordinate
        waypoints.insert(2, waypoints[1].clone());

        let track = ingest(&waypoints).unwrap();
        let d: Vec<f64> = track.points.iter().map(|p| p.distance_miles).collect();

        assert_eq!(d[0], 0.0);
        assert_eq!(d[1], d[2]);
        assert!(d[1] > d[0]);
        assert!(d[3] > d[2]);
        assert!(d[4] > d[3]);
    }

    #[test]
    fn test_interior_gap_is_interpolated_by_distance() {
        let track = ingest(&line(&[Some(100.0), None, None, Some(400.0)])).unwrap();
        let e: Vec<f64> = track.points.iter().map(|p| p.raw_elevation_ft).collect();

        assert!((e[1] - 200.0).abs() < 1e-6);
        assert!((e[2] - 300.0).abs() < 1e-6);
        assert!(track.points[1].elevation_interpolated);
        assert!(!track.points[3].elevation_interpolated);
        assert_eq!(track.native_elevation_points, 2);
        assert_eq!(track.native_elevation_fraction(), 0.5);
    }

    #[test]
    fn test_boundary_gaps_hold_nearest_value() {
        let track = ingest(&line(&[None, Some(50.0), Some(60.0), None])).unwrap();
        let e: Vec<f64> = track.points.iter().map(|p| p.raw_elevation_ft).collect();

        assert_eq!(e, vec![50.0, 50.0, 60.0, 60.0]);
    }

    #[test]
    fn test_no_elevation_at_all() {
        let track = ingest(&line(&[None, None, None])).unwrap();
        assert!(track.points.iter().all(|p| p.raw_elevation_ft == 0.0 && p.elevation_interpolated));
        assert_eq!(track.native_elevation_fraction(), 0.0);
    }

    #[test]
    fn test_bounding_box() {
        let waypoints = vec![
            Waypoint::new(40.80, -77.90, None),
            Waypoint::new(40.70, -77.85, None),
            Waypoint::new(40.75, -77.95, None),
        ];
        let track = ingest(&waypoints).unwrap();

        assert_eq!(track.bounds.min_lat, 40.70);
        assert_eq!(track.bounds.max_lat, 40.80);
        assert_eq!(track.bounds.min_lon, -77.95);
        assert_eq!(track.bounds.max_lon, -77.85);
        assert!(track.bounds.is_well_formed());
    }
}
