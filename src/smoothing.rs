//! Centered moving-average elevation smoothing.
use log::debug;

use crate::config::SmoothingConfig;
use crate::track::Track;

/// Returns a copy of `track` whose `elevation_ft` is the centered moving average of
/// `raw_elevation_ft`. Distances and coordinates are untouched.
pub fn smooth_track(track: &Track, config: &SmoothingConfig) -> Track {
    let raw: Vec<f64> = track.points.iter().map(|p| p.raw_elevation_ft).collect();

    let elevations = if config.enabled && config.window > 1 {
        debug!("Smoothing {} points with a {}-point window", raw.len(), config.window);
        centered_moving_average(&raw, config.window)
    } else {
        raw
    };

    let mut smoothed = track.clone();
    for (point, elevation) in smoothed.points.iter_mut().zip(elevations) {
        point.elevation_ft = elevation;
    }
    smoothed
}

/// Each output is the mean of up to `window` inputs centered on it; the window is
/// truncated at either end of the sequence.
pub fn centered_moving_average(data: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return data.to_vec();
    }

    let left = (window - 1) / 2;
    let right = window / 2;

    (0..data.len())
        .map(|i| {
            let start = i.saturating_sub(left);
            let end = (i + right + 1).min(data.len());
            let slice = &data[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}
