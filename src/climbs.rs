//! Climb segmentation over the smoothed grade signal.
//!
//! A single forward pass feeds every grade sample through [`ClimbState::step`].
//! Runs the machine closes become candidates when they are long and steep enough;
//! candidates separated by a short gap without net descent are merged, and the
//! survivors are named in order ("Climb 1", "Climb 2", ...).
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{ClimbConfig, SmoothingConfig};
use crate::geo_distance::FEET_PER_MILE;
use crate::track::TrackPoint;

/// Grade between two consecutive track points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeSample {
    /// Index of the later point of the pair.
    pub index: usize,
    pub start_mile: f64,
    pub end_mile: f64,
    pub start_elevation_ft: f64,
    pub end_elevation_ft: f64,
    /// Percent.
    pub grade: f64,
}

impl GradeSample {
    pub fn length_miles(&self) -> f64 {
        self.end_mile - self.start_mile
    }

    pub fn elevation_delta_ft(&self) -> f64 {
        self.end_elevation_ft - self.start_elevation_ft
    }
}

/// Grades of every consecutive pair with a positive horizontal distance and a
/// finite result, computed on the (smoothed) `elevation_ft`.
pub fn grade_samples(points: &[TrackPoint]) -> Vec<GradeSample> {
    points
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let run = w[1].distance_miles - w[0].distance_miles;
            if !(run > 0.0) {
                return None;
            }
            let grade = (w[1].elevation_ft - w[0].elevation_ft) / (run * FEET_PER_MILE) * 100.0;
            if !grade.is_finite() {
                return None;
            }
            Some(GradeSample {
                index: i + 1,
                start_mile: w[0].distance_miles,
                end_mile: w[1].distance_miles,
                start_elevation_ft: w[0].elevation_ft,
                end_elevation_ft: w[1].elevation_ft,
                grade,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimbSegment {
    pub name: String,
    pub start_mile: f64,
    pub length_miles: f64,
    pub avg_grade: f64,
    pub max_grade: f64,
    pub elevation_gain_ft: f64,
}

impl ClimbSegment {
    pub fn end_mile(&self) -> f64 {
        self.start_mile + self.length_miles
    }
}

/// An open or finished stretch of climbing.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimbRun {
    pub start_mile: f64,
    pub end_mile: f64,
    pub start_elevation_ft: f64,
    pub end_elevation_ft: f64,
    pub gain_ft: f64,
    pub max_grade: f64,
}

impl ClimbRun {
    fn open(sample: &GradeSample) -> Self {
        ClimbRun {
            start_mile: sample.start_mile,
            end_mile: sample.end_mile,
            start_elevation_ft: sample.start_elevation_ft,
            end_elevation_ft: sample.end_elevation_ft,
            gain_ft: sample.elevation_delta_ft().max(0.0),
            max_grade: sample.grade,
        }
    }

    fn extend(&mut self, sample: &GradeSample) {
        self.end_mile = sample.end_mile;
        self.end_elevation_ft = sample.end_elevation_ft;
        self.gain_ft += sample.elevation_delta_ft().max(0.0);
        self.max_grade = self.max_grade.max(sample.grade);
    }

    /// Joins `later` onto `self`, spanning the gap between them.
    fn absorb(&mut self, later: ClimbRun) {
        self.end_mile = later.end_mile;
        self.end_elevation_ft = later.end_elevation_ft;
        self.gain_ft += later.gain_ft;
        self.max_grade = self.max_grade.max(later.max_grade);
    }

    pub fn length_miles(&self) -> f64 {
        self.end_mile - self.start_mile
    }

    pub fn avg_grade(&self) -> f64 {
        let length = self.length_miles();
        if length > 0.0 {
            self.gain_ft / (length * FEET_PER_MILE) * 100.0
        } else {
            0.0
        }
    }

    fn qualifies(&self, config: &ClimbConfig) -> bool {
        self.length_miles() >= config.min_climb_length_miles && self.avg_grade() >= config.min_climb_grade
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClimbState {
    Neutral,
    Climbing(ClimbRun),
    Descending,
}

impl ClimbState {
    /// Advances the machine by one grade sample. Returns the next state and, when a
    /// climb just ended, the finished run.
    pub fn step(self, sample: &GradeSample, config: &ClimbConfig) -> (ClimbState, Option<ClimbRun>) {
        let grade = sample.grade;
        match self {
            ClimbState::Neutral => {
                if grade >= config.min_climb_grade {
                    (ClimbState::Climbing(ClimbRun::open(sample)), None)
                } else if grade <= config.descent_threshold {
                    (ClimbState::Descending, None)
                } else {
                    (ClimbState::Neutral, None)
                }
            }
            ClimbState::Climbing(mut run) => {
                if grade >= config.continuation_grade {
                    run.extend(sample);
                    (ClimbState::Climbing(run), None)
                } else if grade <= config.descent_threshold {
                    (ClimbState::Descending, Some(run))
                } else {
                    (ClimbState::Neutral, Some(run))
                }
            }
            // A bump inside a descent opens a run like any other; runs shorter
            // than `min_climb_length_miles` are dropped before merging.
            ClimbState::Descending => {
                if grade <= config.descent_threshold {
                    (ClimbState::Descending, None)
                } else if grade >= config.min_climb_grade {
                    (ClimbState::Climbing(ClimbRun::open(sample)), None)
                } else {
                    (ClimbState::Neutral, None)
                }
            }
        }
    }

    /// Closes out a run still open at end of track.
    pub fn finish(self) -> Option<ClimbRun> {
        match self {
            ClimbState::Climbing(run) => Some(run),
            _ => None,
        }
    }
}

/// Merge gap in miles: the configured value, or one smoothing window's worth of
/// mean point spacing.
pub fn resolve_merge_gap(points: &[TrackPoint], climbs: &ClimbConfig, smoothing: &SmoothingConfig) -> f64 {
    if let Some(gap) = climbs.merge_gap_miles {
        return gap;
    }
    if points.len() < 2 {
        return 0.0;
    }
    let total = points.last().map_or(0.0, |p| p.distance_miles);
    let spacing = total / (points.len() - 1) as f64;
    let window = if smoothing.enabled { smoothing.window.max(1) } else { 1 };
    spacing * window as f64
}

pub fn detect_climbs(points: &[TrackPoint], config: &ClimbConfig, merge_gap_miles: f64) -> Vec<ClimbSegment> {
    let samples = grade_samples(points);
    if samples.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let mut state = ClimbState::Neutral;

    for sample in &samples {
        let (next, finished) = state.step(sample, config);
        state = next;
        if let Some(run) = finished {
            keep_candidate(run, config, &mut candidates);
        }
    }
    if let Some(run) = state.finish() {
        keep_candidate(run, config, &mut candidates);
    }

    let merged = merge_candidates(candidates, merge_gap_miles, config);

    merged
        .into_iter()
        .enumerate()
        .map(|(i, run)| {
            let segment = ClimbSegment {
                name: format!("Climb {}", i + 1),
                start_mile: run.start_mile,
                length_miles: run.length_miles(),
                avg_grade: run.avg_grade(),
                max_grade: run.max_grade,
                elevation_gain_ft: run.gain_ft,
            };
            debug!(
                "Detected {}: {:.2}mi at {:.1}% avg from mile {:.2}",
                segment.name, segment.length_miles, segment.avg_grade, segment.start_mile
            );
            segment
        })
        .collect()
}

fn keep_candidate(run: ClimbRun, config: &ClimbConfig, candidates: &mut Vec<ClimbRun>) {
    if run.qualifies(config) {
        candidates.push(run);
    } else {
        debug!(
            "Discarded climb run at mile {:.2} ({:.2}mi, {:.1}%)",
            run.start_mile,
            run.length_miles(),
            run.avg_grade()
        );
    }
}

/// Merges neighbours closer than `merge_gap_miles` whose gap does not lose height.
/// A merge that would drop the combined run below the climb thresholds is skipped.
pub fn merge_candidates(candidates: Vec<ClimbRun>, merge_gap_miles: f64, config: &ClimbConfig) -> Vec<ClimbRun> {
    let mut merged: Vec<ClimbRun> = Vec::with_capacity(candidates.len());

    for run in candidates {
        if let Some(prev) = merged.last_mut() {
            if run.start_mile - prev.end_mile < merge_gap_miles && run.start_elevation_ft >= prev.end_elevation_ft {
                let mut joined = prev.clone();
                joined.absorb(run.clone());
                if joined.qualifies(config) {
                    *prev = joined;
                    continue;
                }
                debug!(
                    "Kept climbs at mile {:.2} and {:.2} apart: merged grade {:.1}% is too shallow",
                    prev.start_mile,
                    run.start_mile,
                    joined.avg_grade()
                );
            }
        }
        merged.push(run);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds track points directly from (segment length, grade) legs at a fixed
    /// point spacing.
    fn profile(legs: &[(f64, f64)], spacing: f64) -> Vec<TrackPoint> {
        let mut points = vec![point(0.0, 0.0)];
        for &(length, grade) in legs {
            let steps = (length / spacing).round() as usize;
            for _ in 0..steps {
                let last = points.last().unwrap();
                let d = last.distance_miles + spacing;
                let e = last.elevation_ft + spacing * FEET_PER_MILE * grade / 100.0;
                points.push(point(d, e));
            }
        }
        points
    }

    fn point(distance_miles: f64, elevation_ft: f64) -> TrackPoint {
        TrackPoint {
            latitude: 40.0,
            longitude: -77.0,
            timestamp: None,
            distance_miles,
            raw_elevation_ft: elevation_ft,
            elevation_ft,
            elevation_interpolated: false,
        }
    }

    fn sample(grade: f64) -> GradeSample {
        GradeSample {
            index: 1,
            start_mile: 0.0,
            end_mile: 0.1,
            start_elevation_ft: 0.0,
            end_elevation_ft: 0.1 * FEET_PER_MILE * grade / 100.0,
            grade,
        }
    }

    #[test]
    fn test_state_transitions() {
        let config = ClimbConfig::default();

        let (state, done) = ClimbState::Neutral.step(&sample(4.0), &config);
        assert!(matches!(state, ClimbState::Climbing(_)));
        assert!(done.is_none());

        // inside the hysteresis band the climb continues
        let (state, done) = state.step(&sample(2.0), &config);
        assert!(matches!(state, ClimbState::Climbing(_)));
        assert!(done.is_none());

        let (state, done) = state.step(&sample(-9.0), &config);
        assert_eq!(state, ClimbState::Descending);
        assert!(done.is_some());

        // a gentle sample after a steep descent settles to neutral
        let (state, _) = state.step(&sample(2.0), &config);
        assert_eq!(state, ClimbState::Neutral);

        let (state, _) = ClimbState::Descending.step(&sample(6.0), &config);
        assert!(matches!(state, ClimbState::Climbing(_)));
    }

    #[test]
    fn test_climb_directly_after_descent_is_kept() {
        let points = profile(&[(3.0, 0.0), (0.9, -10.0), (0.6, 6.0), (3.0, 0.0)], 0.3);
        let climbs = detect_climbs(&points, &ClimbConfig::default(), 0.0);

        assert_eq!(climbs.len(), 1);
        assert!((climbs[0].start_mile - 3.9).abs() < 1e-9);
        assert!((climbs[0].length_miles - 0.6).abs() < 1e-9);
        assert!((climbs[0].avg_grade - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_bump_inside_descent_is_dropped() {
        let points = profile(&[(1.0, 0.0), (0.5, -10.0), (0.1, 6.0), (0.5, -10.0), (1.0, 0.0)], 0.05);
        assert!(detect_climbs(&points, &ClimbConfig::default(), 0.0).is_empty());
    }

    #[test]
    fn test_merge_never_dilutes_below_climb_grade() {
        let points = profile(&[(0.6, 3.2), (0.4, 0.0), (0.6, 3.2)], 0.05);
        let climbs = detect_climbs(&points, &ClimbConfig::default(), 0.5);

        assert_eq!(climbs.len(), 2);
        for climb in &climbs {
            assert!(climb.avg_grade >= 3.0, "{} at {:.2}%", climb.name, climb.avg_grade);
        }
    }

    #[test]
    fn test_neutral_stays_neutral_on_gentle_grades() {
        let config = ClimbConfig::default();
        for grade in [-7.9, -1.0, 0.0, 2.9] {
            let (state, done) = ClimbState::Neutral.step(&sample(grade), &config);
            assert_eq!(state, ClimbState::Neutral);
            assert!(done.is_none());
        }
    }

    #[test]
    fn test_short_climb_is_discarded() {
        let points = profile(&[(1.0, 0.0), (0.3, 6.0), (1.0, 0.0)], 0.05);
        assert!(detect_climbs(&points, &ClimbConfig::default(), 0.1).is_empty());
    }

    #[test]
    fn test_single_sample_dip_does_not_split_climb() {
        let points = profile(&[(0.5, 5.0), (0.05, 2.0), (0.5, 5.0)], 0.05);
        let climbs = detect_climbs(&points, &ClimbConfig::default(), 0.0);

        assert_eq!(climbs.len(), 1);
        assert!((climbs[0].length_miles - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_close_climbs_merge_with_summed_gain() {
        let points = profile(&[(0.6, 5.0), (0.2, 0.0), (0.6, 5.0)], 0.05);
        let config = ClimbConfig::default();

        let separate = detect_climbs(&points, &config, 0.1);
        assert_eq!(separate.len(), 2);

        let merged = detect_climbs(&points, &config, 0.3);
        assert_eq!(merged.len(), 1);
        let expected_gain = separate[0].elevation_gain_ft + separate[1].elevation_gain_ft;
        assert!((merged[0].elevation_gain_ft - expected_gain).abs() < 1e-9);
        assert!((merged[0].length_miles - 1.4).abs() < 1e-9);
        assert!((merged[0].avg_grade - expected_gain / (1.4 * FEET_PER_MILE) * 100.0).abs() < 1e-9);
        assert_eq!(merged[0].name, "Climb 1");
    }

    #[test]
    fn test_gap_with_net_descent_does_not_merge() {
        let points = profile(&[(0.6, 5.0), (0.2, -2.0), (0.6, 5.0)], 0.05);
        let climbs = detect_climbs(&points, &ClimbConfig::default(), 0.3);

        assert_eq!(climbs.len(), 2);
        assert_eq!(climbs[0].name, "Climb 1");
        assert_eq!(climbs[1].name, "Climb 2");
        assert!(climbs[0].end_mile() <= climbs[1].start_mile);
    }

    #[test]
    fn test_zero_distance_pairs_are_skipped() {
        let mut points = profile(&[(1.0, 5.0)], 0.1);
        let dup = points[3].clone();
        points.insert(3, dup);

        let samples = grade_samples(&points);
        assert_eq!(samples.len(), points.len() - 2);
        assert_eq!(detect_climbs(&points, &ClimbConfig::default(), 0.0).len(), 1);
    }

    #[test]
    fn test_no_samples_yields_no_climbs() {
        let points = vec![point(0.0, 10.0), point(0.0, 500.0)];
        assert!(detect_climbs(&points, &ClimbConfig::default(), 0.5).is_empty());
    }

    #[test]
    fn test_default_merge_gap_uses_smoothing_window() {
        let points = profile(&[(1.0, 0.0)], 0.1);
        let gap = resolve_merge_gap(&points, &ClimbConfig::default(), &SmoothingConfig::default());
        assert!((gap - 0.5).abs() < 1e-9);
    }
}
