//! Technical section detection.
//!
//! Two independent detectors run over the same grade signal: fixed-distance windows
//! flagged for grade variance or repeated sign reversals (adjacent flagged windows
//! merge), and sustained steep descents. Results are descriptive only.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::climbs::{grade_samples, GradeSample};
use crate::config::TechnicalConfig;
use crate::track::TrackPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalKind {
    HighVariance,
    RapidReversals,
    VarianceAndReversals,
    SteepDescent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSection {
    pub start_mile: f64,
    pub end_mile: f64,
    pub kind: TechnicalKind,
    /// Highest window grade variance (%^2); zero for descents.
    pub peak_variance: f64,
    pub reversals: usize,
    /// Most negative grade seen in the section (%).
    pub steepest_grade: f64,
}

impl TechnicalSection {
    pub fn length_miles(&self) -> f64 {
        self.end_mile - self.start_mile
    }

    pub fn description(&self) -> String {
        match self.kind {
            TechnicalKind::SteepDescent => format!(
                "Steep descent at mile {:.1} ({:.1}mi, {:.1}% grade)",
                self.start_mile,
                self.length_miles(),
                self.steepest_grade
            ),
            TechnicalKind::HighVariance => format!(
                "Rolling terrain at mile {:.1}-{:.1} (grade variance {:.1})",
                self.start_mile, self.end_mile, self.peak_variance
            ),
            TechnicalKind::RapidReversals => format!(
                "Rapid grade changes at mile {:.1}-{:.1} ({} reversals)",
                self.start_mile, self.end_mile, self.reversals
            ),
            TechnicalKind::VarianceAndReversals => format!(
                "Technical section at mile {:.1}-{:.1} (grade variance {:.1}, {} reversals)",
                self.start_mile, self.end_mile, self.peak_variance, self.reversals
            ),
        }
    }
}

pub fn detect_technical_sections(points: &[TrackPoint], config: &TechnicalConfig) -> Vec<TechnicalSection> {
    let samples = grade_samples(points);
    if samples.is_empty() {
        return Vec::new();
    }
    let total_miles = points.last().map_or(0.0, |p| p.distance_miles);

    let mut sections = variance_sections(&samples, config, total_miles);
    sections.extend(steep_descents(&samples, config));
    sections.sort_by(|a, b| a.start_mile.total_cmp(&b.start_mile));

    debug!("Found {} technical sections", sections.len());
    sections
}

#[derive(Debug)]
struct WindowStats {
    index: usize,
    variance: f64,
    reversals: usize,
    steepest_grade: f64,
}

impl WindowStats {
    fn high_variance(&self, config: &TechnicalConfig) -> bool {
        self.variance > config.variance_threshold
    }

    fn rapid_reversals(&self, config: &TechnicalConfig) -> bool {
        self.reversals >= config.min_reversals
    }
}

fn window_stats(index: usize, grades: &[f64], config: &TechnicalConfig) -> WindowStats {
    let n = grades.len() as f64;
    let mean = grades.iter().sum::<f64>() / n;
    let variance = grades.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;

    let signs: Vec<bool> = grades
        .iter()
        .filter(|g| g.abs() >= config.reversal_min_grade)
        .map(|&g| g > 0.0)
        .collect();
    let reversals = signs.windows(2).filter(|w| w[0] != w[1]).count();

    WindowStats {
        index,
        variance,
        reversals,
        steepest_grade: grades.iter().cloned().fold(0.0, f64::min),
    }
}

fn variance_sections(samples: &[GradeSample], config: &TechnicalConfig, total_miles: f64) -> Vec<TechnicalSection> {
    // Samples are ordered by distance, so windows arrive in ascending order.
    let mut windows: Vec<(usize, Vec<f64>)> = Vec::new();
    for sample in samples {
        let midpoint = (sample.start_mile + sample.end_mile) / 2.0;
        let index = (midpoint / config.window_miles).floor() as usize;
        match windows.last_mut() {
            Some((current, grades)) if *current == index => grades.push(sample.grade),
            _ => windows.push((index, vec![sample.grade])),
        }
    }

    let flagged: Vec<WindowStats> = windows
        .iter()
        .map(|(index, grades)| window_stats(*index, grades, config))
        .filter(|w| w.high_variance(config) || w.rapid_reversals(config))
        .collect();

    let mut sections: Vec<(Vec<&WindowStats>, usize)> = Vec::new();
    for window in &flagged {
        match sections.last_mut() {
            Some((group, last)) if window.index == *last + 1 => {
                group.push(window);
                *last = window.index;
            }
            _ => sections.push((vec![window], window.index)),
        }
    }

    sections
        .into_iter()
        .map(|(group, last)| {
            let first = group[0].index;
            let variance = group.iter().any(|w| w.high_variance(config));
            let reversing = group.iter().any(|w| w.rapid_reversals(config));
            let kind = match (variance, reversing) {
                (true, true) => TechnicalKind::VarianceAndReversals,
                (true, false) => TechnicalKind::HighVariance,
                _ => TechnicalKind::RapidReversals,
            };
            TechnicalSection {
                start_mile: first as f64 * config.window_miles,
                end_mile: ((last + 1) as f64 * config.window_miles).min(total_miles),
                kind,
                peak_variance: group.iter().map(|w| w.variance).fold(0.0, f64::max),
                reversals: group.iter().map(|w| w.reversals).sum(),
                steepest_grade: group.iter().map(|w| w.steepest_grade).fold(0.0, f64::min),
            }
        })
        .collect()
}

/// Runs that start at or below the descent threshold and continue while the grade
/// stays at or below the continuation grade.
fn steep_descents(samples: &[GradeSample], config: &TechnicalConfig) -> Vec<TechnicalSection> {
    let mut sections = Vec::new();
    let mut i = 0;

    while i < samples.len() {
        if samples[i].grade > config.descent_threshold {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < samples.len() && samples[j].grade <= config.descent_continuation_grade {
            j += 1;
        }

        let run = &samples[i..j];
        let length = run[run.len() - 1].end_mile - run[0].start_mile;
        if length >= config.min_descent_length_miles {
            sections.push(TechnicalSection {
                start_mile: run[0].start_mile,
                end_mile: run[run.len() - 1].end_mile,
                kind: TechnicalKind::SteepDescent,
                peak_variance: 0.0,
                reversals: 0,
                steepest_grade: run.iter().map(|s| s.grade).fold(0.0, f64::min),
            });
        }
        i = j;
    }

    sections
}
