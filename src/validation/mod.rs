//! Data quality validation.
//!
//! Eight independent checks score a [`CourseProfile`] (and, when supplied, the track
//! it was built from). Each check yields a 0-10 sub-score plus issues; a single
//! reducer caps categories carrying critical issues, rescales the sum to 0-100 and
//! assigns the pass flag and rating. Bad data never produces an `Err` here.
use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ValidationThresholds;
use crate::error::{EngineError, Result};
use crate::profile::CourseProfile;
use crate::track::TrackPoint;

mod checks;

pub use checks::CHECKS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCategory {
    BasicCourseData,
    DistanceBounds,
    ElevationBounds,
    ElevationGainRate,
    GradientAnalysis,
    GpsCompleteness,
    ClimbDetectionAccuracy,
    DataConsistency,
}

impl QualityCategory {
    pub const ALL: [QualityCategory; 8] = [
        QualityCategory::BasicCourseData,
        QualityCategory::DistanceBounds,
        QualityCategory::ElevationBounds,
        QualityCategory::ElevationGainRate,
        QualityCategory::GradientAnalysis,
        QualityCategory::GpsCompleteness,
        QualityCategory::ClimbDetectionAccuracy,
        QualityCategory::DataConsistency,
    ];

    /// Stable key used in the JSON report.
    pub fn key(self) -> &'static str {
        match self {
            QualityCategory::BasicCourseData => "basic_course_data",
            QualityCategory::DistanceBounds => "distance_bounds",
            QualityCategory::ElevationBounds => "elevation_bounds",
            QualityCategory::ElevationGainRate => "elevation_gain_rate",
            QualityCategory::GradientAnalysis => "gradient_analysis",
            QualityCategory::GpsCompleteness => "gps_completeness",
            QualityCategory::ClimbDetectionAccuracy => "climb_detection_accuracy",
            QualityCategory::DataConsistency => "data_consistency",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityCategory::BasicCourseData => "Basic course data",
            QualityCategory::DistanceBounds => "Distance bounds",
            QualityCategory::ElevationBounds => "Elevation bounds",
            QualityCategory::ElevationGainRate => "Elevation gain rate",
            QualityCategory::GradientAnalysis => "Gradient analysis",
            QualityCategory::GpsCompleteness => "GPS completeness",
            QualityCategory::ClimbDetectionAccuracy => "Climb detection accuracy",
            QualityCategory::DataConsistency => "Data consistency",
        }
    }
}

impl fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLocation {
    Point(usize),
    Segment(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: QualityCategory,
    pub severity: Severity,
    pub message: String,
    pub location: Option<IssueLocation>,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn critical(category: QualityCategory, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Critical, message.into())
    }

    pub fn warning(category: QualityCategory, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Warning, message.into())
    }

    fn new(category: QualityCategory, severity: Severity, message: String) -> Self {
        ValidationIssue {
            category,
            severity,
            message,
            location: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, location: IssueLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: QualityCategory,
    /// 0-10 after capping.
    pub score: f64,
    pub issues: Vec<ValidationIssue>,
}

impl CategoryResult {
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Unusable,
}

impl QualityRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            QualityRating::Excellent
        } else if score >= 85.0 {
            QualityRating::Good
        } else if score >= 75.0 {
            QualityRating::Acceptable
        } else if score >= 60.0 {
            QualityRating::Poor
        } else {
            QualityRating::Unusable
        }
    }
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub course_name: String,
    pub categories: Vec<CategoryResult>,
    /// 0-100.
    pub overall_score: f64,
    pub pass: bool,
    pub rating: QualityRating,
}

impl DataQualityReport {
    pub fn category(&self, category: QualityCategory) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Every issue, in category order.
    pub fn issues(&self) -> Vec<&ValidationIssue> {
        self.categories.iter().flat_map(|c| &c.issues).collect()
    }

    pub fn critical_count(&self) -> usize {
        self.issues().iter().filter(|i| i.is_critical()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues().iter().filter(|i| !i.is_critical()).count()
    }
}

impl fmt::Display for DataQualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 DATA QUALITY REPORT: {}", self.course_name)?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Overall Score: {:.1}/100 ({})", self.overall_score, self.rating)?;
        writeln!(
            f,
            "Validation Status: {}",
            if self.pass { "✅ PASS" } else { "❌ FAIL" }
        )?;
        writeln!(
            f,
            "Issues: {} critical, {} warnings",
            self.critical_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for result in &self.categories {
            let icon = if result.has_critical() {
                "🚨"
            } else if result.issues.is_empty() {
                "✅"
            } else {
                "⚠️ "
            };
            writeln!(f, "  {} {}: {:.1}/10", icon, result.category, result.score)?;
            for issue in &result.issues {
                let marker = match issue.severity {
                    Severity::Critical => "critical",
                    Severity::Warning => "warning",
                };
                writeln!(f, "       [{}] {}", marker, issue.message)?;
                if let Some(fix) = &issue.suggestion {
                    writeln!(f, "       💡 Fix: {}", fix)?;
                }
            }
        }

        Ok(())
    }
}

/// What every check sees: the profile and, optionally, the track behind it.
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    pub profile: &'a CourseProfile,
    pub track: Option<&'a [TrackPoint]>,
}

/// Raw result of one check, before capping.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub score: f64,
    pub issues: Vec<ValidationIssue>,
}

pub type CheckFn = fn(&CheckInput<'_>, &ValidationThresholds) -> Result<CheckOutcome>;

pub fn validate_course(
    profile: &CourseProfile,
    track: Option<&[TrackPoint]>,
    thresholds: &ValidationThresholds,
) -> DataQualityReport {
    let input = CheckInput { profile, track };
    let categories = CHECKS
        .iter()
        .map(|&(category, check)| run_check(category, check, &input, thresholds))
        .collect();

    let report = reduce(&profile.name, categories, thresholds);
    info!(
        "Validated '{}': {:.1}/100 ({}), {} critical, {} warnings",
        report.course_name,
        report.overall_score,
        report.rating,
        report.critical_count(),
        report.warning_count()
    );
    report
}

fn run_check(
    category: QualityCategory,
    check: CheckFn,
    input: &CheckInput<'_>,
    thresholds: &ValidationThresholds,
) -> CategoryResult {
    match check(input, thresholds) {
        Ok(outcome) => {
            let mut score = if outcome.score.is_nan() {
                0.0
            } else {
                outcome.score.clamp(0.0, 10.0)
            };
            if outcome.issues.iter().any(ValidationIssue::is_critical) {
                score = score.min(thresholds.critical_category_cap);
            }
            for issue in &outcome.issues {
                warn!("[{}] {}", category.key(), issue.message);
            }
            CategoryResult {
                category,
                score,
                issues: outcome.issues,
            }
        }
        Err(err) => {
            warn!("[{}] check aborted: {}", category.key(), err);
            let message = match err {
                EngineError::InvalidInput(detail) => format!("InvalidInput: {}", detail),
                other => format!("InvalidInput: {}", other),
            };
            CategoryResult {
                category,
                score: 0.0,
                issues: vec![ValidationIssue::critical(category, message)
                    .suggest("Rebuild the course profile from its source track")],
            }
        }
    }
}

fn reduce(course_name: &str, categories: Vec<CategoryResult>, thresholds: &ValidationThresholds) -> DataQualityReport {
    let max_total = 10.0 * categories.len() as f64;
    let total: f64 = categories.iter().map(|c| c.score).sum();
    let mut overall = if max_total > 0.0 { total / max_total * 100.0 } else { 0.0 };

    if categories.iter().any(CategoryResult::has_critical) {
        overall = overall.min(thresholds.critical_aggregate_cap);
    }
    let overall_score = (overall * 10.0).round() / 10.0;

    DataQualityReport {
        course_name: course_name.to_string(),
        categories,
        overall_score,
        pass: overall_score >= thresholds.pass_score,
        rating: QualityRating::from_score(overall_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(category: QualityCategory, score: f64, critical: bool) -> CategoryResult {
        let issues = if critical {
            vec![ValidationIssue::critical(category, "bad")]
        } else {
            Vec::new()
        };
        CategoryResult { category, score, issues }
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(QualityRating::from_score(100.0), QualityRating::Excellent);
        assert_eq!(QualityRating::from_score(95.0), QualityRating::Excellent);
        assert_eq!(QualityRating::from_score(94.9), QualityRating::Good);
        assert_eq!(QualityRating::from_score(85.0), QualityRating::Good);
        assert_eq!(QualityRating::from_score(80.0), QualityRating::Acceptable);
        assert_eq!(QualityRating::from_score(74.9), QualityRating::Poor);
        assert_eq!(QualityRating::from_score(59.9), QualityRating::Unusable);
    }

    #[test]
    fn test_reduce_rescales_equal_weights() {
        let categories: Vec<CategoryResult> = QualityCategory::ALL
            .iter()
            .map(|&c| result(c, if c == QualityCategory::GpsCompleteness { 6.0 } else { 10.0 }, false))
            .collect();
        let report = reduce("x", categories, &ValidationThresholds::default());

        assert_eq!(report.overall_score, 95.0);
        assert!(report.pass);
        assert_eq!(report.rating, QualityRating::Excellent);
    }

    #[test]
    fn test_critical_issue_caps_aggregate() {
        let categories: Vec<CategoryResult> = QualityCategory::ALL
            .iter()
            .map(|&c| result(c, if c == QualityCategory::DistanceBounds { 4.0 } else { 10.0 }, c == QualityCategory::DistanceBounds))
            .collect();
        let report = reduce("x", categories, &ValidationThresholds::default());

        assert_eq!(report.overall_score, 59.0);
        assert!(!report.pass);
        assert_eq!(report.rating, QualityRating::Unusable);
        assert_eq!(report.critical_count(), 1);
    }

    #[test]
    fn test_run_check_caps_critical_category() {
        fn noisy(_: &CheckInput<'_>, _: &ValidationThresholds) -> Result<CheckOutcome> {
            Ok(CheckOutcome {
                score: 9.0,
                issues: vec![
                    ValidationIssue::critical(QualityCategory::GradientAnalysis, "one"),
                    ValidationIssue::critical(QualityCategory::GradientAnalysis, "two"),
                ],
            })
        }
        fn broken(_: &CheckInput<'_>, _: &ValidationThresholds) -> Result<CheckOutcome> {
            Err(EngineError::InvalidInput("total distance is NaN".into()))
        }

        let profile = crate::validation::checks::tests::sample_profile();
        let input = CheckInput { profile: &profile, track: None };
        let thresholds = ValidationThresholds::default();

        // flat cap, multiple criticals do not stack
        let capped = run_check(QualityCategory::GradientAnalysis, noisy, &input, &thresholds);
        assert_eq!(capped.score, 4.0);

        let failed = run_check(QualityCategory::BasicCourseData, broken, &input, &thresholds);
        assert_eq!(failed.score, 0.0);
        assert!(failed.has_critical());
        assert!(failed.issues[0].message.starts_with("InvalidInput"));
    }
}
