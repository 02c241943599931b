//! The eight quality checks, in report order.
//!
//! Every check is a pure function of the profile, the optional track and the
//! thresholds. Adding a category means adding a row to [`CHECKS`].
use crate::config::ValidationThresholds;
use crate::error::{EngineError, Result};
use crate::geo_distance::FEET_PER_MILE;
use crate::track::{BoundingBox, TrackPoint};

use super::{CheckFn, CheckInput, CheckOutcome, IssueLocation, QualityCategory, ValidationIssue};

pub const CHECKS: [(QualityCategory, CheckFn); 8] = [
    (QualityCategory::BasicCourseData, basic_course_data),
    (QualityCategory::DistanceBounds, distance_bounds),
    (QualityCategory::ElevationBounds, elevation_bounds),
    (QualityCategory::ElevationGainRate, elevation_gain_rate),
    (QualityCategory::GradientAnalysis, gradient_analysis),
    (QualityCategory::GpsCompleteness, gps_completeness),
    (QualityCategory::ClimbDetectionAccuracy, climb_detection_accuracy),
    (QualityCategory::DataConsistency, data_consistency),
];

// Absorbs float noise when comparing cumulative-distance differences to thresholds.
const DISTANCE_EPSILON: f64 = 1e-9;

fn finite(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput(format!("{} is not a finite number ({})", field, value)))
    }
}

fn penalized(criticals: usize, warnings: usize, critical_penalty: f64, warning_penalty: f64) -> f64 {
    10.0 - criticals as f64 * critical_penalty - warnings as f64 * warning_penalty
}

fn count(issues: &[ValidationIssue]) -> (usize, usize) {
    let criticals = issues.iter().filter(|i| i.is_critical()).count();
    (criticals, issues.len() - criticals)
}

fn basic_course_data(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::BasicCourseData;
    let profile = input.profile;
    let distance = finite(profile.total_distance_miles, "total distance")?;
    let gain = finite(profile.total_elevation_gain_ft, "total elevation gain")?;
    let mut issues = Vec::new();

    if profile.name.trim().is_empty() {
        issues.push(ValidationIssue::warning(CAT, "Course name is missing or empty"));
    }
    if distance <= 0.0 {
        issues.push(
            ValidationIssue::critical(CAT, format!("Invalid course distance: {:.2} miles", distance))
                .suggest("Check the track for missing segments"),
        );
    }
    if gain < 0.0 {
        issues.push(ValidationIssue::critical(CAT, format!("Negative elevation gain: {:.0} ft", gain)));
    }
    let points = profile.data_source.total_gps_points;
    if points < t.min_gps_points {
        issues.push(
            ValidationIssue::critical(
                CAT,
                format!("Insufficient GPS points: {} (minimum: {})", points, t.min_gps_points),
            )
            .suggest("Use a track with adequate point density"),
        );
    }
    let fraction = profile.data_source.native_elevation_fraction;
    if !(0.0..=1.0).contains(&fraction) {
        issues.push(ValidationIssue::critical(
            CAT,
            format!("Native elevation fraction {} is outside 0-1", fraction),
        ));
    }

    let (criticals, warnings) = count(&issues);
    Ok(CheckOutcome {
        score: penalized(criticals, warnings, 4.0, 2.0),
        issues,
    })
}

fn distance_bounds(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::DistanceBounds;
    let distance = finite(input.profile.total_distance_miles, "total distance")?;

    let outcome = if distance < t.min_distance_miles {
        CheckOutcome {
            score: 10.0 * distance.max(0.0) / t.min_distance_miles,
            issues: vec![ValidationIssue::critical(
                CAT,
                format!(
                    "Course distance {:.1} miles is unreasonably short (min: {})",
                    distance, t.min_distance_miles
                ),
            )
            .suggest("Check GPS data for missing segments or incorrect units")],
        }
    } else if distance > t.max_distance_miles {
        CheckOutcome {
            score: 10.0 * t.max_distance_miles / distance,
            issues: vec![ValidationIssue::critical(
                CAT,
                format!(
                    "Course distance {:.1} miles is unreasonably long (max: {})",
                    distance, t.max_distance_miles
                ),
            )
            .suggest("Check for GPS errors inflating the distance")],
        }
    } else {
        CheckOutcome {
            score: 10.0,
            issues: Vec::new(),
        }
    };

    Ok(outcome)
}

fn elevation_bounds(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::ElevationBounds;
    let in_bounds = |e: f64| (t.min_elevation_ft..=t.max_elevation_ft).contains(&e);
    let mut issues = Vec::new();

    match input.track {
        Some(points) => {
            let violations: Vec<(usize, f64)> = points
                .iter()
                .enumerate()
                .map(|(i, p)| (i, p.raw_elevation_ft))
                .filter(|&(_, e)| !in_bounds(e))
                .collect();
            if let Some(&(index, elevation)) = violations.first() {
                issues.push(
                    ValidationIssue::critical(
                        CAT,
                        format!(
                            "{} elevation value(s) outside {:.0} to {:.0} ft (first: {:.0} ft at point {})",
                            violations.len(),
                            t.min_elevation_ft,
                            t.max_elevation_ft,
                            elevation,
                            index
                        ),
                    )
                    .at(IssueLocation::Point(index))
                    .suggest("Review GPS data for elevation sensor errors"),
                );
            }
        }
        None => {
            let range = input.profile.elevation_range;
            if !range.is_finite() {
                issues.push(
                    ValidationIssue::critical(CAT, "Elevation range contains non-finite values")
                        .suggest("Review GPS data for elevation sensor errors"),
                );
            } else if !in_bounds(range.min_ft) || !in_bounds(range.max_ft) {
                issues.push(
                    ValidationIssue::critical(
                        CAT,
                        format!(
                            "Elevation range {:.0} to {:.0} ft exceeds {:.0} to {:.0} ft",
                            range.min_ft, range.max_ft, t.min_elevation_ft, t.max_elevation_ft
                        ),
                    )
                    .suggest("Review GPS data for elevation sensor errors"),
                );
            }
        }
    }

    Ok(CheckOutcome {
        score: if issues.is_empty() { 10.0 } else { 2.0 },
        issues,
    })
}

fn elevation_gain_rate(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::ElevationGainRate;
    let distance = finite(input.profile.total_distance_miles, "total distance")?;
    let gain = finite(input.profile.total_elevation_gain_ft, "total elevation gain")?;

    if distance <= 0.0 {
        return Ok(CheckOutcome {
            score: 0.0,
            issues: vec![ValidationIssue::critical(
                CAT,
                "Elevation gain rate is undefined for a course without distance",
            )],
        });
    }

    let rate = gain / distance;
    if rate > t.max_gain_per_mile_ft {
        return Ok(CheckOutcome {
            score: 10.0 * t.max_gain_per_mile_ft / rate,
            issues: vec![ValidationIssue::critical(
                CAT,
                format!(
                    "Elevation gain rate {:.0} ft/mile exceeds maximum reasonable rate ({:.0})",
                    rate, t.max_gain_per_mile_ft
                ),
            )
            .suggest("Verify elevation data accuracy or check for GPS errors")],
        });
    }

    Ok(CheckOutcome {
        score: 10.0,
        issues: Vec::new(),
    })
}

/// Grades measured over consecutive, non-overlapping spans of at least
/// `min_span_miles`. Returns (index of span end, grade %).
fn span_grades(points: &[TrackPoint], min_span_miles: f64) -> Vec<(usize, f64)> {
    let mut grades = Vec::new();
    let mut anchor = 0;

    for j in 1..points.len() {
        let run = points[j].distance_miles - points[anchor].distance_miles;
        if run >= min_span_miles && run > 0.0 {
            let rise = points[j].elevation_ft - points[anchor].elevation_ft;
            grades.push((j, rise / (run * FEET_PER_MILE) * 100.0));
            anchor = j;
        }
    }

    grades
}

fn gradient_analysis(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::GradientAnalysis;
    let mut issues = Vec::new();
    let mut checked = 0usize;
    let mut violating = 0usize;

    for climb in &input.profile.climbs {
        checked += 1;
        let worst = climb.avg_grade.max(climb.max_grade);
        if !(worst <= t.max_grade_percent) {
            violating += 1;
            issues.push(
                ValidationIssue::critical(
                    CAT,
                    format!(
                        "{} has an implausible grade ({:.1}% avg, {:.1}% max; limit {:.0}%)",
                        climb.name, climb.avg_grade, climb.max_grade, t.max_grade_percent
                    ),
                )
                .at(IssueLocation::Segment(climb.name.clone()))
                .suggest("Check elevation data for GPS errors"),
            );
        }
    }

    if let Some(points) = input.track {
        let grades = span_grades(points, t.min_grade_sample_miles);
        let steep: Vec<&(usize, f64)> = grades
            .iter()
            .filter(|(_, g)| !(g.abs() <= t.max_grade_percent))
            .collect();
        checked += grades.len();
        violating += steep.len();

        if let Some(&&(first, _)) = steep.first() {
            let steepest = steep.iter().map(|(_, g)| g.abs()).fold(0.0, f64::max);
            issues.push(
                ValidationIssue::critical(
                    CAT,
                    format!(
                        "{} of {} grade samples exceed {:.0}% (steepest {:.1}%)",
                        steep.len(),
                        grades.len(),
                        t.max_grade_percent,
                        steepest
                    ),
                )
                .at(IssueLocation::Point(first))
                .suggest("Smooth the elevation profile or remove spikes"),
            );
        }
    }

    let score = if checked == 0 {
        10.0
    } else {
        10.0 * (1.0 - violating as f64 / checked as f64)
    };
    Ok(CheckOutcome { score, issues })
}

fn gps_completeness(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::GpsCompleteness;
    let fraction = finite(
        input.profile.data_source.native_elevation_fraction,
        "native elevation fraction",
    )?
    .clamp(0.0, 1.0);
    let mut issues = Vec::new();
    let mut penalty = 0.0;

    if fraction < t.min_native_elevation_fraction {
        issues.push(
            ValidationIssue::warning(
                CAT,
                format!(
                    "Only {:.0}% of points carry native elevation (minimum {:.0}%)",
                    fraction * 100.0,
                    t.min_native_elevation_fraction * 100.0
                ),
            )
            .suggest("Use a track recorded with elevation for every point"),
        );
    }

    if let Some(points) = input.track {
        let critical_gap = t.max_point_gap_miles * t.critical_gap_multiplier;

        for i in 1..points.len() {
            let gap = points[i].distance_miles - points[i - 1].distance_miles;
            if !gap.is_finite() {
                issues.push(
                    ValidationIssue::critical(CAT, format!("Distance is undefined at point {}", i))
                        .at(IssueLocation::Point(i))
                        .suggest("Check GPS data for coordinate corruption"),
                );
                break;
            }
            if gap >= critical_gap - DISTANCE_EPSILON {
                issues.push(
                    ValidationIssue::critical(
                        CAT,
                        format!("Distance jump of {:.2} miles between points {} and {}", gap, i - 1, i),
                    )
                    .at(IssueLocation::Point(i))
                    .suggest("Review GPS track for signal loss"),
                );
            } else if gap > t.max_point_gap_miles {
                penalty += 1.0;
                issues.push(
                    ValidationIssue::warning(
                        CAT,
                        format!(
                            "Gap of {:.2} miles between points {} and {} (threshold: {} miles)",
                            gap,
                            i - 1,
                            i,
                            t.max_point_gap_miles
                        ),
                    )
                    .at(IssueLocation::Point(i)),
                );
            }
        }

        let lost: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.latitude.abs() < 0.0001 && p.longitude.abs() < 0.0001)
            .map(|(i, _)| i)
            .collect();
        if let Some(&first) = lost.first() {
            penalty += 1.0;
            issues.push(
                ValidationIssue::warning(CAT, format!("GPS loss: {} point(s) at coordinates (0, 0)", lost.len()))
                    .at(IssueLocation::Point(first)),
            );
        }
    }

    Ok(CheckOutcome {
        score: 10.0 * fraction - penalty,
        issues,
    })
}

fn climb_detection_accuracy(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::ClimbDetectionAccuracy;
    let profile = input.profile;
    let distance = finite(profile.total_distance_miles, "total distance")?;
    let gain = finite(profile.total_elevation_gain_ft, "total elevation gain")?;

    if profile.climbs.is_empty() {
        let rate = if distance > 0.0 { gain / distance } else { 0.0 };
        if rate > t.climbless_gain_per_mile_ft {
            return Ok(CheckOutcome {
                score: 6.0,
                issues: vec![ValidationIssue::warning(
                    CAT,
                    format!("No climbs detected despite {:.0} ft/mile elevation gain", rate),
                )
                .suggest("Review climb detection parameters or elevation data quality")],
            });
        }
        return Ok(CheckOutcome {
            score: 10.0,
            issues: Vec::new(),
        });
    }

    let mut issues = Vec::new();
    for climb in &profile.climbs {
        let mut problems = Vec::new();
        if !(climb.length_miles > 0.0) {
            problems.push("non-positive length");
        }
        if !(climb.elevation_gain_ft > 0.0) {
            problems.push("non-positive elevation gain");
        }
        if !(climb.avg_grade > 0.0) {
            problems.push("non-positive average grade");
        }
        if !problems.is_empty() {
            issues.push(
                ValidationIssue::critical(CAT, format!("{}: {}", climb.name, problems.join(", ")))
                    .at(IssueLocation::Segment(climb.name.clone())),
            );
        }
    }

    let climb_gain: f64 = profile.climbs.iter().map(|c| c.elevation_gain_ft).sum();
    let mut score = 10.0;
    if gain > 0.0 {
        let ratio = climb_gain / gain;
        if ratio > t.max_climb_gain_ratio {
            score = 10.0 * t.max_climb_gain_ratio / ratio;
            issues.push(
                ValidationIssue::warning(
                    CAT,
                    format!(
                        "Climb elevation gains ({:.0} ft) significantly exceed total course gain ({:.0} ft)",
                        climb_gain, gain
                    ),
                )
                .suggest("Review climb detection or elevation calculations"),
            );
        }
    } else if climb_gain > 0.0 {
        score = 2.0;
        issues.push(ValidationIssue::warning(
            CAT,
            format!("Climbs report {:.0} ft of gain on a course with none", climb_gain),
        ));
    }

    let (criticals, _) = count(&issues);
    Ok(CheckOutcome {
        score: score - criticals as f64 * 4.0,
        issues,
    })
}

fn data_consistency(input: &CheckInput<'_>, t: &ValidationThresholds) -> Result<CheckOutcome> {
    const CAT: QualityCategory = QualityCategory::DataConsistency;
    let profile = input.profile;
    let distance = profile.total_distance_miles;
    let tol = t.boundary_tolerance_miles;
    let mut issues = Vec::new();

    for climb in &profile.climbs {
        if climb.start_mile < -tol || climb.end_mile() > distance + tol {
            issues.push(
                ValidationIssue::critical(
                    CAT,
                    format!(
                        "{} spans mile {:.2}-{:.2}, outside the course (0-{:.2})",
                        climb.name,
                        climb.start_mile,
                        climb.end_mile(),
                        distance
                    ),
                )
                .at(IssueLocation::Segment(climb.name.clone())),
            );
        }
    }
    for pair in profile.climbs.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start_mile < prev.start_mile {
            issues.push(
                ValidationIssue::critical(CAT, format!("{} starts before {}", next.name, prev.name))
                    .at(IssueLocation::Segment(next.name.clone())),
            );
        } else if next.start_mile < prev.end_mile() - tol {
            issues.push(
                ValidationIssue::critical(CAT, format!("{} overlaps {}", next.name, prev.name))
                    .at(IssueLocation::Segment(next.name.clone())),
            );
        }
    }

    for (i, section) in profile.technical_sections.iter().enumerate() {
        if section.start_mile > section.end_mile
            || section.start_mile < -tol
            || section.end_mile > distance + tol
        {
            issues.push(ValidationIssue::warning(
                CAT,
                format!("Technical section {} ({}) lies outside the course", i + 1, section.description()),
            ));
        }
    }
    if profile
        .technical_sections
        .windows(2)
        .any(|w| w[1].start_mile < w[0].start_mile)
    {
        issues.push(ValidationIssue::warning(CAT, "Technical sections are not ordered by start mile"));
    }

    if !profile.bounds.is_well_formed() {
        issues.push(
            ValidationIssue::critical(CAT, "Bounding box is inverted or outside valid coordinate ranges")
                .suggest("Check GPS data for coordinate corruption"),
        );
    }

    if let Some(points) = input.track {
        if let Some(i) = points.iter().position(|p| {
            !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude)
        }) {
            issues.push(
                ValidationIssue::critical(
                    CAT,
                    format!(
                        "Invalid coordinates at point {}: {}, {}",
                        i, points[i].latitude, points[i].longitude
                    ),
                )
                .at(IssueLocation::Point(i)),
            );
        }
        if BoundingBox::from_points(points).as_ref() != Some(&profile.bounds) {
            issues.push(ValidationIssue::critical(
                CAT,
                "Bounding box does not match the track's coordinate range",
            ));
        }
        if points.len() != profile.data_source.total_gps_points {
            issues.push(ValidationIssue::warning(
                CAT,
                format!(
                    "Data source reports {} points but the track has {}",
                    profile.data_source.total_gps_points,
                    points.len()
                ),
            ));
        }
    }

    let (criticals, warnings) = count(&issues);
    Ok(CheckOutcome {
        score: penalized(criticals, warnings, 5.0, 2.5),
        issues,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::climbs::ClimbSegment;
    use crate::profile::{CourseProfile, DataSource, ElevationRange};

    pub(crate) fn sample_profile() -> CourseProfile {
        CourseProfile {
            name: "Happy Valley".to_string(),
            location: Some("State College, PA".to_string()),
            total_distance_miles: 56.0,
            total_elevation_gain_ft: 3200.0,
            climbs: vec![
                ClimbSegment {
                    name: "Climb 1".to_string(),
                    start_mile: 8.0,
                    length_miles: 1.5,
                    avg_grade: 5.0,
                    max_grade: 9.0,
                    elevation_gain_ft: 396.0,
                },
                ClimbSegment {
                    name: "Climb 2".to_string(),
                    start_mile: 30.0,
                    length_miles: 2.0,
                    avg_grade: 4.0,
                    max_grade: 7.5,
                    elevation_gain_ft: 422.0,
                },
            ],
            technical_sections: Vec::new(),
            bounds: BoundingBox {
                min_lat: 40.70,
                max_lat: 40.95,
                min_lon: -78.05,
                max_lon: -77.70,
            },
            elevation_range: ElevationRange {
                min_ft: 950.0,
                max_ft: 1950.0,
            },
            data_source: DataSource {
                kind: "gpx".to_string(),
                source: "happy_valley.gpx".to_string(),
                total_gps_points: 3000,
                native_elevation_fraction: 1.0,
            },
        }
    }

    fn run(check: CheckFn, profile: &CourseProfile) -> CheckOutcome {
        let input = CheckInput { profile, track: None };
        check(&input, &ValidationThresholds::default()).unwrap()
    }

    #[test]
    fn test_clean_profile_scores_full_marks() {
        let profile = sample_profile();
        for (category, check) in CHECKS {
            let outcome = run(check, &profile);
            assert_eq!(outcome.score, 10.0, "{category}");
            assert!(outcome.issues.is_empty(), "{category}: {:?}", outcome.issues);
        }
    }

    #[test]
    fn test_basic_data_flags_empty_name_and_few_points() {
        let mut profile = sample_profile();
        profile.name = "  ".to_string();
        profile.data_source.total_gps_points = 4;

        let outcome = run(basic_course_data, &profile);
        assert_eq!(count(&outcome.issues), (1, 1));
        assert_eq!(outcome.score, 4.0);
    }

    #[test]
    fn test_non_finite_distance_is_invalid_input() {
        let mut profile = sample_profile();
        profile.total_distance_miles = f64::NAN;
        let input = CheckInput { profile: &profile, track: None };

        let err = distance_bounds(&input, &ValidationThresholds::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_distance_score_scales_with_overshoot() {
        let mut profile = sample_profile();
        profile.total_distance_miles = 400.0;
        let outcome = run(distance_bounds, &profile);
        assert_eq!(outcome.score, 5.0);
        assert!(outcome.issues[0].is_critical());

        profile.total_distance_miles = 2.5;
        assert_eq!(run(distance_bounds, &profile).score, 5.0);
    }

    #[test]
    fn test_gain_rate_at_limit_is_not_flagged() {
        let mut profile = sample_profile();
        profile.total_distance_miles = 10.0;
        profile.total_elevation_gain_ft = 15_000.0;
        assert!(run(elevation_gain_rate, &profile).issues.is_empty());

        profile.total_elevation_gain_ft = 20_000.0;
        let outcome = run(elevation_gain_rate, &profile);
        assert!(outcome.issues[0].is_critical());
        assert_eq!(outcome.score, 7.5);
    }

    #[test]
    fn test_steep_climb_is_critical() {
        let mut profile = sample_profile();
        profile.climbs[1].max_grade = 41.0;
        let outcome = run(gradient_analysis, &profile);

        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(
            outcome.issues[0].location,
            Some(IssueLocation::Segment("Climb 2".to_string()))
        );
        assert_eq!(outcome.score, 5.0);
    }

    #[test]
    fn test_climb_gain_exceeding_course_gain_warns() {
        let mut profile = sample_profile();
        profile.total_elevation_gain_ft = 409.0;
        let outcome = run(climb_detection_accuracy, &profile);

        assert_eq!(count(&outcome.issues), (0, 1));
        assert!(outcome.score < 10.0);
    }

    #[test]
    fn test_climbless_hilly_course_warns() {
        let mut profile = sample_profile();
        profile.climbs.clear();
        profile.total_elevation_gain_ft = 8000.0;
        let outcome = run(climb_detection_accuracy, &profile);
        assert_eq!(outcome.score, 6.0);
    }

    #[test]
    fn test_overlapping_climbs_are_inconsistent() {
        let mut profile = sample_profile();
        profile.climbs[1].start_mile = 9.0;
        let outcome = run(data_consistency, &profile);
        assert_eq!(count(&outcome.issues), (1, 0));

        profile.climbs[1].start_mile = 55.5;
        let outcome = run(data_consistency, &profile);
        assert!(outcome.issues[0].message.contains("outside the course"));
    }

    #[test]
    fn test_inverted_bounds_are_inconsistent() {
        let mut profile = sample_profile();
        profile.bounds.min_lat = 41.0;
        assert_eq!(count(&run(data_consistency, &profile).issues), (1, 0));
    }

    #[test]
    fn test_span_grades_skip_short_pairs() {
        let points: Vec<TrackPoint> = [(0.0, 0.0), (0.001, 40.0), (0.02, 52.8), (0.045, 52.8)]
            .iter()
            .map(|&(d, e)| TrackPoint {
                latitude: 40.0,
                longitude: -77.0,
                timestamp: None,
                distance_miles: d,
                raw_elevation_ft: e,
                elevation_ft: e,
                elevation_interpolated: false,
            })
            .collect();

        let grades = span_grades(&points, 0.02);
        assert_eq!(grades.len(), 2);
        assert_eq!(grades[0].0, 2);
        assert!((grades[0].1 - 50.0).abs() < 1e-9);
        assert_eq!(grades[1].1, 0.0);
    }
}
