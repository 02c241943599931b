//! JSON documents written by the CLI and handed to downstream consumers.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::climbs::ClimbSegment;
use crate::profile::CourseProfile;
use crate::validation::{DataQualityReport, QualityRating, Severity};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileDocument {
    pub name: String,
    pub location: Option<String>,
    pub bike_distance_miles: f64,
    pub bike_elevation_gain_ft: f64,
    pub key_climbs: Vec<ClimbSegment>,
    pub technical_sections: Vec<String>,
    pub data_source: DataSourceDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_quality_report: Option<ReportDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub data_quality_score: Option<f64>,
    pub total_gps_points: usize,
}

impl ProfileDocument {
    /// Distances and gain are rounded to 0.1 for display; climbs keep full precision.
    pub fn new(profile: &CourseProfile, report: Option<&DataQualityReport>) -> Self {
        ProfileDocument {
            name: profile.name.clone(),
            location: profile.location.clone(),
            bike_distance_miles: round1(profile.total_distance_miles),
            bike_elevation_gain_ft: profile.total_elevation_gain_ft.round(),
            key_climbs: profile.climbs.clone(),
            technical_sections: profile
                .technical_sections
                .iter()
                .map(|s| s.description())
                .collect(),
            data_source: DataSourceDocument {
                kind: profile.data_source.kind.clone(),
                source: profile.data_source.source.clone(),
                data_quality_score: report.map(|r| r.overall_score),
                total_gps_points: profile.data_source.total_gps_points,
            },
            data_quality_report: report.map(ReportDocument::new),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub overall_score: f64,
    pub pass: bool,
    pub rating: QualityRating,
    pub categories: BTreeMap<&'static str, CategoryDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDocument {
    pub score: f64,
    pub issues: Vec<IssueDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueDocument {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ReportDocument {
    pub fn new(report: &DataQualityReport) -> Self {
        let categories = report
            .categories
            .iter()
            .map(|c| {
                let issues = c
                    .issues
                    .iter()
                    .map(|i| IssueDocument {
                        severity: i.severity,
                        message: i.message.clone(),
                        suggestion: i.suggestion.clone(),
                    })
                    .collect();
                (c.category.key(), CategoryDocument { score: round1(c.score), issues })
            })
            .collect();

        ReportDocument {
            overall_score: report.overall_score,
            pass: report.pass,
            rating: report.rating,
            categories,
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationThresholds;
    use crate::profile::{DataSource, ElevationRange};
    use crate::technical::{TechnicalKind, TechnicalSection};
    use crate::track::BoundingBox;
    use crate::validation::validate_course;

    fn profile() -> CourseProfile {
        CourseProfile {
            name: "Ridge Ride".to_string(),
            location: None,
            total_distance_miles: 42.04,
            total_elevation_gain_ft: 2210.4,
            climbs: vec![ClimbSegment {
                name: "Climb 1".to_string(),
                start_mile: 3.0,
                length_miles: 1.2,
                avg_grade: 5.5,
                max_grade: 8.0,
                elevation_gain_ft: 348.5,
            }],
            technical_sections: vec![TechnicalSection {
                start_mile: 10.0,
                end_mile: 10.5,
                kind: TechnicalKind::SteepDescent,
                peak_variance: 0.0,
                reversals: 0,
                steepest_grade: -11.0,
            }],
            bounds: BoundingBox {
                min_lat: 40.0,
                max_lat: 40.5,
                min_lon: -77.5,
                max_lon: -77.0,
            },
            elevation_range: ElevationRange {
                min_ft: 600.0,
                max_ft: 2100.0,
            },
            data_source: DataSource {
                kind: "gpx".to_string(),
                source: "ridge.gpx".to_string(),
                total_gps_points: 2400,
                native_elevation_fraction: 1.0,
            },
        }
    }

    #[test]
    fn test_profile_document_shape() {
        let doc = ProfileDocument::new(&profile(), None);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["bike_distance_miles"], 42.0);
        assert_eq!(json["bike_elevation_gain_ft"], 2210.0);
        assert_eq!(json["key_climbs"][0]["name"], "Climb 1");
        assert_eq!(json["key_climbs"][0]["elevation_gain_ft"], 348.5);
        assert_eq!(
            json["technical_sections"][0],
            "Steep descent at mile 10.0 (0.5mi, -11.0% grade)"
        );
        assert_eq!(json["data_source"]["type"], "gpx");
        assert!(json["data_source"]["data_quality_score"].is_null());
        assert!(json.get("data_quality_report").is_none());
    }

    #[test]
    fn test_report_document_keys_categories() {
        let profile = profile();
        let report = validate_course(&profile, None, &ValidationThresholds::default());
        let doc = ProfileDocument::new(&profile, Some(&report));
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["data_source"]["data_quality_score"], report.overall_score);
        let categories = json["data_quality_report"]["categories"].as_object().unwrap();
        assert_eq!(categories.len(), 8);
        assert!(categories.contains_key("gps_completeness"));
        assert_eq!(json["data_quality_report"]["rating"], "Excellent");
    }
}
