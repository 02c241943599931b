//! Folder-level runs: find GPX files, analyse them in parallel and summarise the
//! results in a CSV.
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::gpx_reader::load_gpx_file;
use crate::profile::CourseMetadata;
use crate::track::Waypoint;
use crate::validation::DataQualityReport;
use crate::{analyze_course, CourseAnalysis};

/// One analysed course with its report.
pub type AnalyzedCourse = (CourseAnalysis, DataQualityReport);

/// Analyses and validates in-memory courses in parallel. Results keep input order.
pub fn analyze_batch(courses: &[(CourseMetadata, Vec<Waypoint>)], config: &EngineConfig) -> Vec<Result<AnalyzedCourse>> {
    courses
        .par_iter()
        .map(|(metadata, waypoints)| -> Result<AnalyzedCourse> {
            let analysis = analyze_course(metadata, waypoints, config)?;
            let report = analysis.validate(config);
            Ok((analysis, report))
        })
        .collect()
}

/// Every `.gpx` file under `folder`, sorted by path.
pub fn find_gpx_files(folder: &Path) -> std::result::Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder) {
        let entry = entry?;
        let is_gpx = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("gpx"));
        if entry.file_type().is_file() && is_gpx {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: std::result::Result<AnalyzedCourse, String>,
}

pub fn analyze_gpx_file(path: &Path, config: &EngineConfig) -> std::result::Result<AnalyzedCourse, Box<dyn std::error::Error>> {
    let course = load_gpx_file(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let name = course.name.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unnamed course")
            .to_string()
    });

    let metadata = CourseMetadata::new(name).with_source("gpx", file_name);
    let analysis = analyze_course(&metadata, &course.waypoints, config)?;
    let report = analysis.validate(config);
    Ok((analysis, report))
}

pub fn analyze_gpx_files(paths: &[PathBuf], config: &EngineConfig) -> Vec<FileOutcome> {
    info!("Analysing {} GPX files on {} cores", paths.len(), num_cpus::get());

    paths
        .par_iter()
        .map(|path| {
            let result = analyze_gpx_file(path, config).map_err(|e| e.to_string());
            if let Err(e) = &result {
                warn!("{}: {}", path.display(), e);
            }
            FileOutcome {
                path: path.clone(),
                result,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummaryRow {
    pub file: String,
    pub course: String,
    pub distance_miles: Option<f64>,
    pub elevation_gain_ft: Option<f64>,
    pub climbs: Option<usize>,
    pub technical_sections: Option<usize>,
    pub quality_score: Option<f64>,
    pub rating: String,
    pub pass: bool,
    pub critical_issues: usize,
    pub warnings: usize,
    pub error: Option<String>,
}

impl QualitySummaryRow {
    pub fn from_outcome(outcome: &FileOutcome) -> Self {
        let file = outcome
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        match &outcome.result {
            Ok((analysis, report)) => {
                let profile = &analysis.profile;
                QualitySummaryRow {
                    file,
                    course: profile.name.clone(),
                    distance_miles: Some((profile.total_distance_miles * 100.0).round() / 100.0),
                    elevation_gain_ft: Some(profile.total_elevation_gain_ft.round()),
                    climbs: Some(profile.climbs.len()),
                    technical_sections: Some(profile.technical_sections.len()),
                    quality_score: Some(report.overall_score),
                    rating: report.rating.to_string(),
                    pass: report.pass,
                    critical_issues: report.critical_count(),
                    warnings: report.warning_count(),
                    error: None,
                }
            }
            Err(e) => QualitySummaryRow {
                file,
                course: String::new(),
                distance_miles: None,
                elevation_gain_ft: None,
                climbs: None,
                technical_sections: None,
                quality_score: None,
                rating: "Error".to_string(),
                pass: false,
                critical_issues: 0,
                warnings: 0,
                error: Some(e.clone()),
            },
        }
    }
}

pub fn write_quality_summary(rows: &[QualitySummaryRow], output_path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut wtr = Writer::from_path(output_path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::fs;

    fn meridian_course(name: &str, points: usize) -> (CourseMetadata, Vec<Waypoint>) {
        let waypoints = (0..points)
            .map(|i| Waypoint::new(40.0 + i as f64 * 0.005, -77.0, Some(800.0 + (i % 7) as f64)))
            .collect();
        (CourseMetadata::new(name), waypoints)
    }

    #[test]
    fn test_batch_keeps_input_order_and_errors() {
        let courses = vec![
            meridian_course("A", 1200),
            (CourseMetadata::new("Broken"), vec![Waypoint::new(40.0, -77.0, None)]),
            meridian_course("B", 600),
        ];
        let results = analyze_batch(&courses, &EngineConfig::default());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().0.profile.name, "A");
        assert_eq!(results[1].as_ref().unwrap_err(), &EngineError::InsufficientData { points: 1 });
        assert_eq!(results[2].as_ref().unwrap().0.profile.name, "B");
    }

    #[test]
    fn test_summary_csv_has_one_row_per_file() {
        let dir = std::env::temp_dir().join(format!("course_profiler_batch_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let output = dir.join("quality_summary.csv");

        let outcomes = vec![FileOutcome {
            path: PathBuf::from("rides/missing.gpx"),
            result: Err("Failed to open".to_string()),
        }];
        let rows: Vec<QualitySummaryRow> = outcomes.iter().map(QualitySummaryRow::from_outcome).collect();
        write_quality_summary(&rows, &output).unwrap();

        let written = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("file,course,distance_miles"));
        assert!(lines[1].starts_with("missing.gpx,"));
        assert!(lines[1].ends_with("Failed to open"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_find_gpx_files_filters_extensions() {
        let dir = std::env::temp_dir().join(format!("course_profiler_find_{}", std::process::id()));
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("a.gpx"), "").unwrap();
        fs::write(dir.join("nested").join("b.GPX"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        let files = find_gpx_files(&dir).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().is_some()));

        fs::remove_dir_all(&dir).unwrap();
    }
}
