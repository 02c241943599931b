//! course-profiler CLI
//!
//! Usage:
//!   course-profiler profile <FILE.gpx> [--config cfg.json] [--output out.json] [--with-report]
//!   course-profiler validate <FOLDER> [--config cfg.json] [--output DIR] [--min-score N] [--verbose]

use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use course_profiler::batch::{analyze_gpx_file, analyze_gpx_files, find_gpx_files, write_quality_summary, QualitySummaryRow};
use course_profiler::document::ProfileDocument;
use course_profiler::EngineConfig;

#[derive(Parser)]
#[command(name = "course-profiler")]
#[command(about = "Build cycling course profiles from GPX tracks and grade their data quality", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the course profile for one GPX file
    Profile {
        /// GPX file to analyse
        file: PathBuf,

        /// JSON file overriding default thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the profile JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Embed the data quality report in the output
        #[arg(long)]
        with_report: bool,
    },

    /// Validate every GPX file under a folder
    Validate {
        /// Folder searched recursively for .gpx files
        folder: PathBuf,

        /// JSON file overriding default thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for per-course JSON and quality_summary.csv
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with an error when any course scores below this
        #[arg(long)]
        min_score: Option<f64>,

        /// Print the full report for every course
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Profile {
            file,
            config,
            output,
            with_report,
        } => run_profile(&file, config.as_deref(), output.as_deref(), with_report),
        Commands::Validate {
            folder,
            config,
            output,
            min_score,
            verbose,
        } => run_validate(&folder, config.as_deref(), output.as_deref(), min_score, verbose),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            println!("⚙️  Loading configuration from {}", path.display());
            EngineConfig::from_json_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn run_profile(
    file: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    with_report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;

    println!("🚴 Profiling {}", file.display());
    let (analysis, report) = analyze_gpx_file(file, &config)?;
    let profile = &analysis.profile;

    println!("   📏 Distance: {:.1} miles", profile.total_distance_miles);
    println!("   ⛰️  Elevation gain: {:.0} ft", profile.total_elevation_gain_ft);
    println!("   🧗 Climbs: {}", profile.climbs.len());
    for climb in &profile.climbs {
        println!(
            "      {} at mile {:.1}: {:.1}mi @ {:.1}% (max {:.1}%), +{:.0} ft",
            climb.name, climb.start_mile, climb.length_miles, climb.avg_grade, climb.max_grade, climb.elevation_gain_ft
        );
    }
    for section in &profile.technical_sections {
        println!("   ⚠️  {}", section.description());
    }
    println!("   📊 Data quality: {:.1}/100 ({})", report.overall_score, report.rating);

    let document = ProfileDocument::new(profile, with_report.then_some(&report));
    match output {
        Some(path) => {
            write_json(&document, path)?;
            println!("💾 Profile saved to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&document)?),
    }

    Ok(())
}

fn run_validate(
    folder: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    min_score: Option<f64>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let output_dir = output.map(Path::to_path_buf).unwrap_or_else(|| folder.join("Quality Reports"));
    fs::create_dir_all(&output_dir)?;

    println!("\n{}", "=".repeat(60));
    println!("🔍 Validating GPX files in {}", folder.display());
    println!("{}", "=".repeat(60));

    let files = find_gpx_files(folder)?;
    if files.is_empty() {
        println!("❌ No GPX files found");
        return Ok(());
    }
    println!("📁 Found {} GPX files", files.len());
    println!("⚡ Using parallel processing on {} cores", num_cpus::get());

    let start = Instant::now();
    let outcomes = analyze_gpx_files(&files, &config);

    let mut below_threshold = Vec::new();
    for outcome in &outcomes {
        let file_name = outcome.path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        match &outcome.result {
            Ok((analysis, report)) => {
                let icon = if report.pass { "✅" } else { "❌" };
                println!(
                    "{} {} - {:.1}/100 ({}), {} critical, {} warnings",
                    icon,
                    file_name,
                    report.overall_score,
                    report.rating,
                    report.critical_count(),
                    report.warning_count()
                );
                if verbose {
                    println!("{}", report);
                }

                let stem = outcome.path.file_stem().and_then(|s| s.to_str()).unwrap_or("course");
                let document = ProfileDocument::new(&analysis.profile, Some(report));
                write_json(&document, &output_dir.join(format!("{}.json", stem)))?;

                if min_score.map_or(false, |min| report.overall_score < min) {
                    below_threshold.push(file_name.to_string());
                }
            }
            Err(e) => {
                println!("⚠️  {} - {}", file_name, e);
                if min_score.is_some() {
                    below_threshold.push(file_name.to_string());
                }
            }
        }
    }

    let rows: Vec<QualitySummaryRow> = outcomes.iter().map(QualitySummaryRow::from_outcome).collect();
    let summary_path = output_dir.join("quality_summary.csv");
    write_quality_summary(&rows, &summary_path)?;

    let passed = rows.iter().filter(|r| r.pass).count();
    println!("\n📊 SUMMARY");
    println!("   Courses: {}  Passed: {}  Failed: {}", rows.len(), passed, rows.len() - passed);
    println!("   Finished in {:.1}s", start.elapsed().as_secs_f64());
    println!("💾 Summary saved to {}", summary_path.display());

    if let Some(min) = min_score {
        if !below_threshold.is_empty() {
            return Err(format!("{} course(s) scored below {}: {}", below_threshold.len(), min, below_threshold.join(", ")).into());
        }
    }

    Ok(())
}
