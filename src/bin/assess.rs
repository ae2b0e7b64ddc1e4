//! Blank QC assessment tool
//!
//! Merges per-run metric tables and flags likely false-positive detections

use anyhow::Result;
use blankqc_tools::assess::{run_assessment, AssessmentThresholds};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

fn main() -> Result<()> {
    let matches = Command::new("blankqc-assess")
        .version("0.1.0")
        .about("Determine false positives from per-run metric tables")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("db")
                .short('d')
                .long("db")
                .value_name("DIRECTORY")
                .help("Directory holding the per-run tables")
                .default_value("blankqc_db"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIRECTORY")
                .help("Output directory for the site summary")
                .default_value("blankqc_out"),
        )
        .arg(
            Arg::new("coverage")
                .short('c')
                .long("coverage")
                .value_name("FOLD")
                .help("Minimum fold genome coverage over the blank baseline")
                .default_value("2.0"),
        )
        .arg(
            Arg::new("recovery")
                .short('r')
                .long("recovery")
                .value_name("FOLD")
                .help("Minimum fold genome recovery over the blank baseline")
                .default_value("2.0"),
        )
        .arg(
            Arg::new("noreads")
                .short('n')
                .long("noreads")
                .value_name("FOLD")
                .help("Minimum fold number of mapped reads over the blank baseline")
                .default_value("5.0"),
        )
        .arg(
            Arg::new("min_coverage")
                .long("min-coverage")
                .value_name("COVERAGE")
                .help("Minimum absolute genome coverage")
                .default_value("2.0"),
        )
        .arg(
            Arg::new("min_recovery")
                .long("min-recovery")
                .value_name("PERCENT")
                .help("Minimum absolute genome recovery")
                .default_value("2.0"),
        )
        .arg(
            Arg::new("min_reads")
                .long("min-reads")
                .value_name("COUNT")
                .help("Minimum absolute number of mapped reads")
                .default_value("30.0"),
        )
        .arg(
            Arg::new("sitename")
                .value_name("SITENAME")
                .help("Informative label for your site")
                .required(true),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let db_dir = PathBuf::from(matches.get_one::<String>("db").unwrap());
    let out_dir = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let site_name = matches.get_one::<String>("sitename").unwrap();
    let thresholds = AssessmentThresholds {
        coverage_fold: matches.get_one::<String>("coverage").unwrap().parse()?,
        min_coverage: matches.get_one::<String>("min_coverage").unwrap().parse()?,
        recovery_fold: matches.get_one::<String>("recovery").unwrap().parse()?,
        min_recovery: matches.get_one::<String>("min_recovery").unwrap().parse()?,
        reads_fold: matches.get_one::<String>("noreads").unwrap().parse()?,
        min_reads: matches.get_one::<String>("min_reads").unwrap().parse()?,
    };

    println!("🧪 Blank QC assessment");
    println!("Tables: {}", db_dir.display());
    println!("Site: {}", site_name);

    if !db_dir.is_dir() {
        anyhow::bail!("table directory does not exist: {}", db_dir.display());
    }

    match run_assessment(&db_dir, &out_dir, site_name, &thresholds)? {
        Some(summary) => {
            println!("✅ Assessment complete!");
            println!("💾 Summary saved to: {}", summary.display());
        }
        None => {
            println!("⚠️ No records found, nothing written");
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
