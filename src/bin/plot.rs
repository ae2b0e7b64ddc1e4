//! Blank QC plot tool
//!
//! Renders descriptive charts over the site summary tables

use anyhow::Result;
use blankqc_tools::plotting::run_plots;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

fn main() -> Result<()> {
    let matches = Command::new("blankqc-plot")
        .version("0.1.0")
        .about("Make summary plots from assessed site tables")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIRECTORY")
                .help("Directory holding summary tables; charts land here too")
                .default_value("blankqc_out"),
        )
        .arg(
            Arg::new("platform_cutoff")
                .long("platform-cutoff")
                .value_name("COUNT")
                .help("Samples a platform needs before it is plotted")
                .default_value("50"),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let out_dir = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let platform_cutoff: usize = matches
        .get_one::<String>("platform_cutoff")
        .unwrap()
        .parse()?;

    println!("📊 Blank QC plots");
    println!("Summary directory: {}", out_dir.display());

    if !out_dir.is_dir() {
        anyhow::bail!("summary directory does not exist: {}", out_dir.display());
    }

    let written = run_plots(&out_dir, platform_cutoff)?;
    if written.is_empty() {
        println!("⚠️ No charts written");
    } else {
        println!("✅ Plots complete!");
        for path in &written {
            println!("💾 {}", path.display());
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
