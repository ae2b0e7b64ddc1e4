//! Blank QC metrics tool
//!
//! Per-run genome coverage metrics, gated on clean negative controls

use anyhow::Result;
use blankqc_tools::calculate::{run_calculate, CalculateOutcome, CalculateSettings};
use blankqc_tools::metrics::BamMetrics;
use blankqc_tools::Platform;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

fn main() -> Result<()> {
    let matches = Command::new("blankqc-calculate")
        .version("0.1.0")
        .about("Calculate per-sample genome coverage metrics for one run")
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
                .help("Directory the per-run tables accumulate in")
                .default_value("blankqc_db"),
        )
        .arg(
            Arg::new("assay_table")
                .long("assay-table")
                .value_name("CSV")
                .help("Table with assay information per sample"),
        )
        .arg(
            Arg::new("blank_read_cutoff")
                .long("blank-read-cutoff")
                .value_name("COUNT")
                .help("Run skipped if any blank has more mapped reads")
                .default_value("500"),
        )
        .arg(
            Arg::new("blank_recovery_cutoff")
                .long("blank-recovery-cutoff")
                .value_name("PERCENT")
                .help("Run skipped if any blank recovers more of the genome")
                .default_value("4.0"),
        )
        .arg(
            Arg::new("ont")
                .long("ont")
                .help("Run is OXFORD_NANOPORE data")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("readlen")
                .short('l')
                .long("readlen")
                .value_name("LENGTH")
                .help("Minimum length for a mapped read (ILLUMINA only)")
                .default_value("148"),
        )
        .arg(
            Arg::new("runname")
                .value_name("RUNNAME")
                .help("Informative label for this run")
                .required(true),
        )
        .arg(
            Arg::new("bamfolder")
                .value_name("DIRECTORY")
                .help("Folder of aligned BAM files, blanks included")
                .required(true),
        )
        .arg(
            Arg::new("blanks")
                .value_name("BLANK")
                .help("Negative control BAM file name(s)")
                .num_args(1..)
                .required(true),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let platform = if matches.get_flag("ont") {
        Platform::OxfordNanopore
    } else {
        Platform::Illumina
    };
    let settings = CalculateSettings {
        run_name: matches.get_one::<String>("runname").unwrap().clone(),
        platform,
        alignment_dir: PathBuf::from(matches.get_one::<String>("bamfolder").unwrap()),
        blank_files: matches
            .get_many::<String>("blanks")
            .unwrap()
            .cloned()
            .collect(),
        assay_table: matches.get_one::<String>("assay_table").map(PathBuf::from),
        db_dir: PathBuf::from(matches.get_one::<String>("db").unwrap()),
        blank_read_cutoff: matches
            .get_one::<String>("blank_read_cutoff")
            .unwrap()
            .parse()?,
        blank_recovery_cutoff: matches
            .get_one::<String>("blank_recovery_cutoff")
            .unwrap()
            .parse()?,
    };
    let metrics = BamMetrics::new(matches.get_one::<String>("readlen").unwrap().parse()?);

    println!("🧪 Blank QC metrics");
    println!("Run: {} ({})", settings.run_name, settings.platform);
    println!("BAM folder: {}", settings.alignment_dir.display());

    if !settings.alignment_dir.is_dir() {
        anyhow::bail!(
            "BAM folder does not exist: {}",
            settings.alignment_dir.display()
        );
    }

    match run_calculate(&settings, &metrics)? {
        CalculateOutcome::Completed { table, samples } => {
            println!("✅ Metrics complete!");
            println!("  Samples written: {}", samples);
            println!("💾 Table saved to: {}", table.display());
        }
        CalculateOutcome::RunRejected { baseline } => {
            println!("⚠️ Run rejected: blanks carry too much target content");
            println!("  Max blank coverage: {:.2}", baseline.max_coverage);
            println!("  Max blank recovery >10x: {:.2}%", baseline.max_recovery_10);
            println!("  Max blank recovery >20x: {:.2}%", baseline.max_recovery_20);
            println!("  Max blank mapped reads: {}", baseline.max_reads);
        }
        CalculateOutcome::NoData => {
            println!("⚠️ No sample records produced, nothing written");
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
