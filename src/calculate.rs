//! Metrics stage: per-run sample metrics, gated on clean negative controls.
//!
//! One invocation covers one run: a directory of aligned BAM files sharing a
//! platform and a set of designated blanks. Output is a per-run CSV table
//! plus a small JSON run report, or nothing when the blanks fail the gate.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};

use crate::blanks::{BlankBaseline, BlankScreener};
use crate::metrics::AlignmentMetrics;
use crate::reporting::{self, RunReport};
use crate::tables;
use crate::{Platform, SampleRecord};

const ALIGNMENT_EXT: &str = "bam";

/// Everything the metrics stage needs for one run.
#[derive(Debug, Clone)]
pub struct CalculateSettings {
    pub run_name: String,
    pub platform: Platform,
    /// Directory holding the run's alignment files, blanks included.
    pub alignment_dir: PathBuf,
    /// Blank file names, relative to `alignment_dir`.
    pub blank_files: Vec<String>,
    /// Optional assay-metadata table; without it every `.bam` in the
    /// directory becomes a sample named after its file.
    pub assay_table: Option<PathBuf>,
    /// Directory the per-run tables accumulate in.
    pub db_dir: PathBuf,
    pub blank_read_cutoff: u64,
    pub blank_recovery_cutoff: f64,
}

/// How a metrics-stage invocation ended.
#[derive(Debug)]
pub enum CalculateOutcome {
    /// Per-run table and report written.
    Completed { table: PathBuf, samples: usize },
    /// Blanks carried too much target content; nothing written.
    RunRejected { baseline: BlankBaseline },
    /// No sample produced a record; nothing written.
    NoData,
}

pub fn run_calculate<M: AlignmentMetrics>(
    settings: &CalculateSettings,
    metrics: &M,
) -> Result<CalculateOutcome> {
    info!("starting metrics stage for run {}", settings.run_name);
    debug!("platform is {}", settings.platform);

    let mut pending = prepopulate_records(settings)?;

    // Every blank must be present before any metrics are computed.
    let blank_paths: Vec<PathBuf> = settings
        .blank_files
        .iter()
        .map(|name| settings.alignment_dir.join(name))
        .collect();
    let missing: Vec<&PathBuf> = blank_paths.iter().filter(|p| !p.exists()).collect();
    if !missing.is_empty() {
        for path in &missing {
            error!("filepath to blank does not exist: {}", path.display());
        }
        bail!(
            "{} blank file(s) missing under {}",
            missing.len(),
            settings.alignment_dir.display()
        );
    }

    let screener = BlankScreener::new(
        settings.blank_read_cutoff,
        settings.blank_recovery_cutoff,
    );
    let baseline = screener.baseline(&blank_paths, settings.platform, metrics)?;
    info!("max blank genome coverage: {}", baseline.max_coverage);
    info!("max blank genome recovery >10x: {}", baseline.max_recovery_10);
    info!("max blank genome recovery >20x: {}", baseline.max_recovery_20);
    info!("max blank number of mapped reads: {}", baseline.max_reads);

    if !screener.is_baseline_acceptable(&baseline, settings.platform) {
        info!(
            "run {} skipped: blanks carry too much target content",
            settings.run_name
        );
        return Ok(CalculateOutcome::RunRejected { baseline });
    }
    info!("blanks ok");

    let mut completed: Vec<SampleRecord> = Vec::new();
    for filename in alignment_files(settings)? {
        let Some(mut record) = pending.remove(&filename) else {
            warn!(
                "extra alignment file in directory, no data for {}, skipped",
                filename
            );
            continue;
        };
        let path = settings.alignment_dir.join(&filename);
        debug!("fetching coverage for {}", path.display());
        let m = metrics.genome_metrics(&path, settings.platform)?;
        record.mean_cov = m.mean_coverage;
        record.pc_pos_gte_10 = m.pc_ref_gte_10;
        record.pc_pos_gte_20 = m.pc_ref_gte_20;
        record.no_reads = m.mapped_reads;
        record.blank_coverage = baseline.max_coverage;
        record.blank_recovery_10 = baseline.max_recovery_10;
        record.blank_recovery_20 = baseline.max_recovery_20;
        record.blank_reads = baseline.max_reads;
        completed.push(record);
    }

    if completed.is_empty() {
        warn!("no data found for run {}", settings.run_name);
        return Ok(CalculateOutcome::NoData);
    }

    fs::create_dir_all(&settings.db_dir)
        .with_context(|| format!("failed to create db directory {}", settings.db_dir.display()))?;
    let table = settings
        .db_dir
        .join(format!("blankqc.db.{}.csv", settings.run_name));
    tables::write_run_table(&table, &completed)?;

    let report = RunReport {
        run_name: settings.run_name.clone(),
        platform: settings.platform,
        baseline,
        samples_written: completed.len(),
    };
    let report_path = settings
        .db_dir
        .join(format!("blankqc.db.{}.report.json", settings.run_name));
    reporting::export_json(&report, &report_path)?;

    info!(
        "wrote {} sample record(s) to {}",
        completed.len(),
        table.display()
    );
    Ok(CalculateOutcome::Completed {
        table,
        samples: completed.len(),
    })
}

/// One pending record per non-blank sample, keyed by filename: from the
/// assay table when given, else one per alignment file in the directory.
fn prepopulate_records(settings: &CalculateSettings) -> Result<BTreeMap<String, SampleRecord>> {
    let mut records = BTreeMap::new();
    if let Some(table) = &settings.assay_table {
        debug!("reading assay data from {}", table.display());
        for info in tables::read_assay_table(table)? {
            let mut record = SampleRecord::pending(
                &settings.run_name,
                settings.platform,
                &info.filename,
                &info.sample_name,
            );
            if let Some(ct) = info.ct_platform_1 {
                record.ct_platform_1 = ct;
            }
            if let Some(ct) = info.ct_platform_2 {
                record.ct_platform_2 = ct;
            }
            record.max_ct_value = info.max_ct_value.unwrap_or(0.0);
            // Tables usually report only the highest Ct observed.
            record.min_ct_value = info.min_ct_value.unwrap_or(record.max_ct_value);
            records.insert(info.filename, record);
        }
    } else {
        for filename in alignment_files(settings)? {
            let record = SampleRecord::pending(
                &settings.run_name,
                settings.platform,
                &filename,
                &filename,
            );
            records.insert(filename, record);
        }
    }
    Ok(records)
}

/// Non-blank alignment file names in the run directory, sorted.
fn alignment_files(settings: &CalculateSettings) -> Result<Vec<String>> {
    let entries = fs::read_dir(&settings.alignment_dir).with_context(|| {
        format!(
            "failed to read alignment directory {}",
            settings.alignment_dir.display()
        )
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if settings.blank_files.iter().any(|blank| blank == &name) {
            continue;
        }
        if Path::new(&name).extension().and_then(|e| e.to_str()) != Some(ALIGNMENT_EXT) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
