//! Assessment stage: false-positive classification against blank baselines.
//!
//! All per-run tables are merged and every sample is scored against its own
//! run's blank baseline. A sample is only called a false positive when it
//! resembles blank noise on every independent axis its platform defines;
//! failing some checks but not all keeps the detection.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::reporting::{self, AssessmentSummary};
use crate::tables;
use crate::{AssessedRecord, Platform, SampleRecord};

/// Cutoffs for the false-positive rules: fold values relative to the blank
/// baseline plus absolute floors independent of it.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentThresholds {
    pub coverage_fold: f64,
    pub min_coverage: f64,
    pub recovery_fold: f64,
    pub min_recovery: f64,
    pub reads_fold: f64,
    pub min_reads: f64,
}

impl Default for AssessmentThresholds {
    fn default() -> Self {
        Self {
            coverage_fold: 2.0,
            min_coverage: 2.0,
            recovery_fold: 2.0,
            min_recovery: 2.0,
            reads_fold: 5.0,
            min_reads: 30.0,
        }
    }
}

impl Platform {
    /// Number of checks this platform runs; a sample must fail every one of
    /// them to be called a false positive.
    pub fn check_count(self) -> u32 {
        match self {
            Platform::Illumina => 3,
            Platform::OxfordNanopore => 2,
        }
    }

    /// Count how many of this platform's checks the record fails. Read
    /// counts are widened to f64 so every comparison is float arithmetic.
    pub fn failed_checks(self, record: &SampleRecord, t: &AssessmentThresholds) -> u32 {
        let mut failed = 0;
        // The coverage check is shared between platforms.
        if record.mean_cov * t.coverage_fold < record.blank_coverage
            || record.mean_cov < t.min_coverage
        {
            failed += 1;
        }
        match self {
            Platform::Illumina => {
                if record.pc_pos_gte_10 < record.blank_recovery_10 * t.recovery_fold
                    || record.pc_pos_gte_10 < t.min_recovery
                {
                    failed += 1;
                }
                let reads = record.no_reads as f64;
                if reads < record.blank_reads as f64 * t.reads_fold || reads < t.min_reads {
                    failed += 1;
                }
            }
            Platform::OxfordNanopore => {
                if record.pc_pos_gte_20 < record.blank_recovery_20 * t.recovery_fold
                    || record.pc_pos_gte_20 < t.min_recovery
                {
                    failed += 1;
                }
            }
        }
        failed
    }
}

/// True when the record fails every check its platform defines.
pub fn classify(record: &SampleRecord, thresholds: &AssessmentThresholds) -> bool {
    let platform = record.sequencing_platform;
    platform.failed_checks(record, thresholds) == platform.check_count()
}

/// Merge every per-run table under `db_dir`, classify, and write the site
/// summary. Returns the summary path, or `None` when there was no data.
pub fn run_assessment(
    db_dir: &Path,
    out_dir: &Path,
    site_name: &str,
    thresholds: &AssessmentThresholds,
) -> Result<Option<PathBuf>> {
    info!("assessing per-run tables under {}", db_dir.display());

    // Later tables overwrite earlier ones on sample-name collision; tables
    // load in sorted filename order so reruns resolve collisions the same
    // way.
    let mut merged: BTreeMap<String, SampleRecord> = BTreeMap::new();
    for table in tables::list_tables(db_dir, ".csv")? {
        debug!("loading per-run table {}", table.display());
        for record in tables::read_run_table(&table)? {
            merged.insert(record.sample_name.clone(), record);
        }
    }

    if merged.is_empty() {
        warn!("no data found under {}", db_dir.display());
        return Ok(None);
    }

    let assessed: Vec<AssessedRecord> = merged
        .into_values()
        .map(|record| {
            let false_positive = classify(&record, thresholds);
            AssessedRecord::from_record(record, false_positive)
        })
        .collect();

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;
    let out_path = out_dir.join(format!("blankqc.{}.summary.csv", site_name));
    tables::write_summary_table(&out_path, &assessed)?;

    let summary = AssessmentSummary::from_records(site_name, &assessed);
    let summary_path = out_dir.join(format!("blankqc.{}.summary.json", site_name));
    reporting::export_json(&summary, &summary_path)?;

    info!(
        "wrote {} assessed record(s) to {}",
        assessed.len(),
        out_path.display()
    );
    Ok(Some(out_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_read_record() -> SampleRecord {
        let mut record = SampleRecord::pending("run1", Platform::Illumina, "s1.bam", "s1");
        record.blank_coverage = 1.0;
        record.blank_recovery_10 = 2.0;
        record.blank_recovery_20 = 1.5;
        record.blank_reads = 20;
        record
    }

    fn long_read_record() -> SampleRecord {
        let mut record = short_read_record();
        record.sequencing_platform = Platform::OxfordNanopore;
        record
    }

    #[test]
    fn dead_short_read_sample_fails_all_three_checks() {
        let record = short_read_record();
        let thresholds = AssessmentThresholds::default();

        assert_eq!(Platform::Illumina.failed_checks(&record, &thresholds), 3);
        assert!(classify(&record, &thresholds));
    }

    #[test]
    fn short_read_sample_failing_two_of_three_is_kept() {
        // Strong read count, weak coverage and recovery.
        let mut record = short_read_record();
        record.no_reads = 100_000;
        let thresholds = AssessmentThresholds::default();

        assert_eq!(Platform::Illumina.failed_checks(&record, &thresholds), 2);
        assert!(!classify(&record, &thresholds));
    }

    #[test]
    fn short_read_sample_passing_everything_is_kept() {
        let mut record = short_read_record();
        record.mean_cov = 50.0;
        record.pc_pos_gte_10 = 95.0;
        record.no_reads = 100_000;

        assert!(!classify(&record, &AssessmentThresholds::default()));
    }

    #[test]
    fn long_read_sample_failing_one_of_two_is_kept() {
        // Coverage passes, 20x recovery fails.
        let mut record = long_read_record();
        record.mean_cov = 50.0;
        record.pc_pos_gte_20 = 0.0;
        let thresholds = AssessmentThresholds::default();

        assert_eq!(
            Platform::OxfordNanopore.failed_checks(&record, &thresholds),
            1
        );
        assert!(!classify(&record, &thresholds));
    }

    #[test]
    fn long_read_sample_failing_both_is_a_false_positive() {
        let record = long_read_record();
        let thresholds = AssessmentThresholds::default();

        assert_eq!(
            Platform::OxfordNanopore.failed_checks(&record, &thresholds),
            2
        );
        assert!(classify(&record, &thresholds));
    }

    #[test]
    fn long_read_uses_20x_recovery_not_10x() {
        let mut record = long_read_record();
        record.mean_cov = 50.0;
        record.pc_pos_gte_10 = 0.0;
        record.pc_pos_gte_20 = 95.0;

        assert!(!classify(&record, &AssessmentThresholds::default()));
    }

    #[test]
    fn absolute_floors_apply_even_against_a_zero_baseline() {
        // Clean blanks: all baseline fields zero. The fold comparisons all
        // pass, but the absolute floors still catch a near-empty sample.
        let mut record = SampleRecord::pending("run1", Platform::Illumina, "s1.bam", "s1");
        record.mean_cov = 0.5;
        record.pc_pos_gte_10 = 0.5;
        record.no_reads = 3;

        assert!(classify(&record, &AssessmentThresholds::default()));
    }

    #[test]
    fn assessment_merges_tables_last_write_wins() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_dir = tmp.path().join("db");
        let out_dir = tmp.path().join("out");
        std::fs::create_dir(&db_dir).expect("mkdir");

        let mut early = SampleRecord::pending("run1", Platform::Illumina, "s1.bam", "shared");
        early.no_reads = 111;
        let mut late = SampleRecord::pending("run2", Platform::Illumina, "s1.bam", "shared");
        late.no_reads = 222;
        tables::write_run_table(&db_dir.join("blankqc.db.run1.csv"), &[early]).expect("write");
        tables::write_run_table(&db_dir.join("blankqc.db.run2.csv"), &[late]).expect("write");

        let out = run_assessment(&db_dir, &out_dir, "site", &AssessmentThresholds::default())
            .expect("assess")
            .expect("summary written");
        let records = tables::read_summary_table(&out).expect("parse");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].no_reads, 222);
        assert_eq!(records[0].runname, "run2");
    }

    #[test]
    fn assessment_is_byte_identical_on_rerun() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_dir = tmp.path().join("db");
        let out_dir = tmp.path().join("out");
        std::fs::create_dir(&db_dir).expect("mkdir");

        let mut a = SampleRecord::pending("run1", Platform::Illumina, "a.bam", "a");
        a.mean_cov = 10.0;
        a.no_reads = 50;
        let b = SampleRecord::pending("run1", Platform::OxfordNanopore, "b.bam", "b");
        tables::write_run_table(&db_dir.join("blankqc.db.run1.csv"), &[a, b]).expect("write");

        let thresholds = AssessmentThresholds::default();
        let out = run_assessment(&db_dir, &out_dir, "site", &thresholds)
            .expect("assess")
            .expect("summary written");
        let first = std::fs::read(&out).expect("read");

        let out = run_assessment(&db_dir, &out_dir, "site", &thresholds)
            .expect("assess again")
            .expect("summary written");
        let second = std::fs::read(&out).expect("read");

        assert_eq!(first, second);
    }

    #[test]
    fn empty_db_directory_writes_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let db_dir = tmp.path().join("db");
        let out_dir = tmp.path().join("out");
        std::fs::create_dir(&db_dir).expect("mkdir");

        let out = run_assessment(&db_dir, &out_dir, "site", &AssessmentThresholds::default())
            .expect("assess");

        assert!(out.is_none());
        assert!(!out_dir.exists());
    }
}
