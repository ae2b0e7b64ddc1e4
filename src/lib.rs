//! Blank QC Tools
//!
//! False-positive screening for sequencing runs using negative controls
//! ("blanks").
//!
//! This library provides shared functionality for:
//! - Per-sample genome recovery and coverage metrics from aligned reads
//! - Blank baseline computation and run acceptance gating
//! - Threshold-based false-positive classification
//! - Summary tables, JSON reports and descriptive plots

pub mod assess;
pub mod blanks;
pub mod calculate;
pub mod metrics;
pub mod plotting;
pub mod reporting;
pub mod tables;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequencing platform of a run.
///
/// The platform decides which recovery depth the rules look at (10x for
/// short reads, 20x for long reads) and how many checks a sample must fail
/// before it is called a false positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "ILLUMINA")]
    Illumina,
    #[serde(rename = "OXFORD_NANOPORE")]
    OxfordNanopore,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Illumina => "ILLUMINA",
            Platform::OxfordNanopore => "OXFORD_NANOPORE",
        }
    }

    pub fn is_long_read(self) -> bool {
        matches!(self, Platform::OxfordNanopore)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a per-run metrics table.
///
/// The metrics stage fills every field; the blank_* fields carry the run's
/// blank baseline so each row can be assessed on its own later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub runname: String,
    pub filename: String,
    pub sample_name: String,
    pub sequencing_platform: Platform,
    pub ct_platform_1: String,
    pub ct_platform_2: String,
    pub max_ct_value: f64,
    pub min_ct_value: f64,
    pub mean_cov: f64,
    pub pc_pos_gte_10: f64,
    pub pc_pos_gte_20: f64,
    pub no_reads: u64,
    pub blank_coverage: f64,
    pub blank_recovery_10: f64,
    pub blank_recovery_20: f64,
    pub blank_reads: u64,
}

impl SampleRecord {
    /// A record awaiting metrics, with assay fields defaulted to "unknown".
    pub fn pending(
        runname: &str,
        platform: Platform,
        filename: &str,
        sample_name: &str,
    ) -> Self {
        Self {
            runname: runname.to_string(),
            filename: filename.to_string(),
            sample_name: sample_name.to_string(),
            sequencing_platform: platform,
            ct_platform_1: "UNKNOWN".to_string(),
            ct_platform_2: "UNKNOWN".to_string(),
            max_ct_value: 0.0,
            min_ct_value: 0.0,
            mean_cov: 0.0,
            pc_pos_gte_10: 0.0,
            pc_pos_gte_20: 0.0,
            no_reads: 0,
            blank_coverage: 0.0,
            blank_recovery_10: 0.0,
            blank_recovery_20: 0.0,
            blank_reads: 0,
        }
    }
}

/// A summary-table row: a [`SampleRecord`] completed with its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessedRecord {
    pub runname: String,
    pub filename: String,
    pub sample_name: String,
    pub sequencing_platform: Platform,
    pub ct_platform_1: String,
    pub ct_platform_2: String,
    pub max_ct_value: f64,
    pub min_ct_value: f64,
    pub mean_cov: f64,
    pub pc_pos_gte_10: f64,
    pub pc_pos_gte_20: f64,
    pub no_reads: u64,
    pub blank_coverage: f64,
    pub blank_recovery_10: f64,
    pub blank_recovery_20: f64,
    pub blank_reads: u64,
    pub false_positive: bool,
}

impl AssessedRecord {
    pub fn from_record(record: SampleRecord, false_positive: bool) -> Self {
        Self {
            runname: record.runname,
            filename: record.filename,
            sample_name: record.sample_name,
            sequencing_platform: record.sequencing_platform,
            ct_platform_1: record.ct_platform_1,
            ct_platform_2: record.ct_platform_2,
            max_ct_value: record.max_ct_value,
            min_ct_value: record.min_ct_value,
            mean_cov: record.mean_cov,
            pc_pos_gte_10: record.pc_pos_gte_10,
            pc_pos_gte_20: record.pc_pos_gte_20,
            no_reads: record.no_reads,
            blank_coverage: record.blank_coverage,
            blank_recovery_10: record.blank_recovery_10,
            blank_recovery_20: record.blank_recovery_20,
            blank_reads: record.blank_reads,
            false_positive,
        }
    }
}
