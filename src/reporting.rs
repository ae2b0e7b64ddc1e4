//! JSON reports accompanying the CSV tables.
//!
//! The tables are the data contract; these reports are the human-facing
//! rollup of what a stage did.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::blanks::BlankBaseline;
use crate::{AssessedRecord, Platform};

/// Metrics-stage report: what the run's blanks looked like and how many
/// sample records were written.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_name: String,
    pub platform: Platform,
    pub baseline: BlankBaseline,
    pub samples_written: usize,
}

/// Assessment-stage rollup across all merged runs.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub site_name: String,
    pub total_samples: usize,
    pub false_positives: usize,
    pub false_positive_rate: f64,
    pub platforms: Vec<PlatformBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformBreakdown {
    pub platform: Platform,
    pub samples: usize,
    pub false_positives: usize,
}

impl AssessmentSummary {
    pub fn from_records(site_name: &str, records: &[AssessedRecord]) -> Self {
        let total_samples = records.len();
        let false_positives = records.iter().filter(|r| r.false_positive).count();

        let mut platforms = Vec::new();
        for platform in [Platform::Illumina, Platform::OxfordNanopore] {
            let subset: Vec<&AssessedRecord> = records
                .iter()
                .filter(|r| r.sequencing_platform == platform)
                .collect();
            if subset.is_empty() {
                continue;
            }
            platforms.push(PlatformBreakdown {
                platform,
                samples: subset.len(),
                false_positives: subset.iter().filter(|r| r.false_positive).count(),
            });
        }

        let false_positive_rate = if total_samples > 0 {
            100.0 * false_positives as f64 / total_samples as f64
        } else {
            0.0
        };
        Self {
            site_name: site_name.to_string(),
            total_samples,
            false_positives,
            false_positive_rate,
            platforms,
        }
    }
}

/// Export a report to pretty-printed JSON.
pub fn export_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json_content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json_content)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(())
}
