//! CSV tables: assay metadata in, per-run metric tables and site summaries
//! in and out.
//!
//! Rows are typed structs so numeric cells are parsed at load time; a
//! non-numeric cell in a metric column is a malformed table, not a value to
//! work around.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{AssessedRecord, SampleRecord};

/// One row of the optional assay-metadata table.
///
/// Only `filename` and `sample_name` are required; assay columns may be
/// absent entirely or left empty per row.
#[derive(Debug, Clone, Deserialize)]
pub struct AssayInfo {
    pub filename: String,
    pub sample_name: String,
    #[serde(default)]
    pub ct_platform_1: Option<String>,
    #[serde(default)]
    pub ct_platform_2: Option<String>,
    #[serde(default)]
    pub max_ct_value: Option<f64>,
    #[serde(default)]
    pub min_ct_value: Option<f64>,
}

pub fn read_assay_table(path: &Path) -> Result<Vec<AssayInfo>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open assay table {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: AssayInfo =
            row.with_context(|| format!("malformed assay table {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_run_table(path: &Path) -> Result<Vec<SampleRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open per-run table {}", path.display()))?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        let record: SampleRecord =
            record.with_context(|| format!("malformed per-run table {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_run_table(path: &Path, records: &[SampleRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create per-run table {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write per-run table {}", path.display()))?;
    Ok(())
}

pub fn read_summary_table(path: &Path) -> Result<Vec<AssessedRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open summary table {}", path.display()))?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        let record: AssessedRecord =
            record.with_context(|| format!("malformed summary table {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_summary_table(path: &Path, records: &[AssessedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create summary table {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write summary table {}", path.display()))?;
    Ok(())
}

/// Table files under `dir` whose names end in `suffix`, in sorted order so
/// repeated invocations see them identically.
pub fn list_tables(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    let mut tables = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(suffix) {
            tables.push(entry.path());
        }
    }
    tables.sort();
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Platform;

    #[test]
    fn run_table_round_trips_without_false_positive_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blankqc.db.run1.csv");

        let mut record = SampleRecord::pending("run1", Platform::Illumina, "s1.bam", "s1");
        record.mean_cov = 12.5;
        record.no_reads = 4000;
        record.blank_reads = 17;
        write_run_table(&path, &[record]).expect("write");

        let text = std::fs::read_to_string(&path).expect("read back");
        let header = text.lines().next().expect("header");
        assert!(header.starts_with("runname,filename,sample_name,sequencing_platform"));
        assert!(!header.contains("false_positive"));

        let records = read_run_table(&path).expect("parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mean_cov, 12.5);
        assert_eq!(records[0].no_reads, 4000);
        assert_eq!(records[0].sequencing_platform, Platform::Illumina);
    }

    #[test]
    fn summary_table_carries_false_positive_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blankqc.site.summary.csv");

        let record = SampleRecord::pending("run1", Platform::OxfordNanopore, "s2.bam", "s2");
        let assessed = AssessedRecord::from_record(record, true);
        write_summary_table(&path, &[assessed]).expect("write");

        let text = std::fs::read_to_string(&path).expect("read back");
        assert!(text.lines().next().expect("header").ends_with(",false_positive"));

        let records = read_summary_table(&path).expect("parse");
        assert!(records[0].false_positive);
    }

    #[test]
    fn assay_table_tolerates_missing_columns_and_empty_cells() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("assays.csv");
        std::fs::write(
            &path,
            "filename,sample_name,max_ct_value\ns1.bam,s1,21.4\ns2.bam,s2,\n",
        )
        .expect("write");

        let rows = read_assay_table(&path).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].max_ct_value, Some(21.4));
        assert_eq!(rows[1].max_ct_value, None);
        assert_eq!(rows[0].ct_platform_1, None);
        assert_eq!(rows[0].min_ct_value, None);
    }

    #[test]
    fn non_numeric_metric_cell_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blankqc.db.bad.csv");

        let record = SampleRecord::pending("run1", Platform::Illumina, "s1.bam", "s1");
        write_run_table(&path, &[record]).expect("write");
        let text = std::fs::read_to_string(&path).expect("read");
        std::fs::write(&path, text.replace("ILLUMINA,UNKNOWN,UNKNOWN,0.0", "ILLUMINA,UNKNOWN,UNKNOWN,n/a"))
            .expect("corrupt");

        assert!(read_run_table(&path).is_err());
    }

    #[test]
    fn list_tables_filters_by_suffix_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.summary.csv", "a.summary.csv", "notes.txt", "x.report.json"] {
            std::fs::write(dir.path().join(name), "").expect("touch");
        }

        let tables = list_tables(dir.path(), "summary.csv").expect("list");
        let names: Vec<_> = tables
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.summary.csv", "b.summary.csv"]);
    }
}
