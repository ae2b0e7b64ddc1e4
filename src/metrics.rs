//! Genome recovery and coverage metrics from aligned reads.
//!
//! One pass over a BAM file yields the four numbers every downstream rule
//! works from: recovery at 10x, recovery at 20x, mean coverage and the
//! mapped read count.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use noodles::bam;
use noodles::sam::alignment::record::cigar::op::Kind as CigarKind;

use crate::Platform;

/// Per-sample summary produced by the metrics pass.
///
/// Recoveries are percentages of reference positions covered at or above
/// the given depth. A file with no usable reads yields all zeroes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenomeMetrics {
    pub pc_ref_gte_10: f64,
    pub pc_ref_gte_20: f64,
    pub mean_coverage: f64,
    pub mapped_reads: u64,
}

/// Source of per-sample genome metrics.
///
/// The pipeline stages only depend on this trait, so they can be exercised
/// without alignment files on disk.
pub trait AlignmentMetrics {
    fn genome_metrics(&self, path: &Path, platform: Platform) -> Result<GenomeMetrics>;
}

/// Metrics computed from BAM files.
pub struct BamMetrics {
    /// Reads shorter than this are ignored on short-read platforms, where
    /// aggressive trimming can leave fragments too short to be informative.
    pub min_read_len: usize,
}

impl Default for BamMetrics {
    fn default() -> Self {
        Self { min_read_len: 148 }
    }
}

impl BamMetrics {
    pub fn new(min_read_len: usize) -> Self {
        Self { min_read_len }
    }
}

impl AlignmentMetrics for BamMetrics {
    fn genome_metrics(&self, path: &Path, platform: Platform) -> Result<GenomeMetrics> {
        let file = File::open(path)
            .with_context(|| format!("failed to open alignment file {}", path.display()))?;
        let mut reader = bam::io::Reader::new(BufReader::new(file));
        let header = reader
            .read_header()
            .with_context(|| format!("failed to read BAM header of {}", path.display()))?;

        // One depth vector per reference sequence, sized from the header.
        let mut depth: Vec<Vec<u32>> = header
            .reference_sequences()
            .values()
            .map(|rs| vec![0u32; rs.length().get()])
            .collect();

        let mut mapped_reads = 0u64;
        for result in reader.records() {
            let record = result
                .with_context(|| format!("failed to read BAM record from {}", path.display()))?;
            let flags = record.flags();
            if flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() {
                continue;
            }
            if platform == Platform::Illumina && record.sequence().len() < self.min_read_len {
                continue;
            }
            let ref_id = match record.reference_sequence_id() {
                Some(Ok(id)) => id,
                Some(Err(e)) => return Err(e.into()),
                None => continue,
            };
            let start = match record.alignment_start() {
                Some(Ok(pos)) => pos.get() - 1,
                Some(Err(e)) => return Err(e.into()),
                None => continue,
            };
            let Some(ref_depth) = depth.get_mut(ref_id) else {
                continue;
            };
            let mut cursor = start;
            for op in record.cigar().iter() {
                let op = op?;
                match op.kind() {
                    CigarKind::Match
                    | CigarKind::SequenceMatch
                    | CigarKind::SequenceMismatch => {
                        add_depth(ref_depth, cursor, op.len());
                        cursor += op.len();
                    }
                    CigarKind::Deletion | CigarKind::Skip => cursor += op.len(),
                    _ => {}
                }
            }
            mapped_reads += 1;
        }

        let metrics = summarize(&depth, mapped_reads);
        debug!(
            "{}: {} mapped reads, mean coverage {:.2}",
            path.display(),
            metrics.mapped_reads,
            metrics.mean_coverage
        );
        Ok(metrics)
    }
}

/// Add one read's contribution over `[start, start + len)`, clamped to the
/// reference bounds so malformed records cannot index out of range.
fn add_depth(depth: &mut [u32], start: usize, len: usize) {
    let lo = start.min(depth.len());
    let hi = start.saturating_add(len).min(depth.len());
    for d in &mut depth[lo..hi] {
        *d += 1;
    }
}

fn summarize(depth: &[Vec<u32>], mapped_reads: u64) -> GenomeMetrics {
    let ref_len: usize = depth.iter().map(Vec::len).sum();
    if ref_len == 0 {
        return GenomeMetrics {
            mapped_reads,
            ..GenomeMetrics::default()
        };
    }
    let mut total = 0u64;
    let mut gte_10 = 0usize;
    let mut gte_20 = 0usize;
    for &d in depth.iter().flatten() {
        total += u64::from(d);
        if d >= 10 {
            gte_10 += 1;
        }
        if d >= 20 {
            gte_20 += 1;
        }
    }
    GenomeMetrics {
        pc_ref_gte_10: 100.0 * gte_10 as f64 / ref_len as f64,
        pc_ref_gte_20: 100.0 * gte_20 as f64 / ref_len as f64,
        mean_coverage: total as f64 / ref_len as f64,
        mapped_reads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_clamped_to_reference_bounds() {
        let mut depth = vec![0u32; 10];
        add_depth(&mut depth, 7, 5);
        assert_eq!(&depth[6..], &[0, 1, 1, 1]);

        // A start beyond the reference adds nothing.
        add_depth(&mut depth, 20, 5);
        assert_eq!(depth.iter().map(|&d| u64::from(d)).sum::<u64>(), 3);
    }

    #[test]
    fn summary_over_empty_reference_is_all_zero() {
        let metrics = summarize(&[], 0);
        assert_eq!(metrics, GenomeMetrics::default());

        // Reads without any reference still report their count.
        let metrics = summarize(&[], 7);
        assert_eq!(metrics.mapped_reads, 7);
        assert_eq!(metrics.mean_coverage, 0.0);
    }

    #[test]
    fn summary_counts_recovery_per_position() {
        // 4 positions at depth 25, 4 at depth 12, 2 uncovered.
        let depth = vec![vec![25, 25, 25, 25, 12, 12, 12, 12, 0, 0]];
        let metrics = summarize(&depth, 3);
        assert_eq!(metrics.pc_ref_gte_10, 80.0);
        assert_eq!(metrics.pc_ref_gte_20, 40.0);
        assert!((metrics.mean_coverage - 14.8).abs() < 1e-9);
        assert_eq!(metrics.mapped_reads, 3);
    }

    #[test]
    fn summary_spans_multiple_references() {
        let depth = vec![vec![10, 10], vec![0, 0, 0, 0, 0, 0, 0, 0]];
        let metrics = summarize(&depth, 1);
        assert_eq!(metrics.pc_ref_gte_10, 20.0);
        assert_eq!(metrics.pc_ref_gte_20, 0.0);
        assert_eq!(metrics.mean_coverage, 2.0);
    }
}
