//! Blank (negative control) baseline and run acceptance gating.
//!
//! Blanks should contain no target organism. Whatever signal they do show is
//! the run's contamination floor, and a run whose blanks show too much is
//! not usable at all.

use std::path::PathBuf;

use anyhow::Result;
use log::debug;
use serde::Serialize;

use crate::metrics::{AlignmentMetrics, GenomeMetrics};
use crate::Platform;

/// Worst-case single-blank metrics across all blanks of a run.
///
/// Each field is the maximum observed in any one blank, never a sum: one
/// contaminated blank is enough to set the floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BlankBaseline {
    pub max_coverage: f64,
    pub max_recovery_10: f64,
    pub max_recovery_20: f64,
    pub max_reads: u64,
}

impl BlankBaseline {
    /// Fold one blank's metrics in, keeping per-metric maxima.
    pub fn fold(&mut self, metrics: &GenomeMetrics) {
        if metrics.mean_coverage > self.max_coverage {
            self.max_coverage = metrics.mean_coverage;
        }
        if metrics.pc_ref_gte_10 > self.max_recovery_10 {
            self.max_recovery_10 = metrics.pc_ref_gte_10;
        }
        if metrics.pc_ref_gte_20 > self.max_recovery_20 {
            self.max_recovery_20 = metrics.pc_ref_gte_20;
        }
        if metrics.mapped_reads > self.max_reads {
            self.max_reads = metrics.mapped_reads;
        }
    }
}

/// Gate deciding whether a run's blanks are clean enough to use.
pub struct BlankScreener {
    /// Run rejected if any blank has more mapped reads than this.
    pub read_cutoff: u64,
    /// Run rejected if any blank recovers more percent of the genome than
    /// this, at the depth relevant to the platform.
    pub recovery_cutoff: f64,
}

impl Default for BlankScreener {
    fn default() -> Self {
        Self {
            read_cutoff: 500,
            recovery_cutoff: 4.0,
        }
    }
}

impl BlankScreener {
    pub fn new(read_cutoff: u64, recovery_cutoff: f64) -> Self {
        Self {
            read_cutoff,
            recovery_cutoff,
        }
    }

    /// Compute the baseline across all blank alignment files.
    pub fn baseline<M: AlignmentMetrics>(
        &self,
        blanks: &[PathBuf],
        platform: Platform,
        metrics: &M,
    ) -> Result<BlankBaseline> {
        let mut baseline = BlankBaseline::default();
        for path in blanks {
            let m = metrics.genome_metrics(path, platform)?;
            debug!(
                "blank {}: coverage {:.2}, recovery 10x {:.2}%, 20x {:.2}%, {} reads",
                path.display(),
                m.mean_coverage,
                m.pc_ref_gte_10,
                m.pc_ref_gte_20,
                m.mapped_reads
            );
            baseline.fold(&m);
        }
        Ok(baseline)
    }

    /// A run is acceptable only when no blank shows meaningful target
    /// content: recovery at the platform's depth within the cutoff and the
    /// read count within the cutoff.
    pub fn is_baseline_acceptable(&self, baseline: &BlankBaseline, platform: Platform) -> bool {
        let recovery = if platform.is_long_read() {
            baseline.max_recovery_20
        } else {
            baseline.max_recovery_10
        };
        recovery <= self.recovery_cutoff && baseline.max_reads <= self.read_cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(rec_10: f64, rec_20: f64, cov: f64, reads: u64) -> GenomeMetrics {
        GenomeMetrics {
            pc_ref_gte_10: rec_10,
            pc_ref_gte_20: rec_20,
            mean_coverage: cov,
            mapped_reads: reads,
        }
    }

    #[test]
    fn baseline_keeps_the_maximum_not_the_sum() {
        let mut baseline = BlankBaseline::default();
        baseline.fold(&metrics(1.0, 0.5, 3.0, 100));
        baseline.fold(&metrics(2.5, 0.2, 1.0, 40));
        baseline.fold(&metrics(0.5, 1.5, 2.0, 250));

        assert_eq!(baseline.max_recovery_10, 2.5);
        assert_eq!(baseline.max_recovery_20, 1.5);
        assert_eq!(baseline.max_coverage, 3.0);
        assert_eq!(baseline.max_reads, 250);
    }

    #[test]
    fn gate_uses_20x_recovery_for_long_reads() {
        let screener = BlankScreener::new(500, 4.0);

        let mut baseline = BlankBaseline::default();
        baseline.fold(&metrics(0.0, 5.0, 1.0, 10));
        assert!(!screener.is_baseline_acceptable(&baseline, Platform::OxfordNanopore));

        let mut baseline = BlankBaseline::default();
        baseline.fold(&metrics(0.0, 3.0, 1.0, 10));
        assert!(screener.is_baseline_acceptable(&baseline, Platform::OxfordNanopore));
    }

    #[test]
    fn gate_uses_10x_recovery_for_short_reads() {
        let screener = BlankScreener::new(500, 4.0);

        // High 20x recovery alone does not reject an Illumina run.
        let mut baseline = BlankBaseline::default();
        baseline.fold(&metrics(3.0, 9.0, 1.0, 10));
        assert!(screener.is_baseline_acceptable(&baseline, Platform::Illumina));

        let mut baseline = BlankBaseline::default();
        baseline.fold(&metrics(4.5, 0.0, 1.0, 10));
        assert!(!screener.is_baseline_acceptable(&baseline, Platform::Illumina));
    }

    #[test]
    fn gate_rejects_on_read_count_for_either_platform() {
        let screener = BlankScreener::new(500, 4.0);
        let mut baseline = BlankBaseline::default();
        baseline.fold(&metrics(0.0, 0.0, 0.1, 501));

        assert!(!screener.is_baseline_acceptable(&baseline, Platform::Illumina));
        assert!(!screener.is_baseline_acceptable(&baseline, Platform::OxfordNanopore));
    }

    #[test]
    fn empty_blank_set_is_acceptable() {
        let screener = BlankScreener::default();
        let baseline = BlankBaseline::default();
        assert!(screener.is_baseline_acceptable(&baseline, Platform::Illumina));
    }
}
