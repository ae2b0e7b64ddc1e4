//! Descriptive charts over assessed summary tables, rendered as SVG.
//!
//! A deliberately small scatter/bar renderer; enough axes and labels for the
//! charts to be read on their own, nothing more.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::tables;
use crate::{AssessedRecord, Platform};

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 420.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 58.0;

const KEPT_COLOR: &str = "#4c72b0";
const FP_COLOR: &str = "#dd8452";
const AXIS_COLOR: &str = "#333333";

/// Read every summary table under `out_dir`, merge by sample name and render
/// the charts next to the tables. Returns the chart paths written.
pub fn run_plots(out_dir: &Path, min_platform_samples: usize) -> Result<Vec<PathBuf>> {
    let mut merged: BTreeMap<String, AssessedRecord> = BTreeMap::new();
    for table in tables::list_tables(out_dir, "summary.csv")? {
        for record in tables::read_summary_table(&table)? {
            merged.insert(record.sample_name.clone(), record);
        }
    }
    if merged.is_empty() {
        warn!("no summary tables under {}", out_dir.display());
        return Ok(Vec::new());
    }
    let records: Vec<AssessedRecord> = merged.into_values().collect();

    let mut written = Vec::new();
    let charts = [
        ("blankqc.ct_values.svg", ct_outcome_chart(&records)),
        (
            "blankqc.platform_metrics.svg",
            Some(platform_metric_chart(&records)),
        ),
        (
            "blankqc.failure_rates.svg",
            failure_rate_chart(&records, min_platform_samples),
        ),
    ];
    for (name, svg) in charts {
        let Some(svg) = svg else {
            warn!("not enough data for {}, skipped", name);
            continue;
        };
        let path = out_dir.join(name);
        fs::write(&path, svg)
            .with_context(|| format!("failed to write chart {}", path.display()))?;
        info!("wrote chart {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Ct value against classification outcome, one point per sample with a
/// known Ct. `None` when no sample carries Ct data.
fn ct_outcome_chart(records: &[AssessedRecord]) -> Option<String> {
    let with_ct: Vec<&AssessedRecord> =
        records.iter().filter(|r| r.max_ct_value > 0.0).collect();
    if with_ct.is_empty() {
        return None;
    }

    let max_ct = with_ct
        .iter()
        .map(|r| r.max_ct_value)
        .fold(f64::MIN, f64::max);
    let scale = LinearScale::new(0.0, max_ct, MARGIN_LEFT, WIDTH - MARGIN_RIGHT);

    let mut canvas = SvgCanvas::new(WIDTH, HEIGHT);
    canvas.title("Assay Ct value by screening outcome");
    canvas.x_axis(&scale, "Maximum Ct value");

    let rows = [("Kept", false, KEPT_COLOR), ("False positive", true, FP_COLOR)];
    let row_height = (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) / rows.len() as f64;
    for (i, (label, wanted_fp, color)) in rows.iter().enumerate() {
        let y_mid = MARGIN_TOP + row_height * (i as f64 + 0.5);
        canvas.text(
            MARGIN_LEFT - 8.0,
            y_mid + 4.0,
            "end",
            12.0,
            label,
        );
        for (j, record) in with_ct
            .iter()
            .filter(|r| r.false_positive == *wanted_fp)
            .enumerate()
        {
            let y = y_mid + jitter(j, row_height * 0.6);
            canvas.circle(scale.apply(record.max_ct_value), y, 4.0, color);
        }
    }
    Some(canvas.finish())
}

/// Mean coverage per platform, false positives in their own colour.
fn platform_metric_chart(records: &[AssessedRecord]) -> String {
    let max_cov = records
        .iter()
        .map(|r| r.mean_cov)
        .fold(0.0_f64, f64::max)
        .max(1.0);
    let scale = LinearScale::new(0.0, max_cov, HEIGHT - MARGIN_BOTTOM, MARGIN_TOP);

    let mut canvas = SvgCanvas::new(WIDTH, HEIGHT);
    canvas.title("Mean genome coverage by platform");
    canvas.y_axis(&scale, "Mean coverage");
    canvas.legend(&[("Kept", KEPT_COLOR), ("False positive", FP_COLOR)]);

    let platforms = [Platform::Illumina, Platform::OxfordNanopore];
    let col_width = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) / platforms.len() as f64;
    for (i, platform) in platforms.iter().enumerate() {
        let x_mid = MARGIN_LEFT + col_width * (i as f64 + 0.5);
        canvas.text(
            x_mid,
            HEIGHT - MARGIN_BOTTOM + 20.0,
            "middle",
            12.0,
            platform.as_str(),
        );
        for (j, record) in records
            .iter()
            .filter(|r| r.sequencing_platform == *platform)
            .enumerate()
        {
            let color = if record.false_positive {
                FP_COLOR
            } else {
                KEPT_COLOR
            };
            let x = x_mid + jitter(j, col_width * 0.5);
            canvas.circle(x, scale.apply(record.mean_cov), 4.0, color);
        }
    }
    canvas.finish()
}

/// False-positive rate per platform; platforms with fewer samples than
/// `min_samples` are not shown. `None` when no platform qualifies.
fn failure_rate_chart(records: &[AssessedRecord], min_samples: usize) -> Option<String> {
    let mut bars = Vec::new();
    for platform in [Platform::Illumina, Platform::OxfordNanopore] {
        let subset: Vec<&AssessedRecord> = records
            .iter()
            .filter(|r| r.sequencing_platform == platform)
            .collect();
        if subset.len() < min_samples {
            continue;
        }
        let failed = subset.iter().filter(|r| r.false_positive).count();
        let rate = 100.0 * failed as f64 / subset.len() as f64;
        bars.push((platform, subset.len(), rate));
    }
    if bars.is_empty() {
        return None;
    }

    let scale = LinearScale::new(0.0, 100.0, HEIGHT - MARGIN_BOTTOM, MARGIN_TOP);
    let mut canvas = SvgCanvas::new(WIDTH, HEIGHT);
    canvas.title("False-positive rate by platform");
    canvas.y_axis(&scale, "False positives (%)");

    let col_width = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) / bars.len() as f64;
    for (i, (platform, samples, rate)) in bars.iter().enumerate() {
        let x_mid = MARGIN_LEFT + col_width * (i as f64 + 0.5);
        let bar_width = col_width * 0.5;
        let top = scale.apply(*rate);
        canvas.rect(
            x_mid - bar_width / 2.0,
            top,
            bar_width,
            (HEIGHT - MARGIN_BOTTOM) - top,
            FP_COLOR,
        );
        canvas.text(x_mid, top - 6.0, "middle", 12.0, &format!("{:.1}%", rate));
        canvas.text(
            x_mid,
            HEIGHT - MARGIN_BOTTOM + 20.0,
            "middle",
            12.0,
            platform.as_str(),
        );
        canvas.text(
            x_mid,
            HEIGHT - MARGIN_BOTTOM + 36.0,
            "middle",
            11.0,
            &format!("n={}", samples),
        );
    }
    Some(canvas.finish())
}

/// Deterministic strip-plot jitter: spreads points of a category without
/// pulling in a randomness source, so reruns render identical charts.
fn jitter(index: usize, span: f64) -> f64 {
    let slot = (index % 9) as f64 - 4.0;
    slot / 9.0 * span
}

/// Maps a data interval onto a pixel interval. The range may be inverted
/// (SVG y grows downward).
struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    fn new(d0: f64, d1: f64, r0: f64, r1: f64) -> Self {
        // A degenerate domain would divide by zero below.
        let d1 = if d1 == d0 { d0 + 1.0 } else { d1 };
        Self {
            domain: (d0, d1),
            range: (r0, r1),
        }
    }

    fn apply(&self, value: f64) -> f64 {
        let t = (value - self.domain.0) / (self.domain.1 - self.domain.0);
        self.range.0 + t * (self.range.1 - self.range.0)
    }

    /// Five evenly spaced ticks across the domain.
    fn ticks(&self) -> Vec<f64> {
        (0..=4)
            .map(|i| self.domain.0 + (self.domain.1 - self.domain.0) * i as f64 / 4.0)
            .collect()
    }
}

/// Accumulates SVG fragments, nasvar-backend style: plain string content,
/// finished into one document.
struct SvgCanvas {
    width: f64,
    height: f64,
    content: Vec<String>,
}

impl SvgCanvas {
    fn new(width: f64, height: f64) -> Self {
        let mut canvas = Self {
            width,
            height,
            content: Vec::new(),
        };
        canvas.content.push(format!(
            "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"#ffffff\"/>",
            width, height
        ));
        canvas
    }

    fn title(&mut self, title: &str) {
        self.text(self.width / 2.0, 24.0, "middle", 15.0, title);
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.content.push(format!(
            "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"1\"/>",
            x1, y1, x2, y2, AXIS_COLOR
        ));
    }

    fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str) {
        self.content.push(format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.1}\" fill=\"{}\" fill-opacity=\"0.75\"/>",
            cx, cy, r, fill
        ));
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) {
        self.content.push(format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\"/>",
            x, y, w, h, fill
        ));
    }

    fn text(&mut self, x: f64, y: f64, anchor: &str, size: f64, content: &str) {
        self.content.push(format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"{}\" font-family=\"sans-serif\" font-size=\"{}\" fill=\"{}\">{}</text>",
            x, y, anchor, size, AXIS_COLOR, escape_xml(content)
        ));
    }

    /// Horizontal axis along the bottom margin with ticks and a label.
    fn x_axis(&mut self, scale: &LinearScale, label: &str) {
        let y = self.height - MARGIN_BOTTOM;
        self.line(MARGIN_LEFT, y, self.width - MARGIN_RIGHT, y);
        for tick in scale.ticks() {
            let x = scale.apply(tick);
            self.line(x, y, x, y + 5.0);
            self.text(x, y + 18.0, "middle", 11.0, &format_tick(tick));
        }
        self.text(
            (MARGIN_LEFT + self.width - MARGIN_RIGHT) / 2.0,
            self.height - 16.0,
            "middle",
            12.0,
            label,
        );
    }

    /// Vertical axis along the left margin with ticks and a rotated label.
    fn y_axis(&mut self, scale: &LinearScale, label: &str) {
        let x = MARGIN_LEFT;
        self.line(x, MARGIN_TOP, x, self.height - MARGIN_BOTTOM);
        for tick in scale.ticks() {
            let y = scale.apply(tick);
            self.line(x - 5.0, y, x, y);
            self.text(x - 8.0, y + 4.0, "end", 11.0, &format_tick(tick));
        }
        self.content.push(format!(
            "<text x=\"18\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"12\" fill=\"{}\" transform=\"rotate(-90 18 {:.1})\">{}</text>",
            self.height / 2.0,
            AXIS_COLOR,
            self.height / 2.0,
            escape_xml(label)
        ));
    }

    fn legend(&mut self, entries: &[(&str, &str)]) {
        let mut x = self.width - MARGIN_RIGHT - 130.0;
        for (label, color) in entries {
            self.circle(x, MARGIN_TOP - 10.0, 5.0, color);
            self.text(x + 10.0, MARGIN_TOP - 6.0, "start", 11.0, label);
            x += 70.0;
        }
    }

    fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">\n{}\n</svg>\n",
            self.width,
            self.height,
            self.width,
            self.height,
            self.content.join("\n")
        )
    }
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e6 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
