//! Chart rendering.
//!
//! The chart is a self-contained SVG pie chart built from the persisted
//! results table: one slice per label, a percentage on each slice and a
//! legend on the right.

use crate::error::ThreatCheckError;
use crate::sink::CsvResultSink;
use crate::types::Distribution;
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CHART_TITLE: &str = "Threat Type Distribution Results";
pub const LEGEND_TITLE: &str = "Threat Type";

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 480.0;
const CENTER_X: f64 = 250.0;
const CENTER_Y: f64 = 260.0;
const RADIUS: f64 = 180.0;

/// Colors for labels outside the fixed set, cycled in order.
const PALETTE: [&str; 6] = ["#9467bd", "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf"];

/// What `render` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Chart written to this path
    Rendered(PathBuf),
    /// Results table had no rows; nothing written
    Skipped,
}

/// Renders the verdict distribution as an SVG pie chart.
#[derive(Debug, Clone)]
pub struct ChartReport {
    chart_path: PathBuf,
}

impl ChartReport {
    pub fn new<P: Into<PathBuf>>(chart_path: P) -> Self {
        Self {
            chart_path: chart_path.into(),
        }
    }

    pub fn chart_path(&self) -> &Path {
        &self.chart_path
    }

    /// Read the results table behind `sink` and write the chart.
    ///
    /// # Errors
    ///
    /// `OutputError` when the table cannot be read or the chart cannot be
    /// written.
    pub fn render(&self, sink: &CsvResultSink) -> Result<RenderOutcome, ThreatCheckError> {
        let distribution = sink.compute_distribution()?;
        if distribution.is_empty() {
            info!(path = %sink.path().display(), "No results to chart");
            return Ok(RenderOutcome::Skipped);
        }

        let svg = render_svg(&distribution);

        let output_error =
            |e: std::io::Error| ThreatCheckError::output(&self.chart_path, e.to_string());
        if let Some(parent) = self.chart_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(output_error)?;
        }
        fs::write(&self.chart_path, svg).map_err(output_error)?;

        info!(path = %self.chart_path.display(), "Chart saved to {}", self.chart_path.display());
        Ok(RenderOutcome::Rendered(self.chart_path.clone()))
    }
}

/// Fill color for a label.
fn slice_color(label: &str, palette_index: &mut usize) -> &'static str {
    match label {
        "SAFE" => "#2ca02c",
        "MALWARE" => "#d62728",
        "SOCIAL_ENGINEERING" => "#1f77b4",
        "UNWANTED_SOFTWARE" => "#ff7f0e",
        _ => {
            let color = PALETTE[*palette_index % PALETTE.len()];
            *palette_index += 1;
            color
        }
    }
}

/// Point on the circle at `angle` radians, measured clockwise from 12 o'clock.
fn point_at(angle: f64, radius: f64) -> (f64, f64) {
    (
        CENTER_X + radius * angle.sin(),
        CENTER_Y - radius * angle.cos(),
    )
}

fn render_svg(distribution: &Distribution) -> String {
    let total = distribution.total.max(1) as f64;
    let mut palette_index = 0;
    let mut slices = String::new();
    let mut labels = String::new();
    let mut legend = String::new();
    let mut start = 0.0_f64;

    let _ = writeln!(
        legend,
        r##"  <text x="480" y="110" font-size="16" font-weight="bold">{}</text>"##,
        LEGEND_TITLE
    );

    for (i, share) in distribution.shares.iter().enumerate() {
        let color = slice_color(&share.label, &mut palette_index);
        let sweep = share.count as f64 / total * 2.0 * PI;
        let end = start + sweep;

        if share.count as f64 >= total {
            let _ = writeln!(
                slices,
                r##"  <circle cx="{CENTER_X}" cy="{CENTER_Y}" r="{RADIUS}" fill="{color}" stroke="#ffffff" stroke-width="2"/>"##
            );
        } else {
            let (x1, y1) = point_at(start, RADIUS);
            let (x2, y2) = point_at(end, RADIUS);
            let large_arc = u8::from(sweep > PI);
            let _ = writeln!(
                slices,
                r##"  <path d="M {CENTER_X} {CENTER_Y} L {x1:.2} {y1:.2} A {RADIUS} {RADIUS} 0 {large_arc} 1 {x2:.2} {y2:.2} Z" fill="{color}" stroke="#ffffff" stroke-width="2"/>"##
            );
        }

        let (lx, ly) = point_at(start + sweep / 2.0, RADIUS * 0.65);
        let _ = writeln!(
            labels,
            r##"  <text x="{lx:.2}" y="{ly:.2}" font-size="14" text-anchor="middle" dominant-baseline="middle" fill="#ffffff">{:.1}%</text>"##,
            share.percentage
        );

        let row_y = 130.0 + i as f64 * 26.0;
        let _ = writeln!(
            legend,
            r##"  <rect x="480" y="{row_y}" width="16" height="16" fill="{color}"/>"##
        );
        let _ = writeln!(
            legend,
            r##"  <text x="504" y="{:.0}" font-size="14">{}</text>"##,
            row_y + 13.0,
            escape_xml(&share.label)
        );

        start = end;
    }

    format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"##,
            "\n",
            r##"  <rect width="100%" height="100%" fill="#ffffff"/>"##,
            "\n",
            r##"  <text x="{tx}" y="40" font-size="20" font-weight="bold" text-anchor="middle">{title}</text>"##,
            "\n{slices}{labels}{legend}</svg>\n"
        ),
        w = WIDTH,
        h = HEIGHT,
        tx = WIDTH / 2.0,
        title = CHART_TITLE,
        slices = slices,
        labels = labels,
        legend = legend,
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
