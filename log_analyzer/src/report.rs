use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::stats::Aggregation;

/// Token in the report template replaced by the table JSON.
pub const TABLE_PLACEHOLDER: &str = "$table_json";

/// One row of the report table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub url: String,
    pub count: u64,
    pub count_perc: f64,
    pub time_sum: f64,
    pub time_perc: f64,
    pub time_avg: f64,
    pub time_max: f64,
    pub time_med: f64,
}

/// Round to 3 decimals, halves away from zero.
///
/// The scaled product is rounded, so a decimal literal ending in `5` at the
/// fourth place rounds up in magnitude even when its stored double sits just
/// below the half-way point (`1.0005 -> 1.001`).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Turn aggregated stats into the report table: shares and rounding,
/// sorted by total time descending and cut to `report_size` rows.
///
/// Rows with equal `time_sum` keep the order their paths were first seen.
pub fn rank(aggregation: &Aggregation, report_size: usize) -> Vec<ReportRow> {
    let counters = &aggregation.counters;

    let mut rows: Vec<ReportRow> = aggregation
        .endpoints
        .iter()
        .map(|s| ReportRow {
            url: s.url.clone(),
            count: s.count,
            count_perc: round3(percent(s.count as f64, counters.aggregated_lines as f64)),
            time_sum: round3(s.time_sum),
            time_perc: round3(percent(s.time_sum, counters.latency_sum)),
            time_avg: round3(s.time_avg),
            time_max: s.time_max,
            time_med: round3(s.time_med),
        })
        .collect();

    rows.sort_by(|a, b| b.time_sum.total_cmp(&a.time_sum));
    rows.truncate(report_size);
    rows
}

/// `report-YYYY.MM.DD.html` for the date embedded in the log name.
pub fn report_file_name(date: NaiveDate) -> String {
    date.format("report-%Y.%m.%d.html").to_string()
}

/// Parse a report file name back into its date.
pub fn parse_report_file_name(name: &str) -> Option<NaiveDate> {
    let stamp = name.strip_prefix("report-")?.strip_suffix(".html")?;
    // chrono accepts unpadded fields, require the fixed-width form
    if stamp.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stamp, "%Y.%m.%d").ok()
}

/// Substitute the table JSON into the template text.
pub fn render(template: &str, rows: &[ReportRow]) -> Result<String> {
    let json = serde_json::to_string(rows).context("Failed to serialize report table to JSON")?;
    Ok(template.replace(TABLE_PLACEHOLDER, &json))
}

/// Render `rows` into the template at `template_path` and write the result
/// to `report_dir/report_name`, creating the directory when missing.
pub fn write_report(
    template_path: &Path,
    report_dir: &Path,
    report_name: &str,
    rows: &[ReportRow],
) -> Result<PathBuf> {
    let template = std::fs::read_to_string(template_path).with_context(|| {
        format!(
            "Failed to read report template: {}",
            template_path.display()
        )
    })?;
    let html = render(&template, rows)?;

    std::fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let path = report_dir.join(report_name);
    std::fs::write(&path, html)
        .with_context(|| format!("Failed to write HTML report to {}", path.display()))?;

    Ok(path)
}
