use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use crate::{
    config::Config,
    reader::LogReader,
    report::{rank, report_file_name, write_report},
    select::{find_latest_log, load_history},
    stats::{Aggregation, Aggregator},
};

/// File touched after every run so schedulers can tell the job is alive.
pub const TIMESTAMP_FILE: &str = "log_analyzer.ts";

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No unprocessed log in the log directory.
    NoLogs,
    /// The report for the selected log is already on disk.
    AlreadyReported(PathBuf),
    /// Too many lines failed to parse; no report was written.
    BudgetExceeded { error_ratio: f64 },
    /// Report rendering or writing failed and was logged.
    WriteFailed,
    Written(PathBuf),
}

/// Select the newest unprocessed log, aggregate it, and write its report.
///
/// Read errors on the selected log are returned; report write failures
/// are logged and reported as [`Outcome::WriteFailed`].
pub fn run(config: &Config) -> Result<Outcome> {
    info!("Looking for a log to analyze in {}", config.log_dir.display());
    let history = load_history(&config.report_dir);
    let Some(log) = find_latest_log(&config.log_dir, &config.log_prefix, &history) else {
        info!("No logs to analyze");
        return Ok(Outcome::NoLogs);
    };
    info!("Found log: {}", log.path.display());

    let report_name = report_file_name(log.date);
    let report_path = config.report_dir.join(&report_name);
    if report_path.exists() {
        info!("Report {} already exists", report_path.display());
        return Ok(Outcome::AlreadyReported(report_path));
    }
    info!("Will write report: {report_name}");

    info!("Reading and analyzing log...");
    let aggregation = analyze(&log.path)?;
    let counters = &aggregation.counters;
    let error_ratio = counters.error_ratio();
    info!(
        "Reading finished, aggregated {} of {} lines, {:.3}% errors",
        counters.aggregated_lines,
        counters.total_lines,
        error_ratio * 100.0
    );

    if counters.exceeds_error_budget(config.max_parse_errors) {
        info!(
            "Parse errors exceed the allowed ratio of {}, analysis stopped",
            config.max_parse_errors
        );
        return Ok(Outcome::BudgetExceeded { error_ratio });
    }

    info!("Preparing report data...");
    let rows = rank(&aggregation, config.report_size);
    info!(
        "Analysis finished, found {} unique URLs",
        aggregation.endpoints.len()
    );

    info!("Writing report");
    match write_report(
        &config.report_template,
        &config.report_dir,
        &report_name,
        &rows,
    ) {
        Ok(path) => Ok(Outcome::Written(path)),
        Err(err) => {
            error!("Failed to write report: {err:#}");
            Ok(Outcome::WriteFailed)
        }
    }
}

/// Stream one log file through the parser into an [`Aggregation`].
pub fn analyze(path: &Path) -> Result<Aggregation> {
    let mut reader = LogReader::open(path)?;
    let mut aggregator = Aggregator::new();
    aggregator
        .consume(reader.by_ref())
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    Ok(aggregator.finish(reader.parse_errors()))
}

/// Write the current Unix time to `ts_dir/log_analyzer.ts`.
pub fn write_timestamp(ts_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(ts_dir)
        .with_context(|| format!("Failed to create timestamp directory: {}", ts_dir.display()))?;
    let path = ts_dir.join(TIMESTAMP_FILE);
    std::fs::write(&path, format!("{}\n", Utc::now().timestamp()))
        .with_context(|| format!("Failed to write timestamp file: {}", path.display()))?;
    Ok(path)
}
