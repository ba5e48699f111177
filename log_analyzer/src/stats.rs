use std::collections::HashMap;

use anyhow::Result;

use crate::parse::LogRecord;

/// Running latency stats for one request path.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointStats {
    pub url: String,
    pub count: u64,
    pub time_sum: f64,
    pub time_avg: f64,
    pub time_max: f64,
    /// Median of the previous median and the newest sample. This is not a
    /// true median over all samples; reports have always been built this
    /// way, so it stays for comparability.
    pub time_med: f64,
}

impl EndpointStats {
    fn new(url: &str, latency: f64) -> Self {
        Self {
            url: url.to_string(),
            count: 1,
            time_sum: latency,
            time_avg: latency,
            time_max: latency,
            time_med: latency,
        }
    }

    fn update(&mut self, latency: f64) {
        self.count += 1;
        self.time_sum += latency;
        self.time_avg = self.time_sum / self.count as f64;
        self.time_max = self.time_max.max(latency);
        self.time_med = (self.time_med + latency) / 2.0;
    }
}

/// Counters for a single run.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunCounters {
    /// Every line read, parsed or not.
    pub total_lines: u64,
    /// Lines with a request path that went into the stats.
    pub aggregated_lines: u64,
    pub parse_errors: u64,
    pub latency_sum: f64,
}

impl RunCounters {
    /// Share of parse errors relative to aggregated lines, `0.0` when
    /// nothing was aggregated.
    pub fn error_ratio(&self) -> f64 {
        if self.aggregated_lines == 0 {
            0.0
        } else {
            self.parse_errors as f64 / self.aggregated_lines as f64
        }
    }

    /// True when the error ratio is strictly above `max_ratio`.
    pub fn exceeds_error_budget(&self, max_ratio: f64) -> bool {
        self.error_ratio() > max_ratio
    }
}

/// Folds records into per-path stats, keeping first-seen order of paths.
#[derive(Debug, Default)]
pub struct Aggregator {
    endpoints: Vec<EndpointStats>,
    index: HashMap<String, usize>,
    counters: RunCounters,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &LogRecord) {
        self.counters.total_lines += 1;
        if record.request.is_empty() {
            return;
        }

        let latency = record.request_time;
        self.counters.aggregated_lines += 1;
        self.counters.latency_sum += latency;

        match self.index.get(&record.request) {
            Some(&i) => self.endpoints[i].update(latency),
            None => {
                self.index
                    .insert(record.request.clone(), self.endpoints.len());
                self.endpoints
                    .push(EndpointStats::new(&record.request, latency));
            }
        }
    }

    /// Drain a record stream, stopping at the first read error.
    pub fn consume<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<LogRecord>>,
    {
        for record in records {
            self.observe(&record?);
        }
        Ok(())
    }

    /// Finish the run, attaching the parse error count from the reader.
    pub fn finish(mut self, parse_errors: u64) -> Aggregation {
        self.counters.parse_errors = parse_errors;
        Aggregation {
            endpoints: self.endpoints,
            counters: self.counters,
        }
    }
}

/// Result of aggregating one log file.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Stats in first-seen order of their path.
    pub endpoints: Vec<EndpointStats>,
    pub counters: RunCounters,
}
