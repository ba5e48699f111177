//! Parsing of `ui_short` access log lines.
//!
//! The nginx format the frontends use is:
//!
//! ```text
//! $remote_addr $remote_user $http_x_real_ip [$time_local] "$request"
//! $status $body_bytes_sent "$http_referer" "$http_user_agent"
//! "$http_x_forwarded_for" "$http_X_REQUEST_ID" "$http_X_RB_USER"
//! $request_time
//! ```
//!
//! Lines are split with shell word rules after the timestamp brackets are
//! turned into quotes, then zipped positionally onto the columns above.

use thiserror::Error;
use tracing::debug;

/// Column names in the order they appear on a line.
pub const COLUMNS: [&str; 13] = [
    "remote_addr",
    "remote_user",
    "http_x_real_ip",
    "time_local",
    "request",
    "status",
    "body_bytes_sent",
    "http_referer",
    "http_user_agent",
    "http_x_forwarded_for",
    "http_X_REQUEST_ID",
    "http_X_RB_USER",
    "request_time",
];

/// Value nginx writes when a variable has no value.
const NO_VALUE: &str = "-";

/// One parsed log line.
///
/// `Default` is the sentinel produced for lines that fail to parse: every
/// text column empty and a zero latency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    pub remote_addr: String,
    pub remote_user: String,
    pub http_x_real_ip: String,
    pub time_local: String,
    /// Request path, or the raw request text when it has no path part.
    pub request: String,
    pub status: String,
    pub body_bytes_sent: String,
    pub http_referer: String,
    pub http_user_agent: String,
    pub http_x_forwarded_for: String,
    pub http_x_request_id: String,
    pub http_x_rb_user: String,
    /// Seconds spent serving the request.
    pub request_time: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    #[error("no closing quotation")]
    UnclosedQuote,
    #[error("no escaped character")]
    DanglingEscape,
    #[error("missing `{0}` column")]
    MissingField(&'static str),
    #[error("invalid request_time {0:?}")]
    BadLatency(String),
}

/// Parser that never fails: bad lines become the sentinel record and are
/// counted.
#[derive(Debug, Default)]
pub struct LineParser {
    errors: u64,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines replaced by the sentinel so far.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn parse(&mut self, line: &str) -> LogRecord {
        match parse_record(line) {
            Ok(record) => record,
            Err(err) => {
                self.errors += 1;
                debug!(%err, line, "failed to parse log line");
                LogRecord::default()
            }
        }
    }
}

/// Parse a single trimmed line into a [`LogRecord`].
///
/// Lines with fewer tokens than columns leave the trailing text columns
/// empty; only the latency column is required.
pub fn parse_record(line: &str) -> Result<LogRecord, LineError> {
    let normalized = line.replace(['[', ']'], "\"");
    let mut tokens = split_words(&normalized)?.into_iter();

    let mut next = || tokens.next().unwrap_or_default();
    let mut record = LogRecord {
        remote_addr: next(),
        remote_user: next(),
        http_x_real_ip: next(),
        time_local: next(),
        request: next(),
        status: next(),
        body_bytes_sent: next(),
        http_referer: next(),
        http_user_agent: next(),
        http_x_forwarded_for: next(),
        http_x_request_id: next(),
        http_x_rb_user: next(),
        request_time: 0.0,
    };

    let raw_time = tokens
        .next()
        .ok_or(LineError::MissingField(COLUMNS[COLUMNS.len() - 1]))?;
    record.request_time = parse_latency(&raw_time)?;

    // "GET /path HTTP/1.1" -> "/path"; anything shorter is kept verbatim.
    if let Some(path) = record.request.split_whitespace().nth(1) {
        record.request = path.to_string();
    }

    Ok(record)
}

fn parse_latency(raw: &str) -> Result<f64, LineError> {
    if raw == NO_VALUE {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(LineError::BadLatency(raw.to_string())),
    }
}

/// Split a line into words using POSIX shell quoting rules.
///
/// Single quotes are literal, double quotes only honour `\"` and `\\`,
/// and a backslash outside quotes escapes the next character. Adjacent
/// quoted and unquoted parts join into one word, and `""` is an empty word.
pub fn split_words(line: &str) -> Result<Vec<String>, LineError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\\' => {
                word.push(chars.next().ok_or(LineError::DanglingEscape)?);
                in_word = true;
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => word.push(ch),
                        None => return Err(LineError::UnclosedQuote),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => word.push(ch),
                            Some(ch) => {
                                word.push('\\');
                                word.push(ch);
                            }
                            None => return Err(LineError::UnclosedQuote),
                        },
                        Some(ch) => word.push(ch),
                        None => return Err(LineError::UnclosedQuote),
                    }
                }
            }
            other => {
                word.push(other);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(word);
    }

    Ok(words)
}
