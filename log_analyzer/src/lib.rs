//! Offline nginx access log analyzer.
//!
//! Each run picks the newest rotated log without a report, aggregates
//! per-URL latency stats in one pass, and renders them into an HTML report.

pub mod app;
pub mod config;
pub mod decode;
pub mod logging;
pub mod parse;
pub mod reader;
pub mod report;
pub mod select;
pub mod stats;
