use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Analyzer settings. Keys in the JSON config file use the upper-case
/// names (`REPORT_SIZE`, `LOG_DIR`, ...); any key left out keeps its
/// default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct Config {
    /// Maximum number of rows in the report table.
    pub report_size: usize,
    pub report_dir: PathBuf,
    /// Directory holding the rotated access logs.
    pub log_dir: PathBuf,
    /// Highest tolerated ratio of parse errors to aggregated lines.
    pub max_parse_errors: f64,
    pub report_template: PathBuf,
    /// Where `log_analyzer.ts` is written after each run.
    pub ts_dir: PathBuf,
    /// Log file for the analyzer itself; stderr when unset.
    pub log_file: Option<PathBuf>,
    pub log_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_size: 1000,
            report_dir: PathBuf::from("./reports"),
            log_dir: PathBuf::from("./log"),
            max_parse_errors: 0.6,
            report_template: PathBuf::from("./report.html"),
            ts_dir: std::env::temp_dir(),
            log_file: None,
            log_prefix: "nginx-access-ui.log-".to_string(),
        }
    }
}

impl Config {
    /// Defaults, overridden by the JSON file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_json(&text)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse config JSON")
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_parse_errors) {
            bail!(
                "MAX_PARSE_ERRORS must be between 0 and 1, got {}",
                self.max_parse_errors
            );
        }
        if self.log_prefix.is_empty() {
            bail!("LOG_PREFIX must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.report_size, 1000);
        assert_eq!(config.report_dir, PathBuf::from("./reports"));
        assert_eq!(config.log_dir, PathBuf::from("./log"));
        assert!((config.max_parse_errors - 0.6).abs() < 1e-12);
        assert_eq!(config.log_prefix, "nginx-access-ui.log-");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_json(r#"{"REPORT_SIZE": 10, "LOG_DIR": "/var/log/nginx"}"#).unwrap();
        assert_eq!(config.report_size, 10);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/nginx"));
        assert_eq!(config.report_dir, PathBuf::from("./reports"));
        assert!((config.max_parse_errors - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_json(r#"{"REPORT_SIZ": 10}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"MAX_PARSE_ERRORS": 0.25, "LOG_FILE": "/tmp/log_analyzer.log"}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!((config.max_parse_errors - 0.25).abs() < 1e-12);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/log_analyzer.log")));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_out_of_range_error_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"MAX_PARSE_ERRORS": 1.5}"#).unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
