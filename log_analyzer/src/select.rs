//! Picking the log file to report on.
//!
//! Rotated logs are named `<prefix>YYYYMMDD` or `<prefix>YYYYMMDD.gz`.
//! Because the date part is fixed width, the greatest file name is also the
//! newest log. Dates that already have a report are skipped.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::error;

use crate::report::parse_report_file_name;

/// Dates for which a report already exists.
pub type History = BTreeSet<NaiveDate>;

/// A candidate log file and the date embedded in its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub date: NaiveDate,
}

/// Extract the date from a log file name, if it has the expected shape.
pub fn parse_log_file_name(name: &str, prefix: &str) -> Option<NaiveDate> {
    let rest = name.strip_prefix(prefix)?;
    let stamp = rest.strip_suffix(".gz").unwrap_or(rest);
    if stamp.len() != 8 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(stamp, "%Y%m%d").ok()
}

/// Rebuild the set of processed dates from the report file names in
/// `report_dir`. A missing or unreadable directory means no history.
pub fn load_history(report_dir: &Path) -> History {
    match list_file_names(report_dir) {
        Ok(names) => names
            .iter()
            .filter_map(|name| parse_report_file_name(name))
            .collect(),
        Err(err) => {
            if report_dir.exists() {
                error!("Failed to load report history: {err:#}");
            }
            History::new()
        }
    }
}

/// Newest log in `log_dir` whose date is not in `history`.
///
/// Subdirectories are not searched. A listing failure is logged and
/// treated as an empty directory.
pub fn find_latest_log(log_dir: &Path, prefix: &str, history: &History) -> Option<LogFile> {
    let names = match list_file_names(log_dir) {
        Ok(names) => names,
        Err(err) => {
            error!("Failed to scan log directory: {err:#}");
            return None;
        }
    };

    latest_unprocessed(&names, prefix, history).map(|(name, date)| LogFile {
        path: log_dir.join(name),
        date,
    })
}

/// Selection over bare file names, kept separate from directory access.
pub fn latest_unprocessed<'a>(
    names: &'a [String],
    prefix: &str,
    history: &History,
) -> Option<(&'a str, NaiveDate)> {
    names
        .iter()
        .filter_map(|name| {
            let date = parse_log_file_name(name, prefix)?;
            (!history.contains(&date)).then_some((name.as_str(), date))
        })
        .max_by(|a, b| a.0.cmp(b.0))
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "nginx-access-ui.log-";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_log_file_name() {
        assert_eq!(
            parse_log_file_name("nginx-access-ui.log-20170630.gz", PREFIX),
            Some(date(2017, 6, 30))
        );
        assert_eq!(
            parse_log_file_name("nginx-access-ui.log-20170630", PREFIX),
            Some(date(2017, 6, 30))
        );
        assert_eq!(parse_log_file_name("nginx-access-ui.log-20170630.bz2", PREFIX), None);
        assert_eq!(parse_log_file_name("nginx-access-ui.log-2017063", PREFIX), None);
        assert_eq!(parse_log_file_name("nginx-access-ui.log-20171332", PREFIX), None);
        assert_eq!(parse_log_file_name("nginx-access.log-20170630", PREFIX), None);
    }

    #[test]
    fn test_picks_latest_by_name() {
        let files = names(&[
            "nginx-access-ui.log-20170101",
            "nginx-access-ui.log-20170630.gz",
            "nginx-access-ui.log-20170101",
        ]);
        let (name, d) = latest_unprocessed(&files, PREFIX, &History::new()).unwrap();
        assert_eq!(name, "nginx-access-ui.log-20170630.gz");
        assert_eq!(d, date(2017, 6, 30));
    }

    #[test]
    fn test_skips_reported_dates() {
        let files = names(&["nginx-access-ui.log-20170101", "nginx-access-ui.log-20170102"]);
        let history: History = [date(2017, 1, 1)].into_iter().collect();
        let (name, _) = latest_unprocessed(&files, PREFIX, &history).unwrap();
        assert_eq!(name, "nginx-access-ui.log-20170102");

        let history: History = [date(2017, 1, 1), date(2017, 1, 2)].into_iter().collect();
        assert!(latest_unprocessed(&files, PREFIX, &history).is_none());
    }

    #[test]
    fn test_ignores_foreign_files() {
        let files = names(&[
            "nginx-access-ui.log-20170101",
            "nginx-access-ui.log-20170630.bz2",
            "apache.log-20171231",
            "zzz",
        ]);
        let (name, _) = latest_unprocessed(&files, PREFIX, &History::new()).unwrap();
        assert_eq!(name, "nginx-access-ui.log-20170101");
    }

    #[test]
    fn test_find_latest_log_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nginx-access-ui.log-20170629"), "").unwrap();
        std::fs::write(dir.path().join("nginx-access-ui.log-20170630.gz"), "").unwrap();
        // directories are never candidates
        std::fs::create_dir(dir.path().join("nginx-access-ui.log-20171231")).unwrap();

        let found = find_latest_log(dir.path(), PREFIX, &History::new()).unwrap();
        assert_eq!(
            found,
            LogFile {
                path: dir.path().join("nginx-access-ui.log-20170630.gz"),
                date: date(2017, 6, 30),
            }
        );
    }

    #[test]
    fn test_missing_log_dir_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_latest_log(&dir.path().join("absent"), PREFIX, &History::new()).is_none());
    }

    #[test]
    fn test_load_history_from_report_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report-2017.06.30.html"), "").unwrap();
        std::fs::write(dir.path().join("report-2017.01.01.html"), "").unwrap();
        std::fs::write(dir.path().join("jquery.tablesorter.min.js"), "").unwrap();

        let history = load_history(dir.path());
        let expected: History = [date(2017, 1, 1), date(2017, 6, 30)].into_iter().collect();
        assert_eq!(history, expected);

        assert!(load_history(&dir.path().join("absent")).is_empty());
    }
}
