use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;

use crate::{
    decode::decode_line,
    parse::{LineParser, LogRecord},
};

/// Forward-only stream of parsed records from one log file.
///
/// The file handle is owned by the reader and closed when it is dropped,
/// whether the stream was exhausted or abandoned early. The first read or
/// decode error is yielded once and ends the stream.
pub struct LogReader {
    source: Box<dyn BufRead>,
    origin: PathBuf,
    parser: LineParser,
    buf: Vec<u8>,
    lines: u64,
    done: bool,
}

impl LogReader {
    /// Open a plain or gzip-compressed log, picking the decoder by extension.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        let source: Box<dyn BufRead> = if is_gzip(path) {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(Self::with_source(source, path))
    }

    fn with_source(source: Box<dyn BufRead>, origin: &Path) -> Self {
        Self {
            source,
            origin: origin.to_path_buf(),
            parser: LineParser::new(),
            buf: Vec::new(),
            lines: 0,
            done: false,
        }
    }

    /// Lines that failed to parse and were replaced by the empty record.
    pub fn parse_errors(&self) -> u64 {
        self.parser.errors()
    }
}

impl Iterator for LogReader {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.source.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.lines += 1;
                match decode_line(&self.buf) {
                    Ok(text) => Some(Ok(self.parser.parse(text.trim()))),
                    Err(err) => {
                        self.done = true;
                        Some(Err(err.context(format!(
                            "Failed to decode line {} of {}",
                            self.lines,
                            self.origin.display()
                        ))))
                    }
                }
            }
            Err(err) => {
                self.done = true;
                Some(Err(anyhow::Error::new(err).context(format!(
                    "Failed to read line {} of {}",
                    self.lines + 1,
                    self.origin.display()
                ))))
            }
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}
