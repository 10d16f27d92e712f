use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::RocError;

/// Append-only text sink for the human-readable cycle log.
pub trait LogSink: Send {
    fn append_line(&self, line: &str);
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn append_line(&self, line: &str) {
        (**self).append_line(line)
    }
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn append_line(&self, line: &str) {
        tracing::info!("{line}");
    }
}

/// Appends `[<local time>] <line>` records to a text file.
#[derive(Debug)]
pub struct FileLog {
    path: Utf8PathBuf,
    file: Mutex<File>,
}

impl FileLog {
    pub fn open(path: &Utf8Path) -> Result<Self, RocError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| RocError::Filesystem(format!("create {parent}: {err}")))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| RocError::Filesystem(format!("open log {path}: {err}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl LogSink for FileLog {
    fn append_line(&self, line: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(err) = writeln!(file, "[{stamp}] {line}") {
            tracing::warn!(path = %self.path, "log append failed: {err}");
        }
    }
}

/// Writes each line to both sinks.
pub struct TeeLog<A, B> {
    first: A,
    second: B,
}

impl<A: LogSink, B: LogSink> TeeLog<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: LogSink, B: LogSink> LogSink for TeeLog<A, B> {
    fn append_line(&self, line: &str) {
        self.first.append_line(line);
        self.second.append_line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_log_prefixes_timestamp() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("logs/roc.log")).unwrap();
        let log = FileLog::open(&path).unwrap();
        log.append_line("Parse data - no new data");
        log.append_line("second");

        let content = fs::read_to_string(path.as_std_path()).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Parse data - no new data"));
    }
}
