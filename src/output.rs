use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::Utf8Path;
use tempfile::Builder;

use crate::controller::{CycleObserver, CycleSummary};
use crate::domain::Punch;
use crate::error::RocError;

const SPLIT_TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Renders and writes the RACOM raw splits text file.
pub struct RawSplitsWriter;

impl RawSplitsWriter {
    /// One `{si:>8}: {code:>3}/{HH:MM:SS.mmm}` line per punch, in the given order.
    pub fn serialize(punches: &[Punch]) -> String {
        let mut text = String::with_capacity(punches.len() * 28);
        for punch in punches {
            text.push_str(&Self::line(punch));
            text.push('\n');
        }
        text
    }

    pub fn line(punch: &Punch) -> String {
        format!(
            "{:>8}: {:>3}/{}",
            punch.si,
            punch.code,
            punch.timestamp.time().format(SPLIT_TIME_FORMAT)
        )
    }

    /// Replaces the whole file at `path` with `text`. An existing file keeps
    /// its permissions; a new one gets the process default.
    pub fn write(path: &Utf8Path, text: &str) -> Result<(), RocError> {
        let fail = |message: String| RocError::OutputWrite {
            path: path.to_path_buf(),
            message,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path()).map_err(|err| fail(err.to_string()))?;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_std_path())
            .map_err(|err| fail(err.to_string()))?;
        let permissions = fs::metadata(path.as_std_path())
            .map_err(|err| fail(err.to_string()))?
            .permissions();

        let mut temp = Builder::new()
            .prefix("roc2rawsplits")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| fail(err.to_string()))?;
        temp.write_all(text.as_bytes())
            .map_err(|err| fail(err.to_string()))?;
        temp.flush().map_err(|err| fail(err.to_string()))?;
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|err| fail(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| fail(err.error.to_string()))?;
        Ok(())
    }
}

/// Prints new punches and a per-cycle status line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver {
    pub quiet: bool,
}

impl CycleObserver for ConsoleObserver {
    fn new_punch_accepted(&self, punch: &Punch) {
        if !self.quiet {
            println!("{}", RawSplitsWriter::line(punch));
        }
    }

    fn cycle_complete(&self, summary: &CycleSummary) {
        if let Some(err) = &summary.transport_error {
            eprintln!("download failed: {err}");
        }
        if let Some(err) = &summary.flush_error {
            eprintln!("{err}");
        }
        println!(
            "last Id {}, whole punches cnt {}",
            summary.cursor, summary.store_size
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn reference_line_layout() {
        let punch = Punch {
            id: 949706,
            code: 2,
            si: 8002711,
            timestamp: NaiveDate::from_ymd_opt(2023, 8, 20)
                .unwrap()
                .and_hms_opt(15, 39, 11)
                .unwrap(),
        };
        assert_eq!(RawSplitsWriter::line(&punch), " 8002711:   2/15:39:11.000");
        assert_eq!(
            RawSplitsWriter::serialize(&[punch]),
            " 8002711:   2/15:39:11.000\n"
        );
    }

    #[test]
    fn empty_snapshot_serializes_to_empty_text() {
        assert_eq!(RawSplitsWriter::serialize(&[]), "");
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("raw.txt")).unwrap();
        fs::write(path.as_std_path(), "old\n").unwrap();
        fs::set_permissions(path.as_std_path(), fs::Permissions::from_mode(0o644)).unwrap();

        RawSplitsWriter::write(&path, "new\n").unwrap();

        let mode = fs::metadata(path.as_std_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "new\n");
    }
}
