//! Append-only plain-text run logs, one file per stage.
//!
//! Each line is timestamped. Writes are best-effort: a failing log write
//! never fails the stage. Files accumulate across runs (append-only).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Open (or create) the log file for a stage under `logs_dir`.
    pub fn open(logs_dir: &Path, stage: &str) -> Self {
        let _ = std::fs::create_dir_all(logs_dir);
        Self {
            path: logs_dir.join(format!("{stage}.log")),
        }
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn line(&self, msg: &str) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{stamp} | {msg}"));
    }

    /// Append a banner line marking a run boundary.
    pub fn banner(&self, title: &str) {
        self.line(&format!("{:=^60}", format!(" {title} ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = RunLog::open(dir.path(), "download");
            log.line("first run");
        }
        {
            let log = RunLog::open(dir.path(), "download");
            log.line("second run");
        }

        let content = std::fs::read_to_string(dir.path().join("download.log")).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("first run"));
        assert!(content.contains("second run"));
    }

    #[test]
    fn banner_is_marked() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path(), "fetch");
        log.banner("TICKER FETCH");

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("TICKER FETCH"));
        assert!(content.contains("===="));
    }
}
