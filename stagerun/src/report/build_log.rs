//! Per-run build log files.
//!
//! Layout under the workflow's `logs_dir`:
//!
//! ```text
//! logs_dir/
//!   build_20240307_090501/build.log
//!   build_latest -> build_20240307_090501
//! ```

use super::strip_ansi;
use crate::utils::human_timestamp;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the log inside each build directory.
pub const BUILD_LOG_FILE: &str = "build.log";

/// Name of the symlink pointing at the most recent build directory.
pub const LATEST_LINK: &str = "build_latest";

const RULE_WIDTH: usize = 60;

/// An open build log. Dropping an unfinished log finishes it as FAILED.
#[derive(Debug)]
pub struct BuildLog {
    logs_dir: PathBuf,
    build_dir: PathBuf,
    path: PathBuf,
    file: Option<File>,
}

impl BuildLog {
    /// Creates `logs_dir/build_<timestamp>/build.log` and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory or file cannot be created.
    pub fn start(logs_dir: impl Into<PathBuf>, timestamp: &str) -> io::Result<Self> {
        let logs_dir = logs_dir.into();
        let build_dir = logs_dir.join(format!("build_{timestamp}"));
        fs::create_dir_all(&build_dir)?;

        let path = build_dir.join(BUILD_LOG_FILE);
        let file = File::create(&path)?;
        let mut log = Self {
            logs_dir,
            build_dir,
            path,
            file: Some(file),
        };
        log.write(&format!("Build started at {}\n", human_timestamp()))?;
        log.write(&format!("{}\n\n", "=".repeat(RULE_WIDTH)))?;
        debug!(path = %log.path.display(), "build log started");
        Ok(log)
    }

    /// Path of the `build.log` file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The per-run build directory.
    #[must_use]
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Returns true once [`BuildLog::finish`] has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.file.is_none()
    }

    /// Appends `text` with escape sequences removed. No-op once finished.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the write or flush fails.
    pub fn write(&mut self, text: &str) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(strip_ansi(text).as_bytes())?;
            file.flush()?;
        }
        Ok(())
    }

    /// Writes the footer, closes the file and points `build_latest` here.
    ///
    /// Calling it again is a no-op that returns the same path.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the footer or the symlink cannot be written.
    pub fn finish(&mut self, success: bool) -> io::Result<PathBuf> {
        if self.file.is_none() {
            return Ok(self.path.clone());
        }

        let status = if success { "SUCCESS" } else { "FAILED" };
        self.write(&format!("\n{}\n", "=".repeat(RULE_WIDTH)))?;
        self.write(&format!("Build {status} at {}\n", human_timestamp()))?;
        self.file = None;

        self.link_latest()?;
        debug!(path = %self.path.display(), status, "build log finished");
        Ok(self.path.clone())
    }

    fn link_latest(&self) -> io::Result<()> {
        let latest = self.logs_dir.join(LATEST_LINK);
        match fs::symlink_metadata(&latest) {
            Ok(meta) if meta.file_type().is_symlink() => remove_link(&latest)?,
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&latest)?,
            Ok(_) => fs::remove_file(&latest)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let target = self
            .build_dir
            .file_name()
            .map_or_else(|| self.build_dir.clone(), PathBuf::from);
        create_link(&target, &latest)
    }
}

impl Drop for BuildLog {
    fn drop(&mut self) {
        if !self.is_finished() {
            if let Err(err) = self.finish(false) {
                warn!(path = %self.path.display(), error = %err, "failed to finish build log");
            }
        }
    }
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_dir(link).or_else(|_| fs::remove_file(link))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_start_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = BuildLog::start(dir.path().join("logs"), "20240101_000000").unwrap();

        assert_eq!(
            log.path(),
            dir.path().join("logs/build_20240101_000000/build.log")
        );
        let content = read(log.path());
        assert!(content.starts_with("Build started at "));
        assert!(content.contains(&format!("{}\n\n", "=".repeat(60))));
    }

    #[test]
    fn test_write_strips_ansi() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::start(dir.path(), "ts").unwrap();
        log.write("\x1b[1m\x1b[96m▸ build\x1b[0m\n").unwrap();
        assert!(read(log.path()).contains("▸ build\n"));
        assert!(!read(log.path()).contains('\x1b'));
    }

    #[cfg(unix)]
    #[test]
    fn test_finish_links_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::start(dir.path(), "first").unwrap();
        let path = log.finish(true).unwrap();

        let content = read(&path);
        assert!(content.contains("Build SUCCESS at "));
        let latest = dir.path().join(LATEST_LINK);
        assert_eq!(fs::read_link(&latest).unwrap(), PathBuf::from("build_first"));
        assert!(latest.join(BUILD_LOG_FILE).exists());

        // finishing twice is harmless and writes nothing more
        assert_eq!(log.finish(false).unwrap(), path);
        assert!(!read(&path).contains("FAILED"));
    }

    #[cfg(unix)]
    #[test]
    fn test_latest_link_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        BuildLog::start(dir.path(), "one").unwrap().finish(true).unwrap();
        BuildLog::start(dir.path(), "two").unwrap().finish(true).unwrap();

        let latest = dir.path().join(LATEST_LINK);
        assert_eq!(fs::read_link(latest).unwrap(), PathBuf::from("build_two"));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_directory_replaced_by_link() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(LATEST_LINK).join("stale")).unwrap();

        BuildLog::start(dir.path(), "new").unwrap().finish(true).unwrap();
        let meta = fs::symlink_metadata(dir.path().join(LATEST_LINK)).unwrap();
        assert!(meta.file_type().is_symlink());
    }

    #[test]
    fn test_drop_finishes_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut log = BuildLog::start(dir.path(), "dropped").unwrap();
            log.write("partial\n").unwrap();
            log.path().to_path_buf()
        };
        let content = read(&path);
        assert!(content.contains("partial\n"));
        assert!(content.contains("Build FAILED at "));
    }
}
