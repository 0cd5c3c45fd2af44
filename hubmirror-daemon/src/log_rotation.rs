//! Size-based rotation of the daemon's log files.
//!
//! `daemon.log` is copied to `daemon.log.1` and truncated in place, so the
//! daemon's open append handle keeps writing to it. Older copies shift up by
//! one and the copy past the limit is deleted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotation limits for one log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub keep: usize,
}

impl Default for RotationPolicy {
    /// 10 MiB, five rotated copies.
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            keep: 5,
        }
    }
}

impl RotationPolicy {
    /// Rotate `log` if it has reached `max_bytes`. Returns whether it did.
    ///
    /// A missing log is not an error.
    pub fn rotate(&self, log: &Path) -> io::Result<bool> {
        let size = match fs::metadata(log) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if size < self.max_bytes || self.keep == 0 {
            return Ok(false);
        }

        let oldest = rotated_path(log, self.keep);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.keep).rev() {
            let from = rotated_path(log, n);
            if from.exists() {
                fs::rename(&from, rotated_path(log, n + 1))?;
            }
        }
        fs::copy(log, rotated_path(log, 1))?;
        fs::OpenOptions::new().write(true).open(log)?.set_len(0)?;
        Ok(true)
    }
}

/// Rotate both daemon logs under `home`. Failures are logged, not returned.
pub fn rotate_logs(home: &Path, policy: RotationPolicy) {
    for log in [
        crate::paths::stdout_log_path(home),
        crate::paths::stderr_log_path(home),
    ] {
        match policy.rotate(&log) {
            Ok(true) => tracing::info!(path = %log.display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => tracing::warn!(path = %log.display(), error = %err, "log rotation failed"),
        }
    }
}

/// `daemon.log` -> `daemon.log.<n>`
fn rotated_path(log: &Path, n: usize) -> PathBuf {
    let mut name = log.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(format!(".{n}"));
    log.with_file_name(name)
}
