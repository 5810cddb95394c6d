//! Temp-frame housekeeping.
//!
//! Incoming frames are written to disk for the duration of one analysis and
//! removed afterwards. A periodic sweep deletes anything left behind by
//! interrupted requests.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, warn};

/// Frames older than this are considered abandoned.
pub const DEFAULT_MAX_FRAME_AGE: Duration = Duration::from_secs(300);

/// How often the stale-frame sweep runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Write one JPEG frame to the temp directory and return its path.
pub fn save_frame(dir: &Path, jpeg_bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create temp directory {:?}", dir))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%f");
    let path = dir.join(format!("frame_{}.jpg", timestamp));
    std::fs::write(&path, jpeg_bytes)
        .with_context(|| format!("Failed to write frame to {:?}", path))?;

    debug!("Saved frame: {:?} ({} bytes)", path, jpeg_bytes.len());
    Ok(path)
}

/// Remove a frame once its analysis is done. Best effort.
pub fn remove_frame(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to remove frame {:?}: {}", path, e);
    }
}

/// Delete regular files in `dir` whose modification time is older than
/// `max_age`. Returns the number of files removed. Missing directories and
/// unreadable entries are skipped, not errors.
pub fn cleanup_stale_frames(dir: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => continue,
        };
        let age = match now.duration_since(modified) {
            Ok(age) => age,
            Err(_) => continue,
        };
        if age > max_age {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale frame {:?}: {}", path, e),
            }
        }
    }

    if removed > 0 {
        debug!("Removed {} stale frame(s) from {:?}", removed, dir);
    }
    removed
}

/// Periodic sweep of the temp directory. Never returns.
pub async fn run_cleanup_task(dir: PathBuf, max_age: Duration) {
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        cleanup_stale_frames(&dir, max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_remove_frame() {
        let dir = tempdir().unwrap();
        let path = save_frame(dir.path(), b"\xff\xd8\xff\xe0fake").unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"\xff\xd8\xff\xe0fake");

        remove_frame(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("frames");
        let path = save_frame(&nested, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_fresh_frames_survive_cleanup() {
        let dir = tempdir().unwrap();
        let path = save_frame(dir.path(), b"data").unwrap();
        let removed = cleanup_stale_frames(dir.path(), Duration::from_secs(300));
        assert_eq!(removed, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_stale_frames_are_removed() {
        let dir = tempdir().unwrap();
        let path = save_frame(dir.path(), b"data").unwrap();
        // Zero max age makes every existing file stale.
        std::thread::sleep(Duration::from_millis(20));
        let removed = cleanup_stale_frames(dir.path(), Duration::ZERO);
        assert_eq!(removed, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_missing_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(cleanup_stale_frames(&missing, Duration::ZERO), 0);
    }
}
