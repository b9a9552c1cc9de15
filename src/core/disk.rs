//! Download scratch directory management
//!
//! The scratch directory holds in-flight track and video files. Every
//! download deletes its own file after sending; the sweep here is a leak
//! guard for tasks that crashed before reaching their cleanup step.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::core::config;
use crate::core::error::AppResult;

/// Returns the expanded scratch directory path, creating it if needed.
pub fn ensure_download_dir() -> AppResult<PathBuf> {
    let expanded = shellexpand::tilde(config::DOWNLOAD_FOLDER.as_str()).to_string();
    let path = PathBuf::from(expanded);
    if !path.exists() {
        fs_err::create_dir_all(&path)?;
        log::info!("Created download folder: {}", path.display());
    }
    Ok(path)
}

/// Removes a single scratch file, logging instead of failing.
///
/// Called from the guaranteed-cleanup step of every download; by that point
/// the user already got their answer, so an unlink failure is only logged.
pub fn remove_file_best_effort(path: &Path) {
    if path.exists() {
        match fs_err::remove_file(path) {
            Ok(()) => log::info!("Cleaned up scratch file: {}", path.display()),
            Err(e) => log::warn!("Failed to clean up {}: {}", path.display(), e),
        }
    }
}

/// Removes every file in a download's scratch directory that shares the
/// given base path's file name prefix. Catches partials like
/// `<base>.<ext>.part` and `.ytdl` fragments left behind when the
/// downloader is killed mid-transfer. Returns the number removed.
pub fn remove_stem_files_best_effort(base: &Path) -> usize {
    let (Some(parent), Some(stem)) = (base.parent(), base.file_name().and_then(|s| s.to_str())) else {
        return 0;
    };
    let entries = match fs_err::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Partial-file cleanup failed to list {}: {}", parent.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && entry.file_name().to_string_lossy().starts_with(stem) {
            match fs_err::remove_file(&path) {
                Ok(()) => {
                    log::info!("Cleaned up partial file: {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to clean up partial {}: {}", path.display(), e),
            }
        }
    }
    removed
}

/// Deletes scratch files older than `max_age`. Returns the number removed.
pub fn sweep_old_files(max_age: Duration) -> usize {
    let dir = match ensure_download_dir() {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Scratch sweep skipped, cannot open download folder: {}", e);
            return 0;
        }
    };
    sweep_dir(&dir, max_age)
}

fn sweep_dir(dir: &Path, max_age: Duration) -> usize {
    let entries = match fs_err::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Scratch sweep failed to list {}: {}", dir.display(), e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|a| a >= max_age) {
            match fs_err::remove_file(&path) {
                Ok(()) => {
                    log::info!("Removed old scratch file: {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove old scratch file {}: {}", path.display(), e),
            }
        }
    }
    removed
}

/// Removes every file in the scratch directory. Used at shutdown.
pub fn sweep_all_files() -> usize {
    sweep_old_files(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sweep_dir_removes_only_aged() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("stale.mp3");
        fs::write(&file, b"x").unwrap();

        // A freshly written file survives a 1 hour threshold
        assert_eq!(sweep_dir(tmp.path(), Duration::from_secs(3600)), 0);
        assert!(file.exists());

        // Zero threshold removes everything
        assert_eq!(sweep_dir(tmp.path(), Duration::ZERO), 1);
        assert!(!file.exists());
    }

    #[test]
    fn test_remove_stem_files_catches_partials() {
        let tmp = tempfile::tempdir().unwrap();
        let partial = tmp.path().join("youtube_abc.mp3.part");
        let leftover = tmp.path().join("youtube_abc.webm");
        let unrelated = tmp.path().join("youtube_xyz.mp3");
        for path in [&partial, &leftover, &unrelated] {
            fs::write(path, b"x").unwrap();
        }

        let removed = remove_stem_files_best_effort(&tmp.path().join("youtube_abc"));
        assert_eq!(removed, 2);
        assert!(!partial.exists());
        assert!(!leftover.exists());
        assert!(unrelated.exists());
    }
}
