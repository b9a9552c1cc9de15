//! Active-download registry.
//!
//! Enforces at most one in-flight download per key: a second request for the
//! same (chat, platform, track) is rejected outright rather than queued.
//! Entries carry a [`CancellationToken`] so cancel buttons and chat-wide
//! cleanup can stop work cooperatively; a periodic sweep reaps entries whose
//! task died without calling `finish`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::download::source::SourceKind;

/// Key for audio track downloads.
pub type TrackKey = (i64, SourceKind, String);

/// Key for video downloads.
pub type VideoKey = (i64, String);

/// Lifecycle phase, shown in logs and used for stale detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Downloading,
    Uploading,
    /// Token fired, task still tearing down; the key stays occupied until
    /// the task calls `finish`.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ActiveDownload {
    pub chat_id: i64,
    pub title: String,
    pub phase: DownloadPhase,
    pub started_at: Instant,
    pub cancel: CancellationToken,
}

/// Returned when a download for the same key is already running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyActive {
    pub title: String,
}

impl std::fmt::Display for AlreadyActive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download already in progress: {}", self.title)
    }
}

impl std::error::Error for AlreadyActive {}

pub struct DownloadRegistry<K> {
    inner: Mutex<HashMap<K, ActiveDownload>>,
}

impl<K: Eq + Hash + Clone> DownloadRegistry<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new download, handing back its cancellation token.
    ///
    /// Rejects with [`AlreadyActive`] when the key is already in flight.
    pub fn begin(&self, key: K, chat_id: i64, title: String) -> Result<CancellationToken, AlreadyActive> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = inner.get(&key) {
            return Err(AlreadyActive {
                title: existing.title.clone(),
            });
        }
        let cancel = CancellationToken::new();
        inner.insert(
            key,
            ActiveDownload {
                chat_id,
                title,
                phase: DownloadPhase::Downloading,
                started_at: Instant::now(),
                cancel: cancel.clone(),
            },
        );
        Ok(cancel)
    }

    /// Marks a download as uploading (past the point where cancel buttons work).
    pub fn set_uploading(&self, key: &K) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = inner.get_mut(key) {
            entry.phase = DownloadPhase::Uploading;
        }
    }

    /// Fires the cancellation token for a key and parks the entry in the
    /// cancelled phase. The key stays occupied until the task observes the
    /// token and calls `finish`, so a retry cannot race the old task's
    /// file cleanup. Returns false when nothing was active.
    pub fn cancel(&self, key: &K) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.get_mut(key) {
            Some(entry) if entry.phase != DownloadPhase::Cancelled => {
                entry.cancel.cancel();
                entry.phase = DownloadPhase::Cancelled;
                true
            }
            _ => false,
        }
    }

    /// Cancels every active download belonging to a chat.
    pub fn cancel_all_for_chat(&self, chat_id: i64) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut cancelled = 0;
        for entry in inner.values_mut() {
            if entry.chat_id == chat_id && entry.phase != DownloadPhase::Cancelled {
                entry.cancel.cancel();
                entry.phase = DownloadPhase::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Removes a download once its task has fully torn down. This is the
    /// only transition that frees the key, for completed and cancelled
    /// downloads alike.
    pub fn finish(&self, key: &K) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.remove(key);
    }

    pub fn is_active(&self, key: &K) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.len()
    }

    /// Cancels and removes entries older than `stale_after`; returns how many.
    /// Catches tasks that panicked or were aborted before calling `finish`.
    pub fn sweep_stale(&self, stale_after: Duration) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let stale: Vec<K> = inner
            .iter()
            .filter(|(_, d)| d.started_at.elapsed() > stale_after)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            if let Some(entry) = inner.remove(key) {
                log::warn!("Sweeping stale download: {} ({:?})", entry.title, entry.phase);
                entry.cancel.cancel();
            }
        }
        stale.len()
    }
}

impl<K: Eq + Hash + Clone> Default for DownloadRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(chat: i64, id: &str) -> TrackKey {
        (chat, SourceKind::Youtube, id.to_string())
    }

    #[test]
    fn test_begin_rejects_duplicate() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "Song".to_string()).unwrap();
        let err = registry.begin(key(1, "a"), 1, "Song again".to_string()).unwrap_err();
        assert_eq!(err.title, "Song");

        // Different track or chat is independent
        assert!(registry.begin(key(1, "b"), 1, "Other".to_string()).is_ok());
        assert!(registry.begin(key(2, "a"), 2, "Same id, other chat".to_string()).is_ok());
    }

    #[test]
    fn test_cancel_fires_token_but_holds_key() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        let token = registry.begin(key(1, "a"), 1, "Song".to_string()).unwrap();
        assert!(!token.is_cancelled());

        assert!(registry.cancel(&key(1, "a")));
        assert!(token.is_cancelled());

        // The old task has not torn down yet, so a retry is still rejected
        assert!(registry.is_active(&key(1, "a")));
        assert!(registry.begin(key(1, "a"), 1, "Retry".to_string()).is_err());

        // Only finish frees the key
        registry.finish(&key(1, "a"));
        assert!(registry.begin(key(1, "a"), 1, "Retry".to_string()).is_ok());
    }

    #[test]
    fn test_second_cancel_is_noop() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "Song".to_string()).unwrap();
        assert!(registry.cancel(&key(1, "a")));
        assert!(!registry.cancel(&key(1, "a")));
    }

    #[test]
    fn test_cancel_missing_returns_false() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        assert!(!registry.cancel(&key(1, "nope")));
    }

    #[test]
    fn test_cancel_all_for_chat() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        let t1 = registry.begin(key(1, "a"), 1, "A".to_string()).unwrap();
        let t2 = registry.begin(key(1, "b"), 1, "B".to_string()).unwrap();
        let t3 = registry.begin(key(2, "c"), 2, "C".to_string()).unwrap();

        assert_eq!(registry.cancel_all_for_chat(1), 2);
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
        assert!(!t3.is_cancelled());

        // Cancelled entries stay registered until their tasks finish,
        // but a second chat-wide cancel finds nothing left to do
        assert_eq!(registry.active_count(), 3);
        assert_eq!(registry.cancel_all_for_chat(1), 0);

        registry.finish(&key(1, "a"));
        registry.finish(&key(1, "b"));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_finish_after_cancel_frees_the_key() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "Song".to_string()).unwrap();
        registry.cancel(&key(1, "a"));
        registry.finish(&key(1, "a"));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_sweep_stale() {
        let registry: DownloadRegistry<VideoKey> = DownloadRegistry::new();
        let token = registry.begin((1, "vid".to_string()), 1, "Video".to_string()).unwrap();

        assert_eq!(registry.sweep_stale(Duration::from_secs(600)), 0);
        assert!(registry.is_active(&(1, "vid".to_string())));

        assert_eq!(registry.sweep_stale(Duration::ZERO), 1);
        assert!(token.is_cancelled());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_set_uploading_phase() {
        let registry: DownloadRegistry<TrackKey> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "Song".to_string()).unwrap();
        registry.set_uploading(&key(1, "a"));
        assert!(registry.is_active(&key(1, "a")));
    }
}
