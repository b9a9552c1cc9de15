//! Per-chat search session cache.
//!
//! Results are cached under (chat, platform, query) so pagination and track
//! selection keep working until the entry ages out or gets evicted. The cache
//! is bounded: past the ceiling, the oldest half is dropped in one sweep.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::config;
use crate::download::source::{SourceKind, Track};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chat_id: i64,
    pub source: SourceKind,
    pub query: String,
}

impl CacheKey {
    pub fn new(chat_id: i64, source: SourceKind, query: impl Into<String>) -> Self {
        Self {
            chat_id,
            source,
            query: query.into(),
        }
    }
}

/// One cached search session.
#[derive(Debug, Clone)]
pub struct SearchEntry {
    pub tracks: Vec<Track>,
    pub query: String,
    pub source: SourceKind,
    pub total_pages: usize,
    pub inserted_at: Instant,
}

impl SearchEntry {
    pub fn new(tracks: Vec<Track>, query: String, source: SourceKind, page_size: usize) -> Self {
        let total_pages = if tracks.is_empty() {
            0
        } else {
            tracks.len().div_ceil(page_size)
        };
        Self {
            tracks,
            query,
            source,
            total_pages,
            inserted_at: Instant::now(),
        }
    }

    /// Returns the tracks for a page, or None when the page is out of range.
    pub fn page(&self, page: usize, page_size: usize) -> Option<&[Track]> {
        if page >= self.total_pages {
            return None;
        }
        let start = page * page_size;
        let end = std::cmp::min(start + page_size, self.tracks.len());
        Some(&self.tracks[start..end])
    }

    pub fn find_track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }
}

/// Bounded search cache with insertion-order eviction.
pub struct SearchCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
}

struct CacheInner {
    entries: HashMap<CacheKey, SearchEntry>,
    // Insertion order for eviction; re-inserts are moved to the back
    order: VecDeque<CacheKey>,
}

impl SearchCache {
    pub fn new() -> Self {
        Self::with_capacity(config::cache::MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries,
        }
    }

    /// Inserts a search session, evicting the oldest half when full.
    pub fn put(&self, key: CacheKey, entry: SearchEntry) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        }
        inner.entries.insert(key.clone(), entry);
        inner.order.push_back(key);

        if inner.entries.len() > self.max_entries {
            let drop_count = inner.order.len() / 2;
            log::info!(
                "Search cache over {} entries, evicting oldest {}",
                self.max_entries,
                drop_count
            );
            for _ in 0..drop_count {
                if let Some(old_key) = inner.order.pop_front() {
                    inner.entries.remove(&old_key);
                }
            }
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<SearchEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.get(key).cloned()
    }

    /// Finds a track by id across all of a chat's sessions for one source.
    ///
    /// Download callbacks carry only the source and track id, so the query
    /// under which the track was cached is recovered here. Newest sessions
    /// win when the same track shows up under several queries.
    pub fn find_track_for_chat(&self, chat_id: i64, source: SourceKind, track_id: &str) -> Option<Track> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .order
            .iter()
            .rev()
            .filter(|k| k.chat_id == chat_id && k.source == source)
            .filter_map(|k| inner.entries.get(k))
            .find_map(|entry| entry.find_track(track_id).cloned())
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries older than `max_age`; returns how many were removed.
    pub fn sweep_older_than(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.inserted_at.elapsed() <= max_age);
        let entries = &inner.entries;
        let retained: Vec<CacheKey> = inner.order.iter().filter(|k| entries.contains_key(k)).cloned().collect();
        inner.order = retained.into();
        before - inner.entries.len()
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new()
    }
}
