//! Shared application state, injected into every handler.

pub mod downloads;
pub mod search_cache;
pub mod video_cache;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::download::source::SourceRegistry;
use downloads::{DownloadRegistry, TrackKey, VideoKey};
use search_cache::SearchCache;
use video_cache::VideoInfoCache;

/// Everything mutable the bot carries, behind one `Arc` in handler deps.
pub struct AppState {
    pub search_cache: SearchCache,
    pub track_downloads: DownloadRegistry<TrackKey>,
    pub video_downloads: DownloadRegistry<VideoKey>,
    pub video_cache: VideoInfoCache,
    /// Query text waiting for the user to pick a platform, per chat.
    pending_queries: Mutex<HashMap<i64, String>>,
    pub sources: SourceRegistry,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            search_cache: SearchCache::new(),
            track_downloads: DownloadRegistry::new(),
            video_downloads: DownloadRegistry::new(),
            video_cache: VideoInfoCache::new(),
            pending_queries: Mutex::new(HashMap::new()),
            sources: SourceRegistry::default_registry(),
        }
    }

    pub fn set_pending_query(&self, chat_id: i64, query: String) {
        let mut pending = self.pending_queries.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(chat_id, query);
    }

    /// Consumes the pending query for a chat, if any.
    pub fn take_pending_query(&self, chat_id: i64) -> Option<String> {
        let mut pending = self.pending_queries.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&chat_id)
    }

    pub fn peek_pending_query(&self, chat_id: i64) -> Option<String> {
        let pending = self.pending_queries.lock().unwrap_or_else(|e| e.into_inner());
        pending.get(&chat_id).cloned()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_query_take_consumes() {
        let state = AppState::new();
        state.set_pending_query(1, "red hot chili peppers".to_string());
        assert_eq!(state.peek_pending_query(1).as_deref(), Some("red hot chili peppers"));
        assert_eq!(state.take_pending_query(1).as_deref(), Some("red hot chili peppers"));
        assert!(state.take_pending_query(1).is_none());
    }

    #[test]
    fn test_pending_query_per_chat() {
        let state = AppState::new();
        state.set_pending_query(1, "a".to_string());
        state.set_pending_query(2, "b".to_string());
        assert_eq!(state.take_pending_query(2).as_deref(), Some("b"));
        assert_eq!(state.take_pending_query(1).as_deref(), Some("a"));
    }
}
