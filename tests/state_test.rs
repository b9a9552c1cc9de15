//! Integration tests for shared state: search sessions, pagination and the
//! single-flight download registries.
//!
//! Run with: cargo test --test state_test

use std::time::Duration;

use tunegrab::download::source::{SourceKind, Track};
use tunegrab::state::downloads::DownloadRegistry;
use tunegrab::state::search_cache::{CacheKey, SearchEntry, SearchCache};
use tunegrab::state::AppState;

fn track(id: usize) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Track {}", id),
        artist: Some("Artist".to_string()),
        duration_secs: 180,
        quality: "MP3 320kbps".to_string(),
        url: format!("https://example.com/{}", id),
        source: SourceKind::Youtube,
    }
}

fn session(n: usize, query: &str, page_size: usize) -> SearchEntry {
    let tracks = (0..n).map(track).collect();
    SearchEntry::new(tracks, query.to_string(), SourceKind::Youtube, page_size)
}

mod pagination_tests {
    use super::*;

    #[test]
    fn twenty_five_results_make_three_pages() {
        let entry = session(25, "q", 10);
        assert_eq!(entry.total_pages, 3);
        assert_eq!(entry.page(0, 10).unwrap().len(), 10);
        assert_eq!(entry.page(1, 10).unwrap().len(), 10);
        assert_eq!(entry.page(2, 10).unwrap().len(), 5);
    }

    #[test]
    fn out_of_range_page_is_none() {
        let entry = session(25, "q", 10);
        assert!(entry.page(3, 10).is_none());
        assert!(entry.page(100, 10).is_none());
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let entry = session(25, "q", 10);
        let last = entry.page(2, 10).unwrap();
        assert_eq!(last[0].id, "20");
        assert_eq!(last[4].id, "24");
    }
}

mod cache_tests {
    use super::*;

    #[test]
    fn sessions_are_isolated_per_chat_and_source() {
        let cache = SearchCache::with_capacity(100);
        cache.put(CacheKey::new(1, SourceKind::Youtube, "q"), session(3, "q", 10));
        cache.put(CacheKey::new(1, SourceKind::VkMusic, "q"), session(7, "q", 10));

        assert_eq!(cache.get(&CacheKey::new(1, SourceKind::Youtube, "q")).unwrap().tracks.len(), 3);
        assert_eq!(cache.get(&CacheKey::new(1, SourceKind::VkMusic, "q")).unwrap().tracks.len(), 7);
        assert!(cache.get(&CacheKey::new(2, SourceKind::Youtube, "q")).is_none());
    }

    #[test]
    fn track_lookup_spans_multiple_sessions() {
        let cache = SearchCache::with_capacity(100);
        cache.put(CacheKey::new(1, SourceKind::Youtube, "first query"), session(5, "first query", 10));
        cache.put(CacheKey::new(1, SourceKind::Youtube, "second query"), session(10, "second query", 10));

        // id "7" only exists in the second session
        let found = cache.find_track_for_chat(1, SourceKind::Youtube, "7");
        assert!(found.is_some());
        assert_eq!(found.unwrap().title, "Track 7");
        assert!(cache.find_track_for_chat(1, SourceKind::Soundcloud, "7").is_none());
    }

    #[test]
    fn sweep_removes_expired_sessions() {
        let cache = SearchCache::with_capacity(100);
        cache.put(CacheKey::new(1, SourceKind::Youtube, "q"), session(1, "q", 10));
        assert_eq!(cache.sweep_older_than(Duration::from_secs(3600)), 0);
        assert_eq!(cache.sweep_older_than(Duration::ZERO), 1);
        assert!(cache.is_empty());
    }
}

mod registry_tests {
    use super::*;

    type Key = (i64, SourceKind, String);

    fn key(chat: i64, id: &str) -> Key {
        (chat, SourceKind::Youtube, id.to_string())
    }

    #[test]
    fn second_begin_for_same_key_is_rejected() {
        let registry: DownloadRegistry<Key> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "First".to_string()).unwrap();

        let rejection = registry.begin(key(1, "a"), 1, "First".to_string());
        assert!(rejection.is_err());
        assert_eq!(rejection.unwrap_err().title, "First");

        // A different track in the same chat is allowed
        assert!(registry.begin(key(1, "b"), 1, "Second".to_string()).is_ok());
    }

    #[test]
    fn finish_frees_the_slot() {
        let registry: DownloadRegistry<Key> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "t".to_string()).unwrap();
        registry.finish(&key(1, "a"));
        assert!(!registry.is_active(&key(1, "a")));
        assert!(registry.begin(key(1, "a"), 1, "t".to_string()).is_ok());
    }

    #[test]
    fn cancelled_key_stays_held_until_finish() {
        let registry: DownloadRegistry<Key> = DownloadRegistry::new();
        registry.begin(key(1, "a"), 1, "First".to_string()).unwrap();
        assert!(registry.cancel(&key(1, "a")));

        // The cancelled task still owns the scratch file path until it
        // tears down, so a retry before finish must be rejected
        assert!(registry.begin(key(1, "a"), 1, "Retry".to_string()).is_err());

        registry.finish(&key(1, "a"));
        assert!(registry.begin(key(1, "a"), 1, "Retry".to_string()).is_ok());
    }

    #[test]
    fn cancel_all_for_chat_fires_tokens() {
        let registry: DownloadRegistry<Key> = DownloadRegistry::new();
        let token_a = registry.begin(key(1, "a"), 1, "a".to_string()).unwrap();
        let token_b = registry.begin(key(1, "b"), 1, "b".to_string()).unwrap();
        let token_other = registry.begin(key(2, "c"), 2, "c".to_string()).unwrap();

        assert_eq!(registry.cancel_all_for_chat(1), 2);
        assert!(token_a.is_cancelled());
        assert!(token_b.is_cancelled());
        assert!(!token_other.is_cancelled());
    }

    #[test]
    fn stale_sweep_cancels_and_clears() {
        let registry: DownloadRegistry<Key> = DownloadRegistry::new();
        let token = registry.begin(key(1, "a"), 1, "a".to_string()).unwrap();

        assert_eq!(registry.sweep_stale(Duration::from_secs(600)), 0);
        assert_eq!(registry.sweep_stale(Duration::ZERO), 1);
        assert!(token.is_cancelled());
        assert_eq!(registry.active_count(), 0);
    }
}

mod pending_query_tests {
    use super::*;

    #[test]
    fn pending_query_is_consumed_once() {
        let state = AppState::new();
        state.set_pending_query(10, "daft punk".to_string());
        assert_eq!(state.take_pending_query(10).as_deref(), Some("daft punk"));
        assert!(state.take_pending_query(10).is_none());
    }

    #[test]
    fn all_platforms_are_registered() {
        let state = AppState::new();
        for kind in [
            SourceKind::Youtube,
            SourceKind::YoutubeMusic,
            SourceKind::Soundcloud,
            SourceKind::VkMusic,
            SourceKind::YandexMusic,
        ] {
            assert!(state.sources.resolve(kind).is_some(), "missing adapter for {}", kind);
        }
    }
}
