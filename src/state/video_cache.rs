//! Short-lived cache of probed video metadata.
//!
//! A probe costs a yt-dlp round trip, so the info card and the subsequent
//! quality selection share one entry keyed by video id.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::download::video::VideoInfo;

const DEFAULT_TTL: Duration = Duration::from_secs(1800);

struct CachedInfo {
    info: VideoInfo,
    inserted_at: Instant,
}

pub struct VideoInfoCache {
    inner: Mutex<HashMap<String, CachedInfo>>,
    ttl: Duration,
}

impl VideoInfoCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn put(&self, info: VideoInfo) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.insert(
            info.id.clone(),
            CachedInfo {
                info,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, video_id: &str) -> Option<VideoInfo> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .get(video_id)
            .filter(|c| c.inserted_at.elapsed() <= self.ttl)
            .map(|c| c.info.clone())
    }

    /// Drops expired entries; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.len();
        inner.retain(|_, c| c.inserted_at.elapsed() <= self.ttl);
        before - inner.len()
    }
}

impl Default for VideoInfoCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::video::VideoQuality;

    fn info(id: &str) -> VideoInfo {
        VideoInfo {
            id: id.to_string(),
            title: "Video".to_string(),
            channel: "Channel".to_string(),
            duration_secs: 120,
            view_count: 1000,
            url: format!("https://www.youtube.com/watch?v={}", id),
            available_qualities: vec![VideoQuality::Best],
            is_short: false,
        }
    }

    #[test]
    fn test_put_get() {
        let cache = VideoInfoCache::new();
        cache.put(info("abc"));
        assert_eq!(cache.get("abc").unwrap().title, "Video");
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_expired_entry_not_returned() {
        let cache = VideoInfoCache::with_ttl(Duration::ZERO);
        cache.put(info("abc"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("abc").is_none());
        assert_eq!(cache.sweep_expired(), 1);
    }
}
