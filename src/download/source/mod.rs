//! Multi-platform search and download abstraction layer.
//!
//! Provides the `PlatformSource` trait for implementing pluggable music
//! platforms and a `SourceRegistry` that routes a [`SourceKind`] to its
//! adapter. New platforms are added by implementing `PlatformSource` and
//! registering them in the registry.
//!
//! Built-in platforms:
//! - `YouTubeSource` — YouTube and YouTube Music via yt-dlp flat search
//! - `SoundCloudSource` — SoundCloud via yt-dlp `scsearch`
//! - `VkSource` — VK Music via the VK audio API (requires VK_TOKEN)
//! - `YandexSource` — Yandex Music via its public API (requires YANDEX_MUSIC_TOKEN)

pub mod soundcloud;
pub mod vk;
pub mod yandex;
pub mod youtube;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::AppResult;
use crate::download::progress::SourceProgress;

/// The music platforms the bot can search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Youtube,
    YoutubeMusic,
    Soundcloud,
    VkMusic,
    YandexMusic,
}

impl SourceKind {
    /// Human-readable name shown in messages and buttons.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Youtube => "YouTube",
            SourceKind::YoutubeMusic => "YouTube Music",
            SourceKind::Soundcloud => "SoundCloud",
            SourceKind::VkMusic => "VK Music",
            SourceKind::YandexMusic => "Yandex Music",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SourceKind::Youtube => "📺",
            SourceKind::YoutubeMusic => "🎵",
            SourceKind::Soundcloud => "☁️",
            SourceKind::VkMusic => "🎧",
            SourceKind::YandexMusic => "🎶",
        }
    }
}

/// A single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Platform-scoped stable identifier (video id, permalink slug, owner_audio id)
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    /// Duration in seconds, 0 when the platform did not report one
    pub duration_secs: u32,
    /// Quality label shown next to the track, e.g. "MP3 320kbps".
    /// Empty when the platform does not report one.
    pub quality: String,
    /// Source page or API URL used for the download step
    pub url: String,
    pub source: SourceKind,
}

impl Track {
    /// Display title in "Artist - Title" form when an artist is known.
    pub fn display_title(&self) -> String {
        match self.artist.as_deref().filter(|a| !a.is_empty()) {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }
}

/// Quality label for tracks that go through the audio re-encode step,
/// derived from the configured format and bitrate ("mp3" + "320k"
/// becomes "MP3 320kbps").
pub fn audio_quality_label() -> String {
    let bitrate = config::AUDIO_QUALITY
        .trim_end_matches("bps")
        .trim_end_matches('k');
    format!("{} {}kbps", config::AUDIO_FORMAT.to_uppercase(), bitrate)
}

/// Result of a platform search.
///
/// A platform that cannot search (missing credentials, upstream rejection)
/// reports that through `error_detail` with an empty track list rather than
/// an `Err`, so one broken platform never aborts the whole search flow.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub tracks: Vec<Track>,
    pub error_detail: Option<String>,
}

impl SearchOutcome {
    pub fn tracks(tracks: Vec<Track>) -> Self {
        Self { tracks, error_detail: None }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            tracks: Vec::new(),
            error_detail: Some(detail.into()),
        }
    }
}

/// Output from a successful download operation.
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    /// Actual file path of the downloaded file (may differ from requested path)
    pub file_path: String,
    /// File size in bytes
    pub file_size: u64,
    /// Duration in seconds (if known)
    pub duration_secs: Option<u32>,
}

/// Trait for music platform implementations.
///
/// Each platform supplies search and audio download. Downloads report
/// progress through the channel and stop promptly once `cancel` fires.
#[async_trait]
pub trait PlatformSource: Send + Sync {
    /// Which platform this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Search the platform, returning at most `limit` tracks.
    async fn search(&self, query: &str, limit: usize) -> AppResult<SearchOutcome>;

    /// Download a track's audio to `output_base` (a path without extension),
    /// sending progress updates through the channel.
    async fn download(
        &self,
        track: &Track,
        output_base: &str,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput>;
}

/// Registry that routes a [`SourceKind`] to its platform adapter.
pub struct SourceRegistry {
    sources: HashMap<SourceKind, Arc<dyn PlatformSource>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { sources: HashMap::new() }
    }

    /// Register a platform adapter, replacing any previous one for its kind.
    pub fn register(&mut self, source: Arc<dyn PlatformSource>) {
        self.sources.insert(source.kind(), source);
    }

    /// Find the adapter for the given platform.
    pub fn resolve(&self, kind: SourceKind) -> Option<Arc<dyn PlatformSource>> {
        self.sources.get(&kind).cloned()
    }

    /// Create the default registry with all built-in platforms.
    /// Credential-gated platforms are always registered; they report their
    /// own unavailability at search time.
    pub fn default_registry() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(youtube::YouTubeSource::youtube()));
        registry.register(Arc::new(youtube::YouTubeSource::youtube_music()));
        registry.register(Arc::new(soundcloud::SoundCloudSource::new()));
        registry.register(Arc::new(vk::VkSource::new()));
        registry.register(Arc::new(yandex::YandexSource::new()));
        registry
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}
