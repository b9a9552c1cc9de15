//! YouTube and YouTube Music adapters, both powered by yt-dlp.
//!
//! One struct serves both platforms; the music variant steers the extractor
//! at the music catalogue via the `web_music` player client and deduplicates
//! video ids, since music searches often return the same recording under
//! several playlist entries.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::error::AppResult;
use crate::download::parse::extract_artist_from_title;
use crate::download::progress::SourceProgress;
use crate::download::source::{audio_quality_label, DownloadOutput, PlatformSource, SearchOutcome, SourceKind, Track};
use crate::download::ytdlp;

pub struct YouTubeSource {
    kind: SourceKind,
}

impl YouTubeSource {
    pub fn youtube() -> Self {
        Self { kind: SourceKind::Youtube }
    }

    pub fn youtube_music() -> Self {
        Self {
            kind: SourceKind::YoutubeMusic,
        }
    }

    fn track_from_entry(&self, entry: &serde_json::Value) -> Option<Track> {
        let id = entry.get("id")?.as_str()?.to_string();
        let title = entry
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("Unknown")
            .to_string();
        let duration_secs = entry
            .get("duration")
            .and_then(|d| d.as_f64())
            .map(|d| d as u32)
            .unwrap_or(0);

        // Flat listings rarely carry a separate artist field; fall back to
        // splitting it out of the title.
        let artist = entry
            .get("uploader")
            .or_else(|| entry.get("channel"))
            .and_then(|u| u.as_str())
            .map(|u| u.trim_end_matches(" - Topic").to_string())
            .or_else(|| extract_artist_from_title(&title));

        let url = match self.kind {
            SourceKind::YoutubeMusic => format!("https://music.youtube.com/watch?v={}", id),
            _ => format!("https://www.youtube.com/watch?v={}", id),
        };

        Some(Track {
            id,
            title,
            artist,
            duration_secs,
            quality: audio_quality_label(),
            url,
            source: self.kind,
        })
    }
}

#[async_trait]
impl PlatformSource for YouTubeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<SearchOutcome> {
        let spec = format!("ytsearch{}:{}", limit, query);
        let extra_args = match self.kind {
            SourceKind::YoutubeMusic => vec![
                "--extractor-args".to_string(),
                "youtube:player_client=web_music".to_string(),
            ],
            _ => Vec::new(),
        };

        let entries = match ytdlp::search_flat(spec, extra_args).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("{} search failed for '{}': {}", self.kind, query, e);
                return Ok(SearchOutcome::unavailable(e.to_string()));
            }
        };

        let mut seen = HashSet::new();
        let mut tracks = Vec::new();
        for entry in &entries {
            if let Some(track) = self.track_from_entry(entry) {
                // Music searches surface the same recording repeatedly
                if seen.insert(track.id.clone()) {
                    tracks.push(track);
                }
            }
            if tracks.len() >= limit {
                break;
            }
        }

        log::info!("{}: {} results for '{}'", self.kind, tracks.len(), query);
        Ok(SearchOutcome::tracks(tracks))
    }

    async fn download(
        &self,
        track: &Track,
        output_base: &str,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        let args = ytdlp::build_audio_args(output_base, &[]);
        let url = track.url.clone();
        let base = output_base.to_string();

        let handle = tokio::task::spawn_blocking(move || -> AppResult<()> {
            ytdlp::run_download_blocking(&args, &url, &progress_tx, &cancel)
        });
        handle
            .await
            .map_err(|e| crate::core::error::AppError::Download(format!("Task join error: {}", e)))??;

        let file_path = ytdlp::find_actual_downloaded_file(&base)?;
        let file_size = std::fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);

        Ok(DownloadOutput {
            file_path,
            file_size,
            duration_secs: Some(track.duration_secs).filter(|&d| d > 0),
        })
    }
}
