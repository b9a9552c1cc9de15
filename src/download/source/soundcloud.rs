//! SoundCloud adapter, powered by yt-dlp's `scsearch` extractor.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::error::{AppError, AppResult};
use crate::download::progress::SourceProgress;
use crate::download::source::{audio_quality_label, DownloadOutput, PlatformSource, SearchOutcome, SourceKind, Track};
use crate::download::ytdlp;

pub struct SoundCloudSource;

impl Default for SoundCloudSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundCloudSource {
    pub fn new() -> Self {
        Self
    }

    /// Derives a stable track id from a permalink URL, joining the last two
    /// path segments ("artist/track-slug" becomes "artist_track-slug").
    fn id_from_url(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
        if segments.len() >= 2 {
            Some(format!("{}_{}", segments[segments.len() - 2], segments[segments.len() - 1]))
        } else {
            segments.last().map(|s| s.to_string())
        }
    }

    fn track_from_entry(entry: &serde_json::Value) -> Option<Track> {
        let url = entry
            .get("url")
            .or_else(|| entry.get("webpage_url"))
            .and_then(|u| u.as_str())?
            .to_string();
        let id = entry
            .get("id")
            .and_then(|i| i.as_str())
            .map(|i| i.to_string())
            .or_else(|| Self::id_from_url(&url))?;
        let title = entry
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("Unknown")
            .to_string();
        let artist = entry
            .get("uploader")
            .and_then(|u| u.as_str())
            .filter(|u| !u.is_empty())
            .map(|u| u.to_string());
        let duration_secs = entry
            .get("duration")
            .and_then(|d| d.as_f64())
            .map(|d| d as u32)
            .unwrap_or(0);

        Some(Track {
            id,
            title,
            artist,
            duration_secs,
            quality: audio_quality_label(),
            url,
            source: SourceKind::Soundcloud,
        })
    }
}

#[async_trait]
impl PlatformSource for SoundCloudSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Soundcloud
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<SearchOutcome> {
        let spec = format!("scsearch{}:{}", limit, query);
        let entries = match ytdlp::search_flat(spec, Vec::new()).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("SoundCloud search failed for '{}': {}", query, e);
                return Ok(SearchOutcome::unavailable(e.to_string()));
            }
        };

        let tracks: Vec<Track> = entries.iter().filter_map(Self::track_from_entry).take(limit).collect();

        log::info!("soundcloud: {} results for '{}'", tracks.len(), query);
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
            .map_err(|e| AppError::Download(format!("Task join error: {}", e)))??;

        let file_path = ytdlp::find_actual_downloaded_file(&base)?;
        let file_size = std::fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);

        Ok(DownloadOutput {
            file_path,
            file_size,
            duration_secs: Some(track.duration_secs).filter(|&d| d > 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_from_url() {
        assert_eq!(
            SoundCloudSource::id_from_url("https://soundcloud.com/artist/track-slug").as_deref(),
            Some("artist_track-slug")
        );
        assert_eq!(
            SoundCloudSource::id_from_url("https://soundcloud.com/only").as_deref(),
            Some("only")
        );
        assert!(SoundCloudSource::id_from_url("not a url").is_none());
    }

    #[test]
    fn test_track_from_entry() {
        let entry = json!({
            "url": "https://soundcloud.com/bonobo/kerala",
            "title": "Kerala",
            "uploader": "Bonobo",
            "duration": 238.5
        });
        let track = SoundCloudSource::track_from_entry(&entry).unwrap();
        assert_eq!(track.id, "bonobo_kerala");
        assert_eq!(track.artist.as_deref(), Some("Bonobo"));
        assert_eq!(track.duration_secs, 238);
        assert_eq!(track.source, SourceKind::Soundcloud);
    }

    #[test]
    fn test_track_from_entry_prefers_native_id() {
        let entry = json!({
            "id": "123456",
            "url": "https://soundcloud.com/a/b",
            "title": "T"
        });
        assert_eq!(SoundCloudSource::track_from_entry(&entry).unwrap().id, "123456");
    }

    #[test]
    fn test_track_from_entry_no_url_rejected() {
        let entry = json!({ "title": "orphan" });
        assert!(SoundCloudSource::track_from_entry(&entry).is_none());
    }
}
