//! VK Music adapter, backed by the VK audio API.
//!
//! Requires a VK_TOKEN with audio permissions. VK returns direct mp3 URLs,
//! so downloads bypass yt-dlp and stream straight over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::http;
use crate::download::progress::SourceProgress;
use crate::download::source::{audio_quality_label, DownloadOutput, PlatformSource, SearchOutcome, SourceKind, Track};

const API_BASE: &str = "https://api.vk.com/method";
const API_VERSION: &str = "5.131";

#[derive(Debug, Deserialize)]
struct VkResponse {
    response: Option<VkAudioList>,
    error: Option<VkError>,
}

#[derive(Debug, Deserialize)]
struct VkAudioList {
    items: Vec<VkAudio>,
}

#[derive(Debug, Deserialize)]
struct VkAudio {
    id: i64,
    owner_id: i64,
    artist: String,
    title: String,
    duration: u32,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct VkError {
    error_code: i64,
    error_msg: String,
}

pub struct VkSource {
    client: Client,
}

impl Default for VkSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VkSource {
    pub fn new() -> Self {
        Self {
            client: http::build_client().unwrap_or_default(),
        }
    }

    fn track_from_audio(audio: &VkAudio) -> Track {
        Track {
            id: format!("{}_{}", audio.owner_id, audio.id),
            title: audio.title.clone(),
            artist: Some(audio.artist.clone()).filter(|a| !a.is_empty()),
            duration_secs: audio.duration,
            quality: audio_quality_label(),
            url: audio.url.clone(),
            source: SourceKind::VkMusic,
        }
    }
}

#[async_trait]
impl PlatformSource for VkSource {
    fn kind(&self) -> SourceKind {
        SourceKind::VkMusic
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<SearchOutcome> {
        let Some(token) = config::VK_TOKEN.as_deref() else {
            return Ok(SearchOutcome::unavailable(
                "VK Music requires a VK_TOKEN with audio permissions",
            ));
        };

        let response = self
            .client
            .get(format!("{}/audio.search", API_BASE))
            .query(&[
                ("q", query),
                ("count", &limit.to_string()),
                ("access_token", token),
                ("v", API_VERSION),
            ])
            .send()
            .await?;

        let body: VkResponse = response.json().await?;

        if let Some(err) = body.error {
            log::warn!("VK audio.search error {}: {}", err.error_code, err.error_msg);
            return Ok(SearchOutcome::unavailable(format!(
                "VK API error {}: {}",
                err.error_code, err.error_msg
            )));
        }

        let items = body.response.map(|r| r.items).unwrap_or_default();
        let tracks: Vec<Track> = items
            .iter()
            // Region-locked or removed audios come back with an empty url
            .filter(|a| !a.url.is_empty())
            .map(Self::track_from_audio)
            .take(limit)
            .collect();

        log::info!("vk_music: {} results for '{}'", tracks.len(), query);
        Ok(SearchOutcome::tracks(tracks))
    }

    async fn download(
        &self,
        track: &Track,
        output_base: &str,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        if config::VK_TOKEN.is_none() {
            return Err(AppError::Auth(
                "VK Music requires a VK_TOKEN with audio permissions".to_string(),
            ));
        }
        if track.url.is_empty() {
            return Err(AppError::Download("VK track has no downloadable URL".to_string()));
        }

        let output_path = format!("{}.{}", output_base, config::AUDIO_FORMAT.as_str());
        let file_size = http::stream_to_file(&self.client, &track.url, &output_path, &progress_tx, &cancel).await?;

        Ok(DownloadOutput {
            file_path: output_path,
            file_size,
            duration_secs: Some(track.duration_secs).filter(|&d| d > 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_from_audio_composite_id() {
        let audio = VkAudio {
            id: 456239017,
            owner_id: -2001545048,
            artist: "Molchat Doma".to_string(),
            title: "Sudno".to_string(),
            duration: 141,
            url: "https://cs1.vkuseraudio.net/x.mp3".to_string(),
        };
        let track = VkSource::track_from_audio(&audio);
        assert_eq!(track.id, "-2001545048_456239017");
        assert_eq!(track.artist.as_deref(), Some("Molchat Doma"));
        assert_eq!(track.source, SourceKind::VkMusic);
    }

    #[tokio::test]
    async fn test_search_without_token_reports_unavailable() {
        if config::VK_TOKEN.is_some() {
            return;
        }
        let outcome = VkSource::new().search("molchat doma", 5).await.unwrap();
        assert!(outcome.tracks.is_empty());
        let detail = outcome.error_detail.unwrap();
        assert!(detail.contains("VK_TOKEN"), "detail was {}", detail);
    }

    #[test]
    fn test_vk_response_error_deserializes() {
        let json = r#"{"error":{"error_code":15,"error_msg":"Access denied"}}"#;
        let body: VkResponse = serde_json::from_str(json).unwrap();
        assert!(body.response.is_none());
        let err = body.error.unwrap();
        assert_eq!(err.error_code, 15);
        assert_eq!(err.error_msg, "Access denied");
    }

    #[test]
    fn test_vk_response_items_deserialize() {
        let json = r#"{"response":{"count":1,"items":[
            {"id":1,"owner_id":2,"artist":"A","title":"T","duration":60,"url":"https://x/y.mp3"}
        ]}}"#;
        let body: VkResponse = serde_json::from_str(json).unwrap();
        let items = body.response.unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].duration, 60);
    }
}
