//! Yandex Music adapter, backed by the public Yandex Music API.
//!
//! Requires a YANDEX_MUSIC_TOKEN OAuth token. The download path is the
//! classic two-step scheme: fetch download-info for a track, then build a
//! signed direct URL from the host/path/ts/s fields.

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

const API_BASE: &str = "https://api.music.yandex.net";
const SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    results: Vec<YandexTrack>,
}

#[derive(Debug, Deserialize)]
struct YandexTrack {
    id: serde_json::Value,
    title: String,
    #[serde(default)]
    artists: Vec<YandexArtist>,
    /// Duration in milliseconds
    #[serde(default, rename = "durationMs")]
    duration_ms: u64,
    #[serde(default)]
    available: bool,
}

#[derive(Debug, Deserialize)]
struct YandexArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DownloadInfoResponse {
    result: Vec<DownloadInfo>,
}

#[derive(Debug, Deserialize)]
struct DownloadInfo {
    codec: String,
    #[serde(rename = "bitrateInKbps")]
    bitrate_in_kbps: u32,
    #[serde(rename = "downloadInfoUrl")]
    download_info_url: String,
}

#[derive(Debug, Deserialize)]
struct DirectLinkInfo {
    host: String,
    path: String,
    ts: String,
    s: String,
}

pub struct YandexSource {
    client: Client,
}

impl Default for YandexSource {
    fn default() -> Self {
        Self::new()
    }
}

impl YandexSource {
    pub fn new() -> Self {
        Self {
            client: http::build_client().unwrap_or_default(),
        }
    }

    fn track_from_result(yt: &YandexTrack) -> Option<Track> {
        // id arrives as either a number or a string depending on the endpoint
        let id = match &yt.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let artist = yt
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Some(Track {
            url: format!("https://music.yandex.ru/track/{}", id),
            id,
            title: yt.title.clone(),
            artist: Some(artist).filter(|a| !a.is_empty()),
            duration_secs: (yt.duration_ms / 1000) as u32,
            quality: audio_quality_label(),
            source: SourceKind::YandexMusic,
        })
    }

    /// Builds the signed direct URL from a download-info descriptor.
    fn build_direct_link(info: &DirectLinkInfo) -> String {
        let path_tail = info.path.strip_prefix('/').unwrap_or(&info.path);
        let sign_input = format!("{}{}{}", SIGN_SALT, path_tail, info.s);
        let sign = format!("{:x}", md5::compute(sign_input.as_bytes()));
        format!("https://{}/get-mp3/{}/{}{}", info.host, sign, info.ts, info.path)
    }

    async fn resolve_direct_url(&self, token: &str, track_id: &str) -> AppResult<String> {
        let response = self
            .client
            .get(format!("{}/tracks/{}/download-info", API_BASE, track_id))
            .header("Authorization", format!("OAuth {}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "Yandex download-info returned HTTP {}",
                response.status()
            )));
        }

        let body: DownloadInfoResponse = response.json().await?;
        let best = body
            .result
            .iter()
            .filter(|i| i.codec == "mp3")
            .max_by_key(|i| i.bitrate_in_kbps)
            .ok_or_else(|| AppError::Download("No mp3 download info available".to_string()))?;

        let info_url = format!("{}&format=json", best.download_info_url);
        let link_info: DirectLinkInfo = self
            .client
            .get(&info_url)
            .header("Authorization", format!("OAuth {}", token))
            .send()
            .await?
            .json()
            .await?;

        Ok(Self::build_direct_link(&link_info))
    }
}

#[async_trait]
impl PlatformSource for YandexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YandexMusic
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<SearchOutcome> {
        let Some(token) = config::YANDEX_MUSIC_TOKEN.as_deref() else {
            return Ok(SearchOutcome::unavailable(
                "Yandex Music requires a YANDEX_MUSIC_TOKEN",
            ));
        };

        let response = self
            .client
            .get(format!("{}/search", API_BASE))
            .header("Authorization", format!("OAuth {}", token))
            .query(&[("text", query), ("type", "track"), ("page", "0")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            log::warn!("Yandex search returned HTTP {} for '{}'", status, query);
            return Ok(SearchOutcome::unavailable(format!(
                "Yandex API returned HTTP {}",
                status
            )));
        }

        let body: SearchResponse = response.json().await?;
        let results = body
            .result
            .and_then(|r| r.tracks)
            .map(|t| t.results)
            .unwrap_or_default();

        let tracks: Vec<Track> = results
            .iter()
            .filter(|t| t.available)
            .filter_map(Self::track_from_result)
            .take(limit)
            .collect();

        log::info!("yandex_music: {} results for '{}'", tracks.len(), query);
        Ok(SearchOutcome::tracks(tracks))
    }

    async fn download(
        &self,
        track: &Track,
        output_base: &str,
        progress_tx: mpsc::UnboundedSender<SourceProgress>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        let token = config::YANDEX_MUSIC_TOKEN
            .as_deref()
            .ok_or_else(|| AppError::Auth("Yandex Music requires a YANDEX_MUSIC_TOKEN".to_string()))?;

        let direct_url = self.resolve_direct_url(token, &track.id).await?;

        let output_path = format!("{}.{}", output_base, config::AUDIO_FORMAT.as_str());
        let file_size = http::stream_to_file(&self.client, &direct_url, &output_path, &progress_tx, &cancel).await?;

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
    use serde_json::json;

    #[test]
    fn test_track_from_result_numeric_id() {
        let yt: YandexTrack = serde_json::from_value(json!({
            "id": 12345,
            "title": "Intro",
            "artists": [{"name": "Artist A"}, {"name": "Artist B"}],
            "durationMs": 215000,
            "available": true
        }))
        .unwrap();
        let track = YandexSource::track_from_result(&yt).unwrap();
        assert_eq!(track.id, "12345");
        assert_eq!(track.artist.as_deref(), Some("Artist A, Artist B"));
        assert_eq!(track.duration_secs, 215);
        assert_eq!(track.url, "https://music.yandex.ru/track/12345");
    }

    #[test]
    fn test_track_from_result_string_id() {
        let yt: YandexTrack = serde_json::from_value(json!({
            "id": "678",
            "title": "T",
            "available": true
        }))
        .unwrap();
        let track = YandexSource::track_from_result(&yt).unwrap();
        assert_eq!(track.id, "678");
        assert!(track.artist.is_none());
    }

    #[tokio::test]
    async fn test_search_without_token_reports_unavailable() {
        if config::YANDEX_MUSIC_TOKEN.is_some() {
            return;
        }
        let outcome = YandexSource::new().search("intro", 5).await.unwrap();
        assert!(outcome.tracks.is_empty());
        let detail = outcome.error_detail.unwrap();
        assert!(detail.contains("YANDEX_MUSIC_TOKEN"), "detail was {}", detail);
    }

    #[test]
    fn test_build_direct_link_shape() {
        let info = DirectLinkInfo {
            host: "s123.storage.yandex.net".to_string(),
            path: "/getfile/audio/track.mp3".to_string(),
            ts: "5f3a".to_string(),
            s: "abcdef".to_string(),
        };
        let link = YandexSource::build_direct_link(&info);
        assert!(link.starts_with("https://s123.storage.yandex.net/get-mp3/"));
        assert!(link.ends_with("/5f3a/getfile/audio/track.mp3"));
        // md5 hex digest is 32 chars
        let sign = link
            .trim_start_matches("https://s123.storage.yandex.net/get-mp3/")
            .split('/')
            .next()
            .unwrap();
        assert_eq!(sign.len(), 32);
    }

    #[test]
    fn test_download_info_picks_best_mp3() {
        let body: DownloadInfoResponse = serde_json::from_value(json!({
            "result": [
                {"codec": "aac", "bitrateInKbps": 320, "downloadInfoUrl": "https://a"},
                {"codec": "mp3", "bitrateInKbps": 192, "downloadInfoUrl": "https://b"},
                {"codec": "mp3", "bitrateInKbps": 320, "downloadInfoUrl": "https://c"}
            ]
        }))
        .unwrap();
        let best = body
            .result
            .iter()
            .filter(|i| i.codec == "mp3")
            .max_by_key(|i| i.bitrate_in_kbps)
            .unwrap();
        assert_eq!(best.download_info_url, "https://c");
    }
}
