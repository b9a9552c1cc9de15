//! YouTube video flow: link detection, metadata probing and quality-selected
//! downloads.

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::error::{AppError, AppResult};
use crate::download::progress::SourceProgress;
use crate::download::source::DownloadOutput;
use crate::download::ytdlp;

static YOUTUBE_URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})",
        r"(?:https?://)?(?:www\.)?youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
        r"(?:https?://)?youtu\.be/([a-zA-Z0-9_-]{11})",
        r"(?:https?://)?(?:www\.)?youtube\.com/embed/([a-zA-Z0-9_-]{11})",
        r"(?:https?://)?(?:m\.)?youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| unreachable!("invalid video URL pattern: {e}")))
    .collect()
});

/// Extracts the 11-character video id from any recognised YouTube URL form.
pub fn extract_video_id(text: &str) -> Option<String> {
    for pattern in YOUTUBE_URL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(id) = caps.get(1) {
                return Some(id.as_str().to_string());
            }
        }
    }
    None
}

pub fn is_youtube_url(text: &str) -> bool {
    extract_video_id(text).is_some()
}

/// Selectable video qualities, each mapping to a yt-dlp format expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoQuality {
    P360,
    P480,
    P720,
    P1080,
    Best,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 5] = [
        VideoQuality::P360,
        VideoQuality::P480,
        VideoQuality::P720,
        VideoQuality::P1080,
        VideoQuality::Best,
    ];

    /// Token used in callback data.
    pub fn key(&self) -> &'static str {
        match self {
            VideoQuality::P360 => "360p",
            VideoQuality::P480 => "480p",
            VideoQuality::P720 => "720p",
            VideoQuality::P1080 => "1080p",
            VideoQuality::Best => "best",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "360p" => Some(VideoQuality::P360),
            "480p" => Some(VideoQuality::P480),
            "720p" => Some(VideoQuality::P720),
            "1080p" => Some(VideoQuality::P1080),
            "best" => Some(VideoQuality::Best),
            _ => None,
        }
    }

    /// Button label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            VideoQuality::P360 => "360p (SD)",
            VideoQuality::P480 => "480p (SD)",
            VideoQuality::P720 => "720p (HD)",
            VideoQuality::P1080 => "1080p (Full HD)",
            VideoQuality::Best => "Best Quality",
        }
    }

    /// yt-dlp format expression for the quality.
    pub fn format_spec(&self) -> &'static str {
        match self {
            VideoQuality::P360 => "bestvideo[height<=360]+bestaudio/best[height<=360]",
            VideoQuality::P480 => "bestvideo[height<=480]+bestaudio/best[height<=480]",
            VideoQuality::P720 => "bestvideo[height<=720]+bestaudio/best[height<=720]",
            VideoQuality::P1080 => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
            VideoQuality::Best => "bestvideo+bestaudio/best",
        }
    }

    fn target_height(&self) -> Option<u32> {
        match self {
            VideoQuality::P360 => Some(360),
            VideoQuality::P480 => Some(480),
            VideoQuality::P720 => Some(720),
            VideoQuality::P1080 => Some(1080),
            VideoQuality::Best => None,
        }
    }
}

/// Probed metadata for a YouTube video.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub duration_secs: u32,
    pub view_count: u64,
    pub url: String,
    pub available_qualities: Vec<VideoQuality>,
    pub is_short: bool,
}

/// Probes a video and works out which quality rungs its formats can serve.
pub async fn probe_video(url: &str) -> AppResult<VideoInfo> {
    let info = ytdlp::probe_json(url.to_string()).await?;

    let id = info
        .get("id")
        .and_then(|i| i.as_str())
        .map(|i| i.to_string())
        .or_else(|| extract_video_id(url))
        .ok_or_else(|| AppError::Download(format!("No video id in metadata for {}", url)))?;
    let title = info
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let channel = info
        .get("uploader")
        .or_else(|| info.get("channel"))
        .and_then(|c| c.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let duration_secs = info
        .get("duration")
        .and_then(|d| d.as_f64())
        .map(|d| d as u32)
        .unwrap_or(0);
    let view_count = info.get("view_count").and_then(|v| v.as_u64()).unwrap_or(0);

    let heights: Vec<u32> = info
        .get("formats")
        .and_then(|f| f.as_array())
        .map(|formats| {
            formats
                .iter()
                .filter_map(|f| f.get("height").and_then(|h| h.as_u64()))
                .map(|h| h as u32)
                .collect()
        })
        .unwrap_or_default();

    Ok(VideoInfo {
        is_short: url.contains("/shorts/") || (duration_secs > 0 && duration_secs <= 60),
        available_qualities: available_qualities(&heights),
        id,
        title,
        channel,
        duration_secs,
        view_count,
        url: url.to_string(),
    })
}

/// A quality rung is offered when any format reaches its height or above.
/// "Best" is always offered.
fn available_qualities(heights: &[u32]) -> Vec<VideoQuality> {
    let mut available: Vec<VideoQuality> = VideoQuality::ALL
        .iter()
        .filter(|q| {
            q.target_height()
                .map(|target| heights.iter().any(|&h| h >= target))
                .unwrap_or(false)
        })
        .copied()
        .collect();
    available.push(VideoQuality::Best);
    available
}

/// Deterministic scratch path for a video download, shared with the cleanup
/// that removes partials after a cancel or failure.
pub fn video_output_path(output_dir: &str, video_id: &str) -> String {
    format!("{}/{}.mp4", output_dir.trim_end_matches('/'), video_id)
}

/// Downloads the video as mp4 at the requested quality.
///
/// Output lands at `<dir>/<video id>.mp4`, deterministic so a leaked partial
/// from a cancelled run is overwritten rather than accumulated.
pub async fn download_video(
    info: &VideoInfo,
    quality: VideoQuality,
    output_dir: &str,
    progress_tx: mpsc::UnboundedSender<SourceProgress>,
    cancel: CancellationToken,
) -> AppResult<DownloadOutput> {
    let output_path = video_output_path(output_dir, &info.id);

    let mut args: Vec<String> = vec![
        "-o".to_string(),
        output_path.clone(),
        "--newline".to_string(),
        "--force-overwrites".to_string(),
        "--no-playlist".to_string(),
        "--socket-timeout".to_string(),
        "60".to_string(),
        "--format".to_string(),
        quality.format_spec().to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--retries".to_string(),
        "10".to_string(),
        "--fragment-retries".to_string(),
        "10".to_string(),
    ];
    ytdlp::append_cookies_args(&mut args);

    let url = info.url.clone();
    let handle = tokio::task::spawn_blocking(move || -> AppResult<()> {
        ytdlp::run_download_blocking(&args, &url, &progress_tx, &cancel)
    });
    handle
        .await
        .map_err(|e| AppError::Download(format!("Task join error: {}", e)))??;

    let file_size = std::fs::metadata(&output_path)
        .map(|m| m.len())
        .map_err(|_| AppError::Download(format!("Downloaded video not found: {}", output_path)))?;

    Ok(DownloadOutput {
        file_path: output_path,
        file_size,
        duration_secs: Some(info.duration_secs).filter(|&d| d > 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_video_id_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_extract_video_id_short_forms() {
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/abc123DEF45").as_deref(),
            Some("abc123DEF45")
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/watch?v=abc123DEF45").as_deref(),
            Some("abc123DEF45")
        );
        assert_eq!(
            extract_video_id("www.youtube.com/embed/abc123DEF45").as_deref(),
            Some("abc123DEF45")
        );
    }

    #[test]
    fn test_extract_video_id_rejects_non_youtube() {
        assert!(extract_video_id("https://vimeo.com/12345").is_none());
        assert!(extract_video_id("just some text").is_none());
        assert!(!is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn test_quality_round_trip() {
        for q in VideoQuality::ALL {
            assert_eq!(VideoQuality::parse(q.key()), Some(q));
        }
        assert_eq!(VideoQuality::parse("144p"), None);
    }

    #[test]
    fn test_available_qualities_from_heights() {
        // 720 source: 360/480/720 rungs plus best
        let q = available_qualities(&[360, 480, 720]);
        assert_eq!(
            q,
            vec![VideoQuality::P360, VideoQuality::P480, VideoQuality::P720, VideoQuality::Best]
        );

        // Nothing reported: only best
        assert_eq!(available_qualities(&[]), vec![VideoQuality::Best]);

        // 1080 source serves every rung
        let q = available_qualities(&[1080]);
        assert_eq!(q.len(), 5);
    }
}
