//! User-facing message templates, all MarkdownV2.

use crate::core::utils::{escape_markdown_v2 as escape, format_duration, format_file_size, format_view_count};
use crate::download::source::{SourceKind, Track};
use crate::download::video::{VideoInfo, VideoQuality};

pub const START_MESSAGE: &str = "🎵 *Music Search Bot*\n\n\
    Send me a track or artist name and I will find it on YouTube, \
    YouTube Music, SoundCloud, VK Music or Yandex Music\\.\n\n\
    You can also send a YouTube link to download the video\\.";

pub const HELP_MESSAGE: &str = "🆘 *How to use this bot*\n\n\
    1\\. Send a track or artist name\n\
    2\\. Pick a platform to search\n\
    3\\. Tap a result to download it as audio\n\n\
    *Other things I understand:*\n\
    • A YouTube link downloads the video with quality selection\n\
    • /upload\\_cookies updates the YouTube cookies file\n\n\
    Files up to 50 MB can be sent over the standard Bot API\\.";

pub const ABOUT_MESSAGE: &str = "ℹ️ *About*\n\n\
    Searches and downloads music from five platforms\\. \
    Audio is extracted to mp3 at the configured bitrate\\.";

pub const NEW_SEARCH_PROMPT: &str = "🎵 *Send a track or artist name*\n\n\
    Examples:\n\
    • Imagine Dragons Believer\n\
    • Coldplay\n\
    • The Beatles Yesterday\n\n\
    After sending a query, pick the platform to search\\.";

/// Prompt shown after a query arrives, above the platform keyboard.
pub fn source_prompt(query: &str) -> String {
    format!("🔍 *Pick a platform to search:*\n\nQuery: \"{}\"", escape(query))
}

pub fn searching_status(source: SourceKind) -> String {
    format!("{} Searching {}\\.\\.\\.", source.emoji(), escape(source.label()))
}

/// The search results listing for one page.
pub fn search_results_message(tracks: &[Track], source: SourceKind, query: &str, page: usize, total_pages: usize) -> String {
    let mut message = format!(
        "{} *{}* \\| Results for: \"{}\"\n\n",
        source.emoji(),
        escape(source.label()),
        escape(query)
    );

    if tracks.is_empty() {
        message.push_str("😔 Nothing found\\. Try another query\\.");
        return message;
    }

    for (i, track) in tracks.iter().enumerate() {
        let mut title = track.display_title();
        if title.chars().count() > 40 {
            title = format!("{}...", title.chars().take(37).collect::<String>());
        }
        message.push_str(&format!(
            "{}\\. *{}*\n   ⏱️ {}",
            i + 1,
            escape(&title),
            escape(&format_duration(track.duration_secs))
        ));
        if !track.quality.is_empty() {
            message.push_str(&format!(" \\| 🎧 {}", escape(&track.quality)));
        }
        message.push_str("\n\n");
    }

    if total_pages > 1 {
        message.push_str(&format!("📄 Page {} of {}", page + 1, total_pages));
    }

    message
}

/// The video info card shown above the quality keyboard.
pub fn video_info_message(info: &VideoInfo) -> String {
    format!(
        "🎬 *{}*\n\n📺 Channel: {}\n⏱ Duration: {}\n👁 Views: {}\n\nPick a quality to download:",
        escape(&info.title),
        escape(&info.channel),
        escape(&format_duration(info.duration_secs)),
        escape(&format_view_count(info.view_count))
    )
}

pub fn video_downloading_status(title: &str, quality: VideoQuality) -> String {
    format!(
        "⏳ *Downloading video\\.\\.\\.*\n\n🎬 {}\n📊 Quality: {}\n\nThis can take a while\\.",
        escape(title),
        escape(quality.label())
    )
}

pub fn video_done_message(title: &str, quality: VideoQuality, file_size: u64) -> String {
    format!(
        "✅ *Done\\!*\n\n🎬 {}\n📊 Quality: {}\n📁 Size: {}",
        escape(title),
        escape(quality.label()),
        escape(&format_file_size(file_size))
    )
}

/// Error template categories mirrored in keyboards and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    DownloadFailed,
    Network,
    FileTooLarge,
    Auth,
    Unknown,
}

/// Renders an error template, optionally with a detail line.
pub fn error_message(kind: ErrorKind, details: Option<&str>) -> String {
    let mut message = match kind {
        ErrorKind::NotFound => {
            "😔 *Nothing found*\n\nTry changing the query or picking another platform\\.".to_string()
        }
        ErrorKind::DownloadFailed => "❌ *Download failed*".to_string(),
        ErrorKind::Network => {
            "🌐 *Connection problem*\n\nCheck your network connection and try again later\\.".to_string()
        }
        ErrorKind::FileTooLarge => {
            "📁 *File too large*\n\nThe file exceeds the size limit\\. Try another track or a lower quality\\.".to_string()
        }
        ErrorKind::Auth => "🔑 *Platform not available*".to_string(),
        ErrorKind::Unknown => "❓ *Unknown error*".to_string(),
    };

    if let Some(details) = details {
        message.push_str(&format!("\n\n_Details: {}_", escape(details)));
    }

    message
}

pub const STALE_RESULTS_MESSAGE: &str = "❌ Search results have expired\\. Run a new search\\.";
pub const CANCELLED_MESSAGE: &str = "❌ *Download cancelled*";
pub const NO_ACTIVE_DOWNLOADS_MESSAGE: &str = "ℹ️ No active downloads to cancel\\.";
