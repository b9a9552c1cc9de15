//! Download progress rendering and throttled message updates.
//!
//! Adapters emit [`SourceProgress`] values over an unbounded channel; a
//! forwarder task renders them into status-message edits, at most one edit
//! per fixed interval to respect Telegram's outbound rate limits.

use std::time::Instant;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::config;
use crate::core::utils::{escape_markdown_v2 as escape_markdown, format_file_size};

/// Progress information emitted during a download.
#[derive(Debug, Clone)]
pub struct SourceProgress {
    /// Download progress percentage (0-100)
    pub percent: u8,
    /// Download speed in bytes per second
    pub speed_bytes_sec: Option<f64>,
    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,
    /// Bytes downloaded so far
    pub downloaded_bytes: Option<u64>,
    /// Total bytes expected
    pub total_bytes: Option<u64>,
}

/// Download state for displaying progress to the user.
#[derive(Debug, Clone)]
pub enum DownloadStatus {
    /// Download is starting
    Starting { title: String, artist: Option<String> },
    /// Download in progress with a progress bar
    Downloading {
        title: String,
        artist: Option<String>,
        progress: SourceProgress,
    },
    /// Sending the file to the Telegram server
    Uploading { title: String },
    /// Final state
    Done { title: String },
}

impl DownloadStatus {
    /// Renders the formatted MarkdownV2 status message for the current state.
    pub fn to_message(&self) -> String {
        match self {
            DownloadStatus::Starting { title, artist } => {
                let mut s = format!("🎵 *{}*", escape_markdown(title));
                if let Some(a) = artist.as_deref().filter(|a| !a.is_empty()) {
                    s.push_str("\n👤 ");
                    s.push_str(&escape_markdown(a));
                }
                s.push_str("\n\n⏳ Starting download\\.\\.\\.");
                s
            }
            DownloadStatus::Downloading { title, artist, progress } => {
                let mut s = format!("🎵 *{}*", escape_markdown(title));
                if let Some(a) = artist.as_deref().filter(|a| !a.is_empty()) {
                    s.push_str("\n👤 ");
                    s.push_str(&escape_markdown(a));
                }
                s.push_str(&format!(
                    "\n\n📥 Downloading: {}%\n{}",
                    progress.percent,
                    create_progress_bar(progress.percent)
                ));
                if let Some(speed) = progress.speed_bytes_sec {
                    let mbs = speed / (1024.0 * 1024.0);
                    s.push_str(&format!("\n⚡ {}", escape_markdown(&format!("{:.1} MB/s", mbs))));
                }
                if let Some(eta) = progress.eta_seconds {
                    let rendered = if eta >= 60 {
                        format!("{} min {} sec", eta / 60, eta % 60)
                    } else {
                        format!("{} sec", eta)
                    };
                    s.push_str(&format!("\n⏱️ ETA: {}", escape_markdown(&rendered)));
                }
                if let (Some(current), Some(total)) = (progress.downloaded_bytes, progress.total_bytes) {
                    s.push_str(&format!(
                        "\n📦 {}",
                        escape_markdown(&format!("{} / {}", format_file_size(current), format_file_size(total)))
                    ));
                }
                s
            }
            DownloadStatus::Uploading { title } => {
                format!("🎵 *{}*\n\n📤 Sending file\\.\\.\\.", escape_markdown(title))
            }
            DownloadStatus::Done { title } => {
                format!("✅ *{}*\n\nDone\\!", escape_markdown(title))
            }
        }
    }
}

/// Renders a fixed-width ten-segment block-character progress bar.
fn create_progress_bar(progress: u8) -> String {
    let progress = progress.min(100);
    let filled = (progress / 10) as usize;
    let empty = 10 - filled;
    format!("\\[{}{}\\]", "▓".repeat(filled), "░".repeat(empty))
}

/// A status message that is edited in place as the download advances.
///
/// Edit failures caused by identical content ("message is not modified") are
/// tolerated silently; everything else is logged and dropped, since losing a
/// progress frame is harmless.
#[derive(Clone)]
pub struct ProgressMessage {
    chat_id: ChatId,
    message_id: MessageId,
}

impl ProgressMessage {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self { chat_id, message_id }
    }

    pub async fn update(&self, bot: &Bot, status: &DownloadStatus, keyboard: Option<InlineKeyboardMarkup>) {
        let text = status.to_message();
        let mut request = bot
            .edit_message_text(self.chat_id, self.message_id, text)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        if let Err(e) = request.await {
            let msg = e.to_string();
            if !msg.contains("message is not modified") {
                log::warn!("Failed to edit progress message: {}", e);
            }
        }
    }

    /// Replaces the status message with arbitrary pre-escaped MarkdownV2 text.
    pub async fn replace(&self, bot: &Bot, text: String, keyboard: Option<InlineKeyboardMarkup>) {
        let mut request = bot
            .edit_message_text(self.chat_id, self.message_id, text)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        if let Err(e) = request.await {
            let msg = e.to_string();
            if !msg.contains("message is not modified") {
                log::warn!("Failed to edit status message: {}", e);
            }
        }
    }
}

/// Spawns the task that drains a progress channel into message edits.
///
/// Forwarding is throttled to one edit per `config::progress::edit_interval()`.
/// The task ends when the sender side is dropped, so awaiting the handle after
/// the download finishes guarantees no late edit races with the final status.
pub fn spawn_progress_forwarder(
    bot: Bot,
    message: ProgressMessage,
    title: String,
    artist: Option<String>,
    mut rx: mpsc::UnboundedReceiver<SourceProgress>,
    cancel_keyboard: InlineKeyboardMarkup,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = config::progress::edit_interval();
        let mut last_edit: Option<Instant> = None;
        while let Some(progress) = rx.recv().await {
            if last_edit.is_some_and(|t| t.elapsed() < interval) {
                continue;
            }
            last_edit = Some(Instant::now());
            let status = DownloadStatus::Downloading {
                title: title.clone(),
                artist: artist.clone(),
                progress,
            };
            message.update(&bot, &status, Some(cancel_keyboard.clone())).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_progress_bar_bounds() {
        assert_eq!(create_progress_bar(0), "\\[░░░░░░░░░░\\]");
        assert_eq!(create_progress_bar(50), "\\[▓▓▓▓▓░░░░░\\]");
        assert_eq!(create_progress_bar(100), "\\[▓▓▓▓▓▓▓▓▓▓\\]");
        // Values above 100 are clamped
        assert_eq!(create_progress_bar(255), "\\[▓▓▓▓▓▓▓▓▓▓\\]");
    }

    #[test]
    fn test_create_progress_bar_rounding() {
        assert_eq!(create_progress_bar(9), "\\[░░░░░░░░░░\\]");
        assert_eq!(create_progress_bar(10), "\\[▓░░░░░░░░░\\]");
        assert_eq!(create_progress_bar(99), "\\[▓▓▓▓▓▓▓▓▓░\\]");
    }

    #[test]
    fn test_downloading_message_contains_bar_and_percent() {
        let status = DownloadStatus::Downloading {
            title: "Test Song".to_string(),
            artist: Some("Tester".to_string()),
            progress: SourceProgress {
                percent: 40,
                speed_bytes_sec: Some(2.0 * 1024.0 * 1024.0),
                eta_seconds: Some(75),
                downloaded_bytes: Some(4_000_000),
                total_bytes: Some(10_000_000),
            },
        };
        let text = status.to_message();
        assert!(text.contains("40%"));
        assert!(text.contains("▓▓▓▓░░░░░░"));
        assert!(text.contains("2\\.0 MB/s"));
        assert!(text.contains("1 min 15 sec"));
    }

    #[test]
    fn test_starting_message_escapes_title() {
        let status = DownloadStatus::Starting {
            title: "Song (Live)".to_string(),
            artist: None,
        };
        assert!(status.to_message().contains("Song \\(Live\\)"));
    }
}
