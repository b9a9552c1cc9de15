//! Inline keyboards and the callback-data codec behind them.
//!
//! Callback data is limited to 64 bytes by Telegram, so every token here is
//! kept short and queries embedded in page tokens are already length-capped
//! on input.

use std::str::FromStr;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::utils::{format_duration, truncate_label};
use crate::download::source::{SourceKind, Track};
use crate::download::video::{VideoInfo, VideoQuality};

/// A decoded callback token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `source_<kind>`: the user picked a platform for a pending query.
    PickSource(SourceKind),
    /// `download::<source>::<track_id>`: start a track download.
    Download { source: SourceKind, track_id: String },
    /// `page::<source>::<page>::<query>`: switch to another results page.
    Page { source: SourceKind, page: usize, query: String },
    /// `video::<quality>::<video_id>`: start a video download.
    Video { quality: VideoQuality, video_id: String },
    /// `video::cancel`: dismiss a video quality prompt.
    VideoCancel,
    /// `cancel_download`: cancel active downloads in this chat.
    CancelDownload,
    /// `new_search`: prompt for a fresh query.
    NewSearch,
    /// `start_search`: same prompt, from the start screen.
    StartSearch,
    Help,
    /// `noop`: inert label buttons like the page indicator.
    Noop,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::PickSource(kind) => format!("source_{}", kind),
            Self::Download { source, track_id } => format!("download::{}::{}", source, track_id),
            Self::Page { source, page, query } => format!("page::{}::{}::{}", source, page, query),
            Self::Video { quality, video_id } => format!("video::{}::{}", quality.key(), video_id),
            Self::VideoCancel => "video::cancel".to_string(),
            Self::CancelDownload => "cancel_download".to_string(),
            Self::NewSearch => "new_search".to_string(),
            Self::StartSearch => "start_search".to_string(),
            Self::Help => "help".to_string(),
            Self::Noop => "noop".to_string(),
        }
    }

    /// Parses callback data. Returns `None` for anything malformed so stale
    /// or foreign buttons are silently ignored.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "video::cancel" => return Some(Self::VideoCancel),
            "cancel_download" => return Some(Self::CancelDownload),
            "new_search" => return Some(Self::NewSearch),
            "start_search" => return Some(Self::StartSearch),
            "help" => return Some(Self::Help),
            "noop" => return Some(Self::Noop),
            _ => {}
        }

        if let Some(kind) = data.strip_prefix("source_") {
            return SourceKind::from_str(kind).ok().map(Self::PickSource);
        }

        if let Some(rest) = data.strip_prefix("download::") {
            let (source, track_id) = rest.split_once("::")?;
            let source = SourceKind::from_str(source).ok()?;
            if track_id.is_empty() {
                return None;
            }
            return Some(Self::Download { source, track_id: track_id.to_string() });
        }

        if let Some(rest) = data.strip_prefix("page::") {
            let mut parts = rest.splitn(3, "::");
            let source = SourceKind::from_str(parts.next()?).ok()?;
            let page = parts.next()?.parse().ok()?;
            let query = parts.next()?.to_string();
            return Some(Self::Page { source, page, query });
        }

        if let Some(rest) = data.strip_prefix("video::") {
            let (quality, video_id) = rest.split_once("::")?;
            let quality = VideoQuality::parse(quality)?;
            if video_id.is_empty() {
                return None;
            }
            return Some(Self::Video { quality, video_id: video_id.to_string() });
        }

        None
    }
}

/// Platform picker shown after the user sends a query.
pub fn source_keyboard() -> InlineKeyboardMarkup {
    let button = |kind: SourceKind| {
        InlineKeyboardButton::callback(
            format!("{} {}", kind.emoji(), kind.label()),
            CallbackAction::PickSource(kind).encode(),
        )
    };

    InlineKeyboardMarkup::new(vec![
        vec![button(SourceKind::Youtube), button(SourceKind::YoutubeMusic)],
        vec![button(SourceKind::VkMusic), button(SourceKind::YandexMusic)],
        vec![button(SourceKind::Soundcloud)],
    ])
}

/// Numbered result buttons plus navigation for one results page.
pub fn results_keyboard(
    tracks: &[Track],
    source: SourceKind,
    query: &str,
    page: usize,
    total_pages: usize,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::with_capacity(tracks.len() + 2);

    for (i, track) in tracks.iter().enumerate() {
        let mut label = format!("{}. {}", i + 1, truncate_label(&track.display_title(), 35));
        if track.duration_secs > 0 {
            label.push_str(&format!(" | ⏱️ {}", format_duration(track.duration_secs)));
        }
        if !track.quality.is_empty() {
            label.push_str(&format!(" | 🎧 {}", track.quality));
        }
        rows.push(vec![InlineKeyboardButton::callback(
            label,
            CallbackAction::Download { source, track_id: track.id.clone() }.encode(),
        )]);
    }

    if total_pages > 1 {
        let mut nav = Vec::with_capacity(3);
        if page > 0 {
            nav.push(InlineKeyboardButton::callback(
                "⬅️",
                CallbackAction::Page { source, page: page - 1, query: query.to_string() }.encode(),
            ));
        }
        nav.push(InlineKeyboardButton::callback(
            format!("📄 {}/{}", page + 1, total_pages),
            CallbackAction::Noop.encode(),
        ));
        if page + 1 < total_pages {
            nav.push(InlineKeyboardButton::callback(
                "➡️",
                CallbackAction::Page { source, page: page + 1, query: query.to_string() }.encode(),
            ));
        }
        rows.push(nav);
    }

    rows.push(vec![InlineKeyboardButton::callback(
        "🔍 New search",
        CallbackAction::NewSearch.encode(),
    )]);

    InlineKeyboardMarkup::new(rows)
}

/// Single-button keyboard on the start screen.
pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🔍 Start searching",
        CallbackAction::StartSearch.encode(),
    )]])
}

/// Cancel button attached to progress messages.
pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        CallbackAction::CancelDownload.encode(),
    )]])
}

/// Retry/help keyboard attached to error messages.
pub fn error_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🔍 New search",
            CallbackAction::NewSearch.encode(),
        )],
        vec![InlineKeyboardButton::callback("🆘 Help", CallbackAction::Help.encode())],
    ])
}

/// One button per quality the video actually offers, plus a cancel row.
pub fn video_quality_keyboard(info: &VideoInfo) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = VideoQuality::ALL
        .into_iter()
        .filter(|q| info.available_qualities.contains(q))
        .map(|q| {
            vec![InlineKeyboardButton::callback(
                format!("📊 {}", q.label()),
                CallbackAction::Video { quality: q, video_id: info.id.clone() }.encode(),
            )]
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        CallbackAction::VideoCancel.encode(),
    )]);

    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_callback_round_trips() {
        let actions = [
            CallbackAction::PickSource(SourceKind::YandexMusic),
            CallbackAction::Download { source: SourceKind::VkMusic, track_id: "123_456".to_string() },
            CallbackAction::Page { source: SourceKind::Youtube, page: 2, query: "some query".to_string() },
            CallbackAction::Video { quality: VideoQuality::P720, video_id: "dQw4w9WgXcQ".to_string() },
            CallbackAction::VideoCancel,
            CallbackAction::CancelDownload,
            CallbackAction::NewSearch,
            CallbackAction::StartSearch,
            CallbackAction::Help,
            CallbackAction::Noop,
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("download::youtube"), None);
        assert_eq!(CallbackAction::parse("download::nope::id"), None);
        assert_eq!(CallbackAction::parse("download::youtube::"), None);
        assert_eq!(CallbackAction::parse("page::youtube::x::q"), None);
        assert_eq!(CallbackAction::parse("video::999p::abc"), None);
        assert_eq!(CallbackAction::parse("source_spotify"), None);
    }

    #[test]
    fn test_page_query_may_contain_spaces() {
        let action = CallbackAction::Page {
            source: SourceKind::Soundcloud,
            page: 0,
            query: "imagine dragons believer".to_string(),
        };
        assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
    }

    fn track(id: &str, title: &str, duration: u32) -> Track {
        Track {
            id: id.to_string(),
            title: title.to_string(),
            artist: None,
            duration_secs: duration,
            quality: "MP3 320kbps".to_string(),
            url: "https://example.com".to_string(),
            source: SourceKind::Youtube,
        }
    }

    #[test]
    fn test_results_keyboard_layout() {
        let tracks = vec![track("a", "One", 60), track("b", "Two", 0)];
        let kb = results_keyboard(&tracks, SourceKind::Youtube, "q", 1, 3);
        // two result rows, one nav row, one new-search row
        assert_eq!(kb.inline_keyboard.len(), 4);
        assert_eq!(kb.inline_keyboard[2].len(), 3);
        assert!(kb.inline_keyboard[0][0].text.contains("1. One"));
        assert!(kb.inline_keyboard[0][0].text.contains("1:00"));
        assert!(kb.inline_keyboard[0][0].text.contains("🎧 MP3 320kbps"));
        assert!(!kb.inline_keyboard[1][0].text.contains("⏱️"));
    }

    #[test]
    fn test_nav_row_edges() {
        let tracks = vec![track("a", "One", 60)];
        let first = results_keyboard(&tracks, SourceKind::Youtube, "q", 0, 2);
        assert_eq!(first.inline_keyboard[1].len(), 2);
        let last = results_keyboard(&tracks, SourceKind::Youtube, "q", 1, 2);
        assert_eq!(last.inline_keyboard[1].len(), 2);
    }

    #[test]
    fn test_single_page_has_no_nav_row() {
        let tracks = vec![track("a", "One", 60)];
        let kb = results_keyboard(&tracks, SourceKind::Youtube, "q", 0, 1);
        assert_eq!(kb.inline_keyboard.len(), 2);
    }

    #[test]
    fn test_source_keyboard_rows() {
        let kb = source_keyboard();
        assert_eq!(kb.inline_keyboard.len(), 3);
        assert_eq!(kb.inline_keyboard[0].len(), 2);
        assert_eq!(kb.inline_keyboard[2].len(), 1);
    }
}
