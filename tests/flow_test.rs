//! Integration tests for the user-facing surface: callback codec, keyboard
//! layout and message templates.
//!
//! Run with: cargo test --test flow_test

use tunegrab::download::source::{SourceKind, Track};
use tunegrab::download::video::{VideoInfo, VideoQuality};
use tunegrab::telegram::format;
use tunegrab::telegram::keyboard::{self, CallbackAction};

fn track(id: &str, title: &str, artist: Option<&str>, duration: u32) -> Track {
    Track {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.map(|a| a.to_string()),
        duration_secs: duration,
        quality: "MP3 320kbps".to_string(),
        url: format!("https://example.com/{}", id),
        source: SourceKind::Youtube,
    }
}

fn video() -> VideoInfo {
    VideoInfo {
        id: "dQw4w9WgXcQ".to_string(),
        title: "Never Gonna Give You Up".to_string(),
        channel: "Rick Astley".to_string(),
        duration_secs: 213,
        view_count: 1_400_000_000,
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        available_qualities: vec![VideoQuality::P360, VideoQuality::P720, VideoQuality::Best],
        is_short: false,
    }
}

mod callback_tests {
    use super::*;

    #[test]
    fn every_action_survives_a_round_trip() {
        let actions = [
            CallbackAction::PickSource(SourceKind::VkMusic),
            CallbackAction::Download { source: SourceKind::YandexMusic, track_id: "38634572".to_string() },
            CallbackAction::Page { source: SourceKind::Soundcloud, page: 4, query: "boards of canada".to_string() },
            CallbackAction::Video { quality: VideoQuality::P1080, video_id: "dQw4w9WgXcQ".to_string() },
            CallbackAction::VideoCancel,
            CallbackAction::CancelDownload,
            CallbackAction::NewSearch,
            CallbackAction::Noop,
        ];
        for action in actions {
            let encoded = action.encode();
            assert_eq!(CallbackAction::parse(&encoded), Some(action), "token was {}", encoded);
        }
    }

    #[test]
    fn short_tokens_stay_under_the_telegram_limit() {
        // Telegram rejects callback data above 64 bytes
        let download = CallbackAction::Download {
            source: SourceKind::YandexMusic,
            track_id: "123456789_123456789".to_string(),
        }
        .encode();
        assert!(download.len() <= 64, "token too long: {}", download);

        let video = CallbackAction::Video {
            quality: VideoQuality::P1080,
            video_id: "dQw4w9WgXcQ".to_string(),
        }
        .encode();
        assert!(video.len() <= 64, "token too long: {}", video);
    }

    #[test]
    fn foreign_or_stale_tokens_parse_to_none() {
        for bad in ["", "mode:video", "download::", "page::youtube::two::q", "source_"] {
            assert_eq!(CallbackAction::parse(bad), None, "accepted {:?}", bad);
        }
    }
}

mod keyboard_tests {
    use super::*;

    #[test]
    fn results_keyboard_matches_page_contents() {
        let tracks: Vec<Track> = (0..10)
            .map(|i| track(&i.to_string(), &format!("Song {}", i), Some("Band"), 200))
            .collect();
        let kb = keyboard::results_keyboard(&tracks, SourceKind::Youtube, "band songs", 1, 3);

        // 10 track rows + nav row + new-search row
        assert_eq!(kb.inline_keyboard.len(), 12);

        // nav row has prev, indicator, next on a middle page
        let nav = &kb.inline_keyboard[10];
        assert_eq!(nav.len(), 3);
        assert!(nav[1].text.contains("2/3"));
    }

    #[test]
    fn quality_keyboard_offers_only_available_rungs() {
        let kb = keyboard::video_quality_keyboard(&video());
        // 3 qualities + cancel row
        assert_eq!(kb.inline_keyboard.len(), 4);
        let labels: Vec<&str> = kb.inline_keyboard.iter().map(|row| row[0].text.as_str()).collect();
        assert!(labels.iter().any(|l| l.contains("360p")));
        assert!(labels.iter().any(|l| l.contains("720p")));
        assert!(!labels.iter().any(|l| l.contains("1080p")));
    }
}

mod template_tests {
    use super::*;

    #[test]
    fn results_message_lists_and_paginates() {
        let tracks = vec![
            track("a", "Roygbiv", Some("Boards of Canada"), 148),
            track("b", "Dayvan Cowboy", Some("Boards of Canada"), 300),
        ];
        let msg = format::search_results_message(&tracks, SourceKind::Youtube, "boc", 0, 2);
        assert!(msg.contains("Roygbiv"));
        assert!(msg.contains("2:28"));
        assert!(msg.contains("Page 1 of 2"));
    }

    #[test]
    fn video_card_contains_metadata() {
        let msg = format::video_info_message(&video());
        assert!(msg.contains("Never Gonna Give You Up"));
        assert!(msg.contains("Rick Astley"));
        assert!(msg.contains("3:33"));
        assert!(msg.contains("1\\.4"), "view count should be compact: {}", msg);
    }

    #[test]
    fn error_templates_escape_details() {
        let msg = format::error_message(format::ErrorKind::DownloadFailed, Some("exit code 1 (network)"));
        assert!(msg.contains("exit code 1 \\(network\\)"));
    }
}
