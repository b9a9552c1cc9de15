//! Best-effort string heuristics shared by the platform adapters.
//!
//! The artist split is a documented heuristic, not a contract: uploader
//! titles follow no standard, so a fixed pattern chain is tried in order and
//! the first sane match wins. It will misparse some titles.

use once_cell::sync::Lazy;
use regex::Regex;

/// Patterns tried in order against a raw title, first match wins.
/// Group 1 is the artist candidate, group 2 the remaining title.
static ARTIST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^([^-]+)\s*-\s*(.+)$",  // "Artist - Title"
        r"^([^–]+)\s*–\s*(.+)$",  // "Artist – Title" (en dash)
        r"^([^|]+)\s*\|\s*(.+)$", // "Artist | Title"
        r"^([^:]+):\s*(.+)$",     // "Artist: Title"
    ]
    .iter()
    .map(|p| Regex::new(p).expect("artist pattern is valid"))
    .collect()
});

/// Words that mark a prefix as channel noise rather than an artist name.
const NOISE_WORDS: &[&str] = &["official", "video", "lyrics", "audio"];

/// Tries to extract an artist name from a raw video/track title.
///
/// Returns `None` when no pattern matches or the candidate fails the sanity
/// filter (too long, or contains channel-noise words); callers then fall back
/// to the uploader/channel name.
pub fn extract_artist_from_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    for pattern in ARTIST_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(trimmed) {
            let artist = caps.get(1)?.as_str().trim();
            let lowered = artist.to_lowercase();
            if artist.chars().count() < 50 && !NOISE_WORDS.iter().any(|w| lowered.contains(w)) {
                return Some(artist.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_artist_dash() {
        assert_eq!(extract_artist_from_title("Queen - Bohemian Rhapsody"), Some("Queen".to_string()));
    }

    #[test]
    fn test_extract_artist_en_dash() {
        assert_eq!(extract_artist_from_title("Muse – Uprising"), Some("Muse".to_string()));
    }

    #[test]
    fn test_extract_artist_pipe_and_colon() {
        assert_eq!(extract_artist_from_title("Adele | Hello"), Some("Adele".to_string()));
        assert_eq!(extract_artist_from_title("Eminem: Stan"), Some("Eminem".to_string()));
    }

    #[test]
    fn test_extract_artist_noise_word_rejected() {
        // "Official Video - ..." is channel noise, not an artist
        assert_eq!(extract_artist_from_title("Official Video - Some Song"), None);
        assert_eq!(extract_artist_from_title("Lyrics - Some Song"), None);
    }

    #[test]
    fn test_extract_artist_too_long_rejected() {
        let long_prefix = "x".repeat(60);
        assert_eq!(extract_artist_from_title(&format!("{} - Title", long_prefix)), None);
    }

    #[test]
    fn test_extract_artist_no_separator() {
        assert_eq!(extract_artist_from_title("Plain title without separators"), None);
    }
}
