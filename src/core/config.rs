use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot

/// Telegram bot token, read once at startup from BOT_TOKEN.
/// An empty token is a fatal startup error (checked in main).
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| env::var("BOT_TOKEN").unwrap_or_default());

/// Optional local Bot API server URL (BOT_API_URL).
/// When set to something other than api.telegram.org, large-file limits apply.
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Cached yt-dlp binary path.
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp".
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Path to cookies file for YouTube authentication.
/// Read from YTDL_COOKIES_FILE; this is also where an admin-uploaded
/// cookies document is persisted. Supports tilde (~) expansion.
pub static YTDL_COOKIES_FILE: Lazy<String> =
    Lazy::new(|| env::var("YTDL_COOKIES_FILE").unwrap_or_else(|_| "youtube_cookies.txt".to_string()));

/// VK API access token with audio permissions (VK_TOKEN).
/// Missing token disables the VK Music adapter with a descriptive error.
pub static VK_TOKEN: Lazy<Option<String>> = Lazy::new(|| env::var("VK_TOKEN").ok().filter(|t| !t.is_empty()));

/// Yandex Music OAuth token (YANDEX_MUSIC_TOKEN).
/// Missing token disables the Yandex Music adapter with a descriptive error.
pub static YANDEX_MUSIC_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| env::var("YANDEX_MUSIC_TOKEN").ok().filter(|t| !t.is_empty()));

/// Download scratch folder path.
/// Read from DOWNLOAD_FOLDER, defaults to ~/downloads/tunegrab.
/// Supports tilde (~) expansion for home directory.
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/downloads/tunegrab".to_string()));

/// Target audio format for extracted tracks (AUDIO_FORMAT, default mp3).
pub static AUDIO_FORMAT: Lazy<String> = Lazy::new(|| env::var("AUDIO_FORMAT").unwrap_or_else(|_| "mp3".to_string()));

/// Target audio bitrate (AUDIO_QUALITY, default 320k).
pub static AUDIO_QUALITY: Lazy<String> = Lazy::new(|| env::var("AUDIO_QUALITY").unwrap_or_else(|_| "320k".to_string()));

/// Search configuration
pub mod search {
    use super::{env, Lazy};

    /// Results shown per page (MAX_RESULTS_PER_PAGE env, default 10).
    pub static PAGE_SIZE: Lazy<usize> = Lazy::new(|| {
        env::var("MAX_RESULTS_PER_PAGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(10)
    });

    /// Maximum results requested from an adapter per search.
    pub const MAX_RESULTS: usize = 50;

    /// Query length bounds enforced before any adapter is called.
    pub const MIN_QUERY_LEN: usize = 2;
    pub const MAX_QUERY_LEN: usize = 100;
}

/// Session cache configuration
pub mod cache {
    use super::Duration;

    /// Entry-count ceiling; past it the oldest half is evicted.
    pub const MAX_ENTRIES: usize = 1000;

    /// Entries older than this are dropped by the periodic sweep.
    pub const MAX_AGE_SECS: u64 = 3600;

    /// Interval between periodic cache sweeps (30 minutes).
    pub const SWEEP_INTERVAL_SECS: u64 = 1800;

    pub fn max_age() -> Duration {
        Duration::from_secs(MAX_AGE_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for yt-dlp commands (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 300; // 5 minutes

    /// Timeout for direct HTTP transfers (VK / Yandex mp3 URLs).
    pub const HTTP_TIMEOUT_SECS: u64 = 300;

    /// Download registry entries older than this are swept as leaked.
    pub const STALE_AFTER_SECS: u64 = 600; // 10 minutes

    /// Interval between stale-download sweeps.
    pub const SWEEP_INTERVAL_SECS: u64 = 1800;

    /// Scratch files older than this are deleted by the periodic sweep.
    pub const FILE_MAX_AGE_SECS: u64 = 3600;

    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    pub fn http_timeout() -> Duration {
        Duration::from_secs(HTTP_TIMEOUT_SECS)
    }

    pub fn stale_after() -> Duration {
        Duration::from_secs(STALE_AFTER_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Network configuration for the bot's own HTTP client
pub mod network {
    use super::Duration;

    /// Request timeout for the Telegram client. Uploads of large audio files
    /// over slow links can take a while, so this is generous.
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn request_timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Progress message configuration
pub mod progress {
    use super::Duration;

    /// Minimum interval between progress message edits.
    /// Telegram rate-limits message edits, so forwarding is throttled.
    pub const EDIT_INTERVAL_SECS: u64 = 3;

    pub fn edit_interval() -> Duration {
        Duration::from_secs(EDIT_INTERVAL_SECS)
    }
}

/// Validation configuration
pub mod validation {
    /// Maximum file size for the standard Telegram Bot API (50 MB).
    pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

    /// Maximum file size for sent media.
    ///
    /// Standard Telegram Bot API (api.telegram.org): 50 MB.
    /// Local Bot API server: up to 2 GB.
    /// If BOT_API_URL is set and not pointing at api.telegram.org, assume a
    /// local server is used.
    pub fn max_file_size_bytes() -> u64 {
        if let Some(api_url) = super::BOT_API_URL.as_deref() {
            if !api_url.contains("api.telegram.org") {
                log::info!("Local Bot API server detected (BOT_API_URL={}), using 2 GB limit", api_url);
                return 2 * 1024 * 1024 * 1024;
            }
        }
        MAX_FILE_SIZE_BYTES
    }
}

/// Log file path (LOG_FILE env, default tunegrab.log in the working directory).
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE").unwrap_or_else(|_| "tunegrab.log".to_string()));
