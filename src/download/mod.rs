//! Search and download engine: yt-dlp plumbing, platform adapters,
//! direct HTTP transfers, videos and progress reporting.

pub mod http;
pub mod parse;
pub mod progress;
pub mod source;
pub mod video;
pub mod ytdlp;

pub use progress::{DownloadStatus, ProgressMessage, SourceProgress};
pub use source::{DownloadOutput, PlatformSource, SearchOutcome, SourceKind, SourceRegistry, Track};
