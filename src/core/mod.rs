//! Core utilities, configuration, and common functionality

pub mod config;
pub mod disk;
pub mod error;
pub mod logging;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_credentials_configuration};
pub use utils::escape_markdown_v2;
