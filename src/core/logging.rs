//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Credential configuration validation and logging at startup

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs credential configuration at application startup
///
/// Validates and logs:
/// - YTDL_COOKIES_FILE existence and path (YouTube downloads degrade without it)
/// - VK_TOKEN / YANDEX_MUSIC_TOKEN presence (adapters report auth errors without them)
pub fn log_credentials_configuration() {
    log::info!("Credentials configuration check:");

    let cookies_file = config::YTDL_COOKIES_FILE.as_str();
    let cookies_path = shellexpand::tilde(cookies_file).to_string();
    if std::path::Path::new(&cookies_path).exists() {
        log::info!("YTDL_COOKIES_FILE: {} (found)", cookies_path);
    } else {
        log::warn!(
            "YTDL_COOKIES_FILE: {} (not found) - YouTube downloads may fail on bot protection",
            cookies_path
        );
    }

    match config::VK_TOKEN.as_deref() {
        Some(_) => log::info!("VK_TOKEN: configured"),
        None => log::warn!("VK_TOKEN: not set - VK Music searches will report an auth error"),
    }

    match config::YANDEX_MUSIC_TOKEN.as_deref() {
        Some(_) => log::info!("YANDEX_MUSIC_TOKEN: configured"),
        None => log::warn!("YANDEX_MUSIC_TOKEN: not set - Yandex Music searches will report an auth error"),
    }
}

/// Returns the expanded cookies file path if the file actually exists.
pub fn existing_cookies_file() -> Option<String> {
    let expanded = shellexpand::tilde(config::YTDL_COOKIES_FILE.as_str()).to_string();
    std::path::Path::new(&expanded).exists().then_some(expanded)
}
