//! Telegram bot that searches and downloads music from YouTube, YouTube
//! Music, SoundCloud, VK Music and Yandex Music, plus YouTube video
//! downloads with quality selection.
//!
//! Major pieces:
//! - [`download::source`]: one adapter per platform behind a common trait
//! - [`download::ytdlp`]: yt-dlp subprocess plumbing with progress parsing
//! - [`state`]: search sessions, active-download registries, video cache
//! - [`telegram`]: dispatcher schema, handlers, keyboards and templates

pub mod core;
pub mod download;
pub mod state;
pub mod telegram;
