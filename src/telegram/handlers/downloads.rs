//! Track download lifecycle: single-flight guard, progress edits, sending
//! the audio, and guaranteed scratch-file cleanup.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode};
use tokio::sync::mpsc;

use super::search::callback_location;
use super::types::{HandlerDeps, HandlerError};
use crate::core::{config, disk, error::AppError, utils};
use crate::download::progress::{spawn_progress_forwarder, DownloadStatus, ProgressMessage};
use crate::download::source::{SourceKind, Track};
use crate::telegram::{format, keyboard};

/// Entry point for a `download::<source>::<track_id>` callback.
pub async fn handle_download(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    source: SourceKind,
    track_id: &str,
) -> Result<(), HandlerError> {
    let (Some(chat_id), Some(message_id)) = callback_location(q) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let Some(track) = find_cached_track(deps, chat_id.0, source, track_id) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        bot.send_message(chat_id, format::STALE_RESULTS_MESSAGE)
            .parse_mode(ParseMode::MarkdownV2)
            .reply_markup(keyboard::error_keyboard())
            .await?;
        return Ok(());
    };

    let key = (chat_id.0, source, track_id.to_string());
    let cancel = match deps
        .state
        .track_downloads
        .begin(key.clone(), chat_id.0, track.display_title())
    {
        Ok(token) => token,
        Err(active) => {
            bot.answer_callback_query(q.id.clone())
                .text(format!("⏳ Already downloading: {}", active.title))
                .await?;
            return Ok(());
        }
    };

    let _ = bot.answer_callback_query(q.id.clone()).await;

    // Progress replaces the results listing in place.
    let status = DownloadStatus::Starting {
        title: track.title.clone(),
        artist: track.artist.clone(),
    };
    let progress_message = ProgressMessage::new(chat_id, message_id);
    progress_message
        .update(bot, &status, Some(keyboard::cancel_keyboard()))
        .await;

    let bot = bot.clone();
    let deps = deps.clone();
    tokio::spawn(async move {
        let result = download_and_send_track(&bot, &deps, chat_id, &progress_message, &track, cancel).await;
        deps.state.track_downloads.finish(&key);

        match result {
            Ok(()) => {}
            Err(e) => {
                log::error!("Track download failed for chat {}: {}", chat_id, e);
                let (kind, detail) = classify_error(&e);
                progress_message
                    .replace(
                        &bot,
                        format::error_message(kind, detail.as_deref()),
                        Some(keyboard::error_keyboard()),
                    )
                    .await;
            }
        }
    });

    Ok(())
}

fn find_cached_track(deps: &HandlerDeps, chat_id: i64, source: SourceKind, track_id: &str) -> Option<Track> {
    // Callback data carries only source and track id; the cache is keyed by
    // query, so scan the chat's entries for that source.
    deps.state.search_cache.find_track_for_chat(chat_id, source, track_id)
}

/// Runs the download to completion and sends the audio file.
///
/// The scratch file is removed on every exit path after the send attempt.
async fn download_and_send_track(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    progress_message: &ProgressMessage,
    track: &Track,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<(), AppError> {
    let adapter = deps
        .state
        .sources
        .resolve(track.source)
        .ok_or_else(|| AppError::Download(format!("No adapter for {}", track.source)))?;

    let _ = bot.send_chat_action(chat_id, ChatAction::RecordVoice).await;

    let dir = disk::ensure_download_dir()?;
    let output_base = dir.join(utils::escape_filename(&format!("{}_{}", track.source, track.id)));
    let output_base = output_base
        .to_str()
        .ok_or_else(|| AppError::Download("Non-UTF8 scratch path".to_string()))?
        .to_string();

    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder = spawn_progress_forwarder(
        bot.clone(),
        progress_message.clone(),
        track.title.clone(),
        track.artist.clone(),
        rx,
        keyboard::cancel_keyboard(),
    );

    let download_result = adapter.download(track, &output_base, tx, cancel.clone()).await;
    let _ = forwarder.await;

    if cancel.is_cancelled() {
        // A killed downloader leaves `<base>.<ext>.part` behind
        disk::remove_stem_files_best_effort(Path::new(&output_base));
        progress_message
            .replace(bot, format::CANCELLED_MESSAGE.to_string(), Some(keyboard::error_keyboard()))
            .await;
        return Ok(());
    }

    let output = match download_result {
        Ok(output) => output,
        Err(e) => {
            disk::remove_stem_files_best_effort(Path::new(&output_base));
            return Err(e);
        }
    };
    let file_path = Path::new(&output.file_path);

    if output.file_size > config::validation::max_file_size_bytes() {
        disk::remove_file_best_effort(file_path);
        return Err(AppError::Validation(format!(
            "file is {}",
            utils::format_file_size(output.file_size)
        )));
    }

    let key = (chat_id.0, track.source, track.id.clone());
    deps.state.track_downloads.set_uploading(&key);

    progress_message
        .update(bot, &DownloadStatus::Uploading { title: track.title.clone() }, None)
        .await;
    let _ = bot.send_chat_action(chat_id, ChatAction::UploadVoice).await;

    let mut request = bot
        .send_audio(chat_id, InputFile::file(file_path.to_path_buf()))
        .title(track.title.clone());
    if let Some(artist) = track.artist.as_deref().filter(|a| !a.is_empty()) {
        request = request.performer(artist.to_string());
    }
    if let Some(duration) = output.duration_secs.or(Some(track.duration_secs)).filter(|&d| d > 0) {
        request = request.duration(duration);
    }
    let send_result = request.await;

    disk::remove_file_best_effort(file_path);
    send_result?;

    progress_message
        .update(bot, &DownloadStatus::Done { title: track.title.clone() }, None)
        .await;
    Ok(())
}

/// `cancel_download` callback: stops everything in flight for this chat.
pub async fn handle_cancel_download(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(chat_id), _) = callback_location(q) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let cancelled =
        deps.state.track_downloads.cancel_all_for_chat(chat_id.0) + deps.state.video_downloads.cancel_all_for_chat(chat_id.0);

    if cancelled > 0 {
        bot.answer_callback_query(q.id.clone()).text("❌ Cancelling...").await?;
        log::info!("Cancelled {} download(s) for chat {}", cancelled, chat_id);
    } else {
        bot.answer_callback_query(q.id.clone()).await?;
        bot.send_message(chat_id, format::NO_ACTIVE_DOWNLOADS_MESSAGE)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
    }
    Ok(())
}

fn classify_error(e: &AppError) -> (format::ErrorKind, Option<String>) {
    match e {
        AppError::Auth(detail) => (format::ErrorKind::Auth, Some(detail.clone())),
        AppError::Validation(detail) => (format::ErrorKind::FileTooLarge, Some(detail.clone())),
        AppError::Http(_) => (format::ErrorKind::Network, None),
        AppError::Download(detail) => (format::ErrorKind::DownloadFailed, Some(detail.clone())),
        _ => (format::ErrorKind::Unknown, None),
    }
}
