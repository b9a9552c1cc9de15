//! YouTube video flow: link probing, quality selection, video download.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode};
use tokio::sync::mpsc;

use super::search::callback_location;
use super::types::{HandlerDeps, HandlerError};
use crate::core::{config, disk, error::AppError, utils};
use crate::download::progress::{spawn_progress_forwarder, DownloadStatus, ProgressMessage};
use crate::download::video::{self, VideoInfo, VideoQuality};
use crate::telegram::{format, keyboard};

/// Receives a message containing a YouTube link and offers quality options.
pub async fn handle_video_url(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else { return Ok(()) };
    let Some(video_id) = video::extract_video_id(text) else {
        return Ok(());
    };

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let info = match deps.state.video_cache.get(&video_id) {
        Some(cached) => cached,
        None => {
            let probing = bot
                .send_message(msg.chat.id, "🔍 Checking the video\\.\\.\\.")
                .parse_mode(ParseMode::MarkdownV2)
                .await?;

            match video::probe_video(text.trim()).await {
                Ok(info) => {
                    deps.state.video_cache.put(info.clone());
                    let _ = bot.delete_message(msg.chat.id, probing.id).await;
                    info
                }
                Err(e) => {
                    log::error!("Video probe failed for {}: {}", video_id, e);
                    bot.edit_message_text(
                        msg.chat.id,
                        probing.id,
                        format::error_message(format::ErrorKind::DownloadFailed, Some("could not read video metadata")),
                    )
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(keyboard::error_keyboard())
                    .await?;
                    return Ok(());
                }
            }
        }
    };

    bot.send_message(msg.chat.id, format::video_info_message(&info))
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(keyboard::video_quality_keyboard(&info))
        .await?;
    Ok(())
}

/// Entry point for a `video::<quality>::<id>` callback.
pub async fn handle_video_quality(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    quality: VideoQuality,
    video_id: &str,
) -> Result<(), HandlerError> {
    let (Some(chat_id), Some(message_id)) = callback_location(q) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let Some(info) = deps.state.video_cache.get(video_id) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        bot.edit_message_text(chat_id, message_id, "❌ Video info has expired\\. Send the link again\\.")
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        return Ok(());
    };

    let key = (chat_id.0, video_id.to_string());
    let cancel = match deps.state.video_downloads.begin(key.clone(), chat_id.0, info.title.clone()) {
        Ok(token) => token,
        Err(active) => {
            bot.answer_callback_query(q.id.clone())
                .text(format!("⏳ Already downloading: {}", active.title))
                .await?;
            return Ok(());
        }
    };

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let _ = bot
        .edit_message_text(chat_id, message_id, format::video_downloading_status(&info.title, quality))
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(keyboard::cancel_keyboard())
        .await;

    let progress_message = ProgressMessage::new(chat_id, message_id);
    let bot = bot.clone();
    let deps = deps.clone();
    tokio::spawn(async move {
        let result = download_and_send_video(&bot, chat_id, &progress_message, &info, quality, cancel).await;
        deps.state.video_downloads.finish(&key);

        if let Err(e) = result {
            log::error!("Video download failed for chat {}: {}", chat_id, e);
            let (kind, detail) = match &e {
                AppError::Validation(detail) => (format::ErrorKind::FileTooLarge, Some(detail.clone())),
                AppError::Http(_) => (format::ErrorKind::Network, None),
                AppError::Download(detail) => (format::ErrorKind::DownloadFailed, Some(detail.clone())),
                _ => (format::ErrorKind::Unknown, None),
            };
            progress_message
                .replace(
                    &bot,
                    format::error_message(kind, detail.as_deref()),
                    Some(keyboard::error_keyboard()),
                )
                .await;
        }
    });

    Ok(())
}

async fn download_and_send_video(
    bot: &Bot,
    chat_id: ChatId,
    progress_message: &ProgressMessage,
    info: &VideoInfo,
    quality: VideoQuality,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<(), AppError> {
    let _ = bot.send_chat_action(chat_id, ChatAction::RecordVideo).await;

    let output_dir = disk::ensure_download_dir()?;
    let output_dir = output_dir
        .to_str()
        .ok_or_else(|| AppError::Download("Non-UTF8 download folder".to_string()))?
        .to_string();

    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder = spawn_progress_forwarder(
        bot.clone(),
        progress_message.clone(),
        info.title.clone(),
        None,
        rx,
        keyboard::cancel_keyboard(),
    );

    let download_result = video::download_video(info, quality, &output_dir, tx, cancel.clone()).await;
    let _ = forwarder.await;

    let scratch_path = video::video_output_path(&output_dir, &info.id);

    if cancel.is_cancelled() {
        // A killed downloader leaves `.part` and fragment files behind
        disk::remove_stem_files_best_effort(Path::new(&scratch_path));
        progress_message
            .replace(bot, format::CANCELLED_MESSAGE.to_string(), Some(keyboard::error_keyboard()))
            .await;
        return Ok(());
    }

    let output = match download_result {
        Ok(output) => output,
        Err(e) => {
            disk::remove_stem_files_best_effort(Path::new(&scratch_path));
            return Err(e);
        }
    };
    let file_path = Path::new(&output.file_path);

    if output.file_size > config::validation::max_file_size_bytes() {
        disk::remove_file_best_effort(file_path);
        return Err(AppError::Validation(format!(
            "video is {}",
            utils::format_file_size(output.file_size)
        )));
    }

    progress_message
        .update(bot, &DownloadStatus::Uploading { title: info.title.clone() }, None)
        .await;
    let _ = bot.send_chat_action(chat_id, ChatAction::UploadVideo).await;

    let mut request = bot
        .send_video(chat_id, InputFile::file(file_path.to_path_buf()))
        .caption(format!("🎬 {}", info.title))
        .supports_streaming(true);
    if let Some(duration) = output.duration_secs.filter(|&d| d > 0) {
        request = request.duration(duration);
    }
    let send_result = request.await;

    disk::remove_file_best_effort(file_path);
    send_result?;

    progress_message
        .replace(bot, format::video_done_message(&info.title, quality, output.file_size), None)
        .await;
    Ok(())
}

/// `video::cancel` dismisses the quality prompt.
pub async fn handle_video_cancel(bot: &Bot, q: &CallbackQuery) -> Result<(), HandlerError> {
    let _ = bot.answer_callback_query(q.id.clone()).await;
    if let (Some(chat_id), Some(message_id)) = callback_location(q) {
        bot.edit_message_text(chat_id, message_id, "❌ Video download cancelled\\.")
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
    }
    Ok(())
}
