//! Dispatcher schema and handler chain builders.

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{
    handle_about_command, handle_help_command, handle_start_command, handle_upload_cookies_command,
};
use super::types::{HandlerDeps, HandlerError};
use super::{downloads, search, uploads, videos};
use crate::download::video::is_youtube_url;
use crate::telegram::bot::Command;
use crate::telegram::keyboard::CallbackAction;

/// Builds the full handler tree for the dispatcher.
///
/// The same tree is used in production and in tests. Branch order matters:
/// commands and documents are claimed before the plain-text fallback.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_video = deps.clone();
    let deps_text = deps.clone();
    let deps_callback = deps.clone();

    dptree::entry()
        .branch(command_handler())
        .branch(document_handler())
        .branch(video_url_handler(deps_video))
        .branch(text_handler(deps_text))
        .branch(callback_handler(deps_callback))
}

fn command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| async move {
            log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);
            match cmd {
                Command::Start => handle_start_command(&bot, &msg).await?,
                Command::Help => handle_help_command(&bot, &msg).await?,
                Command::About => handle_about_command(&bot, &msg).await?,
                Command::UploadCookies => handle_upload_cookies_command(&bot, &msg).await?,
            }
            Ok(())
        },
    ))
}

fn document_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| uploads::is_cookies_document(&msg))
        .endpoint(move |bot: Bot, msg: Message| async move { uploads::handle_cookies_document(&bot, &msg).await })
}

fn video_url_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(is_youtube_url).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { videos::handle_video_url(&bot, &msg, &deps).await }
        })
}

fn text_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|t| !t.starts_with('/')).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { search::handle_text_query(&bot, &msg, &deps).await }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let Some(data) = q.data.as_deref() else {
                let _ = bot.answer_callback_query(q.id.clone()).await;
                return Ok(());
            };

            let Some(action) = CallbackAction::parse(data) else {
                log::warn!("Unrecognized callback data: {}", data);
                let _ = bot.answer_callback_query(q.id.clone()).await;
                return Ok(());
            };

            match action {
                CallbackAction::PickSource(source) => search::handle_pick_source(&bot, &q, &deps, source).await,
                CallbackAction::Page { source, page, query } => {
                    search::handle_page(&bot, &q, &deps, source, page, &query).await
                }
                CallbackAction::Download { source, track_id } => {
                    downloads::handle_download(&bot, &q, &deps, source, &track_id).await
                }
                CallbackAction::CancelDownload => downloads::handle_cancel_download(&bot, &q, &deps).await,
                CallbackAction::Video { quality, video_id } => {
                    videos::handle_video_quality(&bot, &q, &deps, quality, &video_id).await
                }
                CallbackAction::VideoCancel => videos::handle_video_cancel(&bot, &q).await,
                CallbackAction::NewSearch | CallbackAction::StartSearch => search::handle_new_search(&bot, &q).await,
                CallbackAction::Help => search::handle_help_callback(&bot, &q).await,
                CallbackAction::Noop => {
                    let _ = bot.answer_callback_query(q.id.clone()).await;
                    Ok(())
                }
            }
        }
    })
}
