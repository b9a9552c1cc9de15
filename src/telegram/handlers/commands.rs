//! Handlers for the /start, /help, /about and /upload_cookies commands.

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use super::types::HandlerError;
use crate::telegram::{format, keyboard};

pub async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    log::info!("Start command from chat {}", msg.chat.id);
    bot.send_message(msg.chat.id, format::START_MESSAGE)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(keyboard::start_keyboard())
        .await?;
    Ok(())
}

pub async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, format::HELP_MESSAGE)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

pub async fn handle_about_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, format::ABOUT_MESSAGE)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

pub async fn handle_upload_cookies_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(
        msg.chat.id,
        "🍪 *Updating YouTube cookies*\n\n\
         Send a Netscape\\-format cookies file as a document\\. \
         The filename must contain \"cookies\" \\(for example `youtube_cookies.txt`\\)\\.\n\n\
         Export it with a browser extension such as \"Get cookies\\.txt\" while logged in to YouTube\\.",
    )
    .parse_mode(ParseMode::MarkdownV2)
    .await?;
    Ok(())
}
