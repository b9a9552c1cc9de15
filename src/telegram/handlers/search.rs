//! Search flow: query intake, platform selection and result pagination.

use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ParseMode};

use super::types::{HandlerDeps, HandlerError};
use crate::core::config;
use crate::download::source::SourceKind;
use crate::state::search_cache::{CacheKey, SearchEntry};
use crate::telegram::{format, keyboard};

/// Receives a plain text query, remembers it, and offers the platform picker.
pub async fn handle_text_query(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else { return Ok(()) };
    let query = text.trim();

    if query.chars().count() < config::search::MIN_QUERY_LEN {
        bot.send_message(msg.chat.id, "❌ The query is too short\\. Send at least 2 characters\\.")
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        return Ok(());
    }
    if query.chars().count() > config::search::MAX_QUERY_LEN {
        bot.send_message(msg.chat.id, "❌ The query is too long\\. Keep it under 100 characters\\.")
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        return Ok(());
    }

    deps.state.set_pending_query(msg.chat.id.0, query.to_string());

    bot.send_message(msg.chat.id, format::source_prompt(query))
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(keyboard::source_keyboard())
        .await?;
    Ok(())
}

/// The user picked a platform for their pending query.
pub async fn handle_pick_source(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    source: SourceKind,
) -> Result<(), HandlerError> {
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let (Some(chat_id), Some(message_id)) = callback_location(q) else {
        return Ok(());
    };

    let Some(query) = deps.state.take_pending_query(chat_id.0) else {
        bot.edit_message_text(chat_id, message_id, format::STALE_RESULTS_MESSAGE)
            .parse_mode(ParseMode::MarkdownV2)
            .reply_markup(keyboard::error_keyboard())
            .await?;
        return Ok(());
    };

    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
    let _ = bot
        .edit_message_text(chat_id, message_id, format::searching_status(source))
        .parse_mode(ParseMode::MarkdownV2)
        .await;

    run_search(bot, deps, chat_id, message_id, source, &query).await
}

/// Searches the platform, caches the results and renders page zero.
pub async fn run_search(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    source: SourceKind,
    query: &str,
) -> Result<(), HandlerError> {
    let Some(adapter) = deps.state.sources.resolve(source) else {
        log::error!("No adapter registered for {}", source);
        return Ok(());
    };

    log::info!("Searching {} for '{}' (chat {})", source, query, chat_id);

    let outcome = match adapter.search(query, config::search::MAX_RESULTS).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Search on {} failed: {}", source, e);
            bot.edit_message_text(chat_id, message_id, format::error_message(format::ErrorKind::Network, None))
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(keyboard::error_keyboard())
                .await?;
            return Ok(());
        }
    };

    if outcome.tracks.is_empty() {
        let (kind, detail) = match &outcome.error_detail {
            Some(detail) => (format::ErrorKind::Auth, Some(detail.as_str())),
            None => (format::ErrorKind::NotFound, None),
        };
        bot.edit_message_text(chat_id, message_id, format::error_message(kind, detail))
            .parse_mode(ParseMode::MarkdownV2)
            .reply_markup(keyboard::error_keyboard())
            .await?;
        return Ok(());
    }

    let page_size = *config::search::PAGE_SIZE;
    let entry = SearchEntry::new(outcome.tracks, query.to_string(), source, page_size);
    let key = CacheKey::new(chat_id.0, source, query);
    deps.state.search_cache.put(key, entry.clone());

    render_page(bot, chat_id, message_id, &entry, source, query, 0).await
}

/// Pagination callback. An out-of-range page is ignored silently.
pub async fn handle_page(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    source: SourceKind,
    page: usize,
    query: &str,
) -> Result<(), HandlerError> {
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let (Some(chat_id), Some(message_id)) = callback_location(q) else {
        return Ok(());
    };

    let key = CacheKey::new(chat_id.0, source, query);
    let Some(entry) = deps.state.search_cache.get(&key) else {
        bot.edit_message_text(chat_id, message_id, format::STALE_RESULTS_MESSAGE)
            .parse_mode(ParseMode::MarkdownV2)
            .reply_markup(keyboard::error_keyboard())
            .await?;
        return Ok(());
    };

    render_page(bot, chat_id, message_id, &entry, source, query, page).await
}

async fn render_page(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    entry: &SearchEntry,
    source: SourceKind,
    query: &str,
    page: usize,
) -> Result<(), HandlerError> {
    let page_size = *config::search::PAGE_SIZE;
    let Some(tracks) = entry.page(page, page_size) else {
        log::debug!("Ignoring out-of-range page {} for chat {}", page, chat_id);
        return Ok(());
    };

    let text = format::search_results_message(tracks, source, query, page, entry.total_pages);
    let markup = keyboard::results_keyboard(tracks, source, query, page, entry.total_pages);

    if let Err(e) = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(markup)
        .await
    {
        if !e.to_string().contains("message is not modified") {
            return Err(e.into());
        }
    }
    Ok(())
}

/// Replaces the current message with a fresh query prompt.
pub async fn handle_new_search(bot: &Bot, q: &CallbackQuery) -> Result<(), HandlerError> {
    let _ = bot.answer_callback_query(q.id.clone()).await;
    let (Some(chat_id), Some(message_id)) = callback_location(q) else {
        return Ok(());
    };
    bot.edit_message_text(chat_id, message_id, format::NEW_SEARCH_PROMPT)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
    Ok(())
}

pub async fn handle_help_callback(bot: &Bot, q: &CallbackQuery) -> Result<(), HandlerError> {
    let _ = bot.answer_callback_query(q.id.clone()).await;
    if let (Some(chat_id), _) = callback_location(q) {
        bot.send_message(chat_id, format::HELP_MESSAGE)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
    }
    Ok(())
}

/// Chat and message behind a callback, when Telegram still exposes them.
pub fn callback_location(q: &CallbackQuery) -> (Option<ChatId>, Option<MessageId>) {
    (
        q.message.as_ref().map(|m| m.chat().id),
        q.message.as_ref().map(|m| m.id()),
    )
}
