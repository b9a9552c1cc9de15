//! Cookies file upload: receives a document and persists it at the
//! configured cookies path.
//!
//! The new file takes effect on the next download because the path is
//! re-read on every yt-dlp invocation; nothing needs restarting.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Document, ParseMode};

use super::types::HandlerError;
use crate::core::config;
use crate::core::utils::escape_markdown_v2;

/// True when the attached document looks like a cookies file by name.
pub fn is_cookies_document(msg: &Message) -> bool {
    msg.document()
        .and_then(|d| d.file_name.as_deref())
        .map(|name| name.to_lowercase().contains("cookies"))
        .unwrap_or(false)
}

/// Downloads the document, validates it and installs it as the cookies file.
pub async fn handle_cookies_document(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let Some(document) = msg.document() else { return Ok(()) };

    log::info!(
        "Cookies upload from chat {}: {:?} ({} bytes)",
        msg.chat.id,
        document.file_name,
        document.file.size
    );

    match install_cookies_file(bot, document).await {
        Ok(cookie_count) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ *Cookies updated*\n\n🍪 {} cookie entries saved\\.\n\
                     They will be used for the next YouTube download\\.",
                    cookie_count
                ),
            )
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        }
        Err(e) => {
            log::warn!("Cookies upload rejected for chat {}: {}", msg.chat.id, e);
            bot.send_message(
                msg.chat.id,
                format!("❌ *Could not accept this file*\n\n{}", escape_markdown_v2(&e.to_string())),
            )
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        }
    }
    Ok(())
}

async fn install_cookies_file(bot: &Bot, document: &Document) -> anyhow::Result<usize> {
    let file = bot.get_file(document.file.id.clone()).await?;

    let mut buffer: Vec<u8> = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut buffer).await?;

    let content = String::from_utf8(buffer).map_err(|_| anyhow::anyhow!("The file is not valid UTF-8 text."))?;

    if !content.contains("youtube.com") {
        anyhow::bail!("This does not look like a YouTube cookies file: no youtube.com entries found.");
    }

    let cookie_count = content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .count();
    if cookie_count == 0 {
        anyhow::bail!("The file contains no cookie entries.");
    }

    let dest = shellexpand::tilde(config::YTDL_COOKIES_FILE.as_str()).to_string();
    if let Some(parent) = std::path::Path::new(&dest).parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    fs_err::write(&dest, content)?;
    log::info!("Cookies file installed at {} ({} entries)", dest, cookie_count);

    Ok(cookie_count)
}
