//! Bot initialization: command enum, instance creation, command registration.

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands with descriptions shown in the Telegram command menu.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot and see how it works")]
    Start,
    #[command(description = "help and usage instructions")]
    Help,
    #[command(description = "about this bot")]
    About,
    #[command(description = "upload a YouTube cookies file")]
    UploadCookies,
}

/// Creates a Bot instance with custom or default API URL.
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::request_timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.clone(), client);

    let bot = if let Some(api_url) = config::BOT_API_URL.as_deref() {
        log::info!("Using custom Bot API URL: {}", api_url);
        let url = url::Url::parse(api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Registers the command menu in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "start the bot and see how it works"),
        BotCommand::new("help", "help and usage instructions"),
        BotCommand::new("about", "about this bot"),
        BotCommand::new("upload_cookies", "upload a YouTube cookies file"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start", "testbot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/upload_cookies", "testbot").unwrap(), Command::UploadCookies);
        assert!(Command::parse("/unknown", "testbot").is_err());
    }

    #[test]
    fn test_command_descriptions_present() {
        let descriptions = format!("{}", Command::descriptions());
        assert!(descriptions.contains("start"));
        assert!(descriptions.contains("upload_cookies"));
    }
}
