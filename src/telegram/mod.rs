//! Telegram bot surface: commands, keyboards, message templates, handlers.

pub mod bot;
pub mod format;
pub mod handlers;
pub mod keyboard;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
