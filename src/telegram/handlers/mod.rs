//! Telegram update handlers.

pub mod commands;
pub mod downloads;
pub mod schema;
pub mod search;
pub mod types;
pub mod uploads;
pub mod videos;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
