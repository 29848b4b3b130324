//! Minimal Telegram Bot API client: long polling, messages, inline buttons.

pub mod api;
pub mod types;

pub use api::{PARSE_MODE_MARKDOWN, TelegramApi, TelegramError};
