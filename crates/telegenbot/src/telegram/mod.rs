//! Telegram bot integration and handlers

pub mod bot;
pub mod callback;
pub mod dialogue;
pub mod flow_settings;
pub mod handlers;
pub mod media;
pub mod menu;
pub mod notifications;
pub mod posts;
pub mod publisher;
pub mod subscriptions;

use teloxide::types::InlineKeyboardButton;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use callback::CallbackData;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use notifications::TelegramNotifier;

pub type Bot = teloxide::Bot;

/// Inline button carrying typed callback data
pub fn cb(text: impl Into<String>, data: CallbackData) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data.to_string())
}
