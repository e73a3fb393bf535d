//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! Every endpoint delegates to a public `handle_*` function so integration
//! tests can drive the same code with a mocked Bot API.

mod callbacks;
mod channels;
mod commands;
mod messages;
mod schema;
mod types;

pub use callbacks::handle_callback;
pub use channels::handle_my_chat_member;
pub use commands::handle_command;
pub use messages::handle_text;
pub use schema::schema;
pub use types::{ensure_user_exists, HandlerDeps, HandlerError, WizardDialogue};
