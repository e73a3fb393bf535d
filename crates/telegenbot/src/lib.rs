//! Telegen - Telegram bot that turns content sources into channel posts
//!
//! Storage, billing and generation live in `telegencore`; this crate wires
//! them to Telegram, the payment webhooks and the background scheduler.
//!
//! # Module Structure
//!
//! - `cli`: command line interface
//! - `telegram`: dispatcher schema, dialogue wizard, menus, buffer and publishing
//! - `web`: axum server for payment provider webhooks
//! - `scheduler`: periodic generation, publication, expiry and counter resets

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod scheduler;
pub mod telegram;
pub mod web;

pub use telegram::{create_bot, schema, HandlerDeps};
