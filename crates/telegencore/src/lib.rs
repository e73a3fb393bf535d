//! Telegencore - storage, billing and content generation for the Telegen bot
//!
//! Nothing in this crate talks to Telegram directly. The bot crate plugs in
//! through the [`billing::Notifier`] trait and the `telegram` feature.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging
//! - `models`: records and DTOs for users, channels, flows, posts, billing
//! - `storage`: SQLite pool, migrations and queries
//! - `billing`: trial subscriptions, payment webhooks, invoices, limits
//! - `generation`: content sources, processors and the flow pipeline
//! - `markup`: Telegram HTML escaping, sanitizing, truncation and chunking
//! - `scheduling`: post scheduling and frequency helpers
//! - `seed` / `fixtures`: tariff seeding and test data for the CLI

#![allow(clippy::too_many_arguments)]

pub mod billing;
pub mod core;
pub mod fixtures;
pub mod generation;
pub mod markup;
pub mod models;
pub mod scheduling;
pub mod seed;
pub mod storage;

pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
