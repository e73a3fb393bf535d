//! Shared helpers for telegencore integration tests

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use telegencore::billing::ensure_user;
use telegencore::models::{FlowSource, SourceType, User};
use telegencore::seed::seed_tariffs;
use telegencore::storage::channels::get_or_create_channel;
use telegencore::storage::flows::{create_flow, NewFlow};
use telegencore::storage::init_database;
use telegencore::storage::users::NewUser;
use telegencore::{get_connection, DbPool};

/// A migrated SQLite database in a temp directory; the directory lives as long as the value
pub struct TestDb {
    pub pool: Arc<DbPool>,
    _dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.sqlite");
        let pool = init_database(path.to_str().expect("non-utf8 temp path")).expect("Failed to init database");
        Self {
            pool: Arc::new(pool),
            _dir: dir,
        }
    }

    /// Same as `new` with the default tariffs seeded
    pub fn seeded() -> Self {
        let db = Self::new();
        let conn = get_connection(&db.pool).unwrap();
        seed_tariffs(&conn, false).unwrap();
        db
    }

    pub fn user(&self, telegram_id: i64) -> User {
        let conn = get_connection(&self.pool).unwrap();
        let (user, _) = ensure_user(
            &conn,
            &NewUser {
                telegram_id,
                username: Some("tester"),
                first_name: Some("Test"),
                last_name: None,
            },
        )
        .unwrap();
        user
    }

    /// Creates a channel with a flow for `user` and returns the flow id
    pub fn flow(&self, user: &User, sources: Vec<FlowSource>, volume: u32) -> i64 {
        let conn = get_connection(&self.pool).unwrap();
        let chat_id = format!("-100{}{}", user.telegram_id, sources.len());
        let (channel, _) = get_or_create_channel(&conn, user.id, &chat_id, "Test channel").unwrap();
        create_flow(
            &conn,
            &NewFlow {
                channel_id: channel.id,
                name: "Test flow".to_string(),
                theme: "Sport".to_string(),
                sources,
                flow_volume: volume,
                signature: Some("@telegen".to_string()),
                ..NewFlow::default()
            },
        )
        .unwrap()
        .id
    }
}

pub fn telegram_source(name: &str) -> FlowSource {
    FlowSource::new(SourceType::Telegram, format!("https://t.me/{}", name))
}

pub fn web_source(url: &str) -> FlowSource {
    FlowSource::new(SourceType::Web, url)
}
