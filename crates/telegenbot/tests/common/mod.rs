//! Shared helpers: temp database, a `Bot` pointed at wiremock, update builders

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use telegen::telegram::dialogue::State;
use telegen::telegram::handlers::WizardDialogue;
use telegen::telegram::{Bot, HandlerDeps};
use telegencore::billing::invoices::GatewayConfig;
use telegencore::billing::{ensure_user, Notifier, PaymentGateway};
use telegencore::generation::{CandidatePost, ContentSource, DefaultProcessor, Generator};
use telegencore::models::{Channel, FlowSource, SourceType, User};
use telegencore::seed::seed_tariffs;
use telegencore::storage::channels::get_or_create_channel;
use telegencore::storage::flows::{create_flow, NewFlow};
use telegencore::storage::init_database;
use telegencore::storage::users::NewUser;
use telegencore::{get_connection, AppResult, DbPool};

pub const USER_ID: u64 = 555001;
pub const CHAT_ID: i64 = 555001;
pub const BOT_ID: u64 = 987654321;

/// Migrated and seeded SQLite database in a temp directory
pub struct TestDb {
    pub pool: Arc<DbPool>,
    _dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("bot.sqlite");
        let pool = init_database(path.to_str().expect("non-utf8 temp path")).expect("Failed to init database");
        {
            let conn = get_connection(&pool).unwrap();
            seed_tariffs(&conn, false).unwrap();
        }
        Self {
            pool: Arc::new(pool),
            _dir: dir,
        }
    }

    pub fn user(&self, telegram_id: i64) -> User {
        let conn = get_connection(&self.pool).unwrap();
        ensure_user(
            &conn,
            &NewUser {
                telegram_id,
                username: Some("testuser"),
                first_name: Some("Test"),
                last_name: None,
            },
        )
        .unwrap()
        .0
    }

    pub fn channel(&self, user: &User, chat_id: &str, name: &str) -> Channel {
        let conn = get_connection(&self.pool).unwrap();
        get_or_create_channel(&conn, user.id, chat_id, name).unwrap().0
    }

    pub fn flow(&self, channel: &Channel) -> i64 {
        let conn = get_connection(&self.pool).unwrap();
        create_flow(
            &conn,
            &NewFlow {
                channel_id: channel.id,
                name: channel.name.clone(),
                theme: "Sport".to_string(),
                sources: vec![FlowSource::new(SourceType::Telegram, "https://t.me/sport")],
                flow_volume: 5,
                ..NewFlow::default()
            },
        )
        .unwrap()
        .id
    }
}

/// Returns `limit` text posts per source
pub struct StubSource;

#[async_trait]
impl ContentSource for StubSource {
    async fn fetch_latest(&self, source: &FlowSource, limit: usize) -> AppResult<Vec<CandidatePost>> {
        Ok((0..limit)
            .map(|i| CandidatePost {
                source_id: format!("{}/{}", source.link, i),
                content: format!("Stub post {} from {}", i, source.link),
                source_url: source.link.clone(),
                original_link: Some(format!("{}/{}", source.link, i)),
                original_date: Some(Utc::now()),
                media: Vec::new(),
            })
            .collect())
    }
}

pub fn stub_generator(pool: &Arc<DbPool>) -> Generator {
    Generator::new(Arc::clone(pool), Arc::new(StubSource), Arc::new(DefaultProcessor))
}

pub fn test_gateway(base_url: &str) -> PaymentGateway {
    PaymentGateway::new(GatewayConfig {
        monobank_api_url: base_url.to_string(),
        monobank_token: None,
        monobank_webhook_secret: None,
        cryptobot_api_url: base_url.to_string(),
        cryptobot_token: None,
        cryptobot_asset: "USDT".to_string(),
        public_base_url: "https://bot.example".to_string(),
        redirect_url: "https://t.me/telegen_bot".to_string(),
    })
    .unwrap()
}

/// Remembers every notification instead of sending it
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_user(&self, telegram_id: i64, text: &str) {
        self.sent.lock().unwrap().push((telegram_id, text.to_string()));
    }
}

/// Bot, database and handler dependencies wired to a wiremock Telegram API
pub struct BotHarness {
    pub mock_server: MockServer,
    pub bot: Bot,
    pub db: TestDb,
    pub deps: HandlerDeps,
    pub storage: Arc<InMemStorage<State>>,
}

impl BotHarness {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let bot = teloxide::Bot::new("test_token_12345:ABCDEF").set_api_url(mock_server.uri().parse().unwrap());
        let db = TestDb::new();
        let deps = HandlerDeps::new(
            Arc::clone(&db.pool),
            stub_generator(&db.pool),
            Arc::new(test_gateway(&mock_server.uri())),
        );
        let harness = Self {
            mock_server,
            bot,
            db,
            deps,
            storage: InMemStorage::<State>::new(),
        };
        harness.mock_all_telegram_api().await;
        harness
    }

    pub fn dialogue(&self, chat_id: i64) -> WizardDialogue {
        Dialogue::new(Arc::clone(&self.storage), ChatId(chat_id))
    }

    async fn mock_all_telegram_api(&self) {
        let message = json!({
            "ok": true,
            "result": {
                "message_id": 42,
                "from": { "id": BOT_ID, "is_bot": true, "first_name": "TestBot" },
                "chat": { "id": CHAT_ID, "type": "private" },
                "date": 1735992000,
                "text": "Response"
            }
        });
        for api_method in ["sendMessage", "editMessageText"] {
            Mock::given(method("POST"))
                .and(path_regex(format!("(?i)/bot[^/]+/{}$", api_method)))
                .respond_with(ResponseTemplate::new(200).set_body_json(message.clone()))
                .mount(&self.mock_server)
                .await;
        }

        let ok_true = json!({ "ok": true, "result": true });
        for api_method in ["answerCallbackQuery", "deleteMessage", "setMyCommands"] {
            Mock::given(method("POST"))
                .and(path_regex(format!("(?i)/bot[^/]+/{}$", api_method)))
                .respond_with(ResponseTemplate::new(200).set_body_json(ok_true.clone()))
                .mount(&self.mock_server)
                .await;
        }
    }

    /// Bodies of every request made to `api_method`, in order
    pub async fn requests_to(&self, api_method: &str) -> Vec<Value> {
        let suffix = format!("/{}", api_method);
        self.mock_server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()))
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }
}

/// Callback data of every button in a request's inline keyboard
pub fn keyboard_data(body: &Value) -> Vec<String> {
    body["reply_markup"]["inline_keyboard"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|button| button["callback_data"].as_str().map(str::to_string))
        .collect()
}

pub fn message_from_json(text: &str, chat_id: i64, user_id: u64) -> Message {
    let json = json!({
        "message_id": 1,
        "date": 1735992000,
        "chat": { "id": chat_id, "type": "private", "first_name": "Test", "username": "testuser" },
        "from": { "id": user_id, "is_bot": false, "first_name": "Test", "username": "testuser", "language_code": "uk" },
        "text": text
    });
    serde_json::from_value(json).expect("Failed to deserialize message")
}

pub fn callback_from_json(data: &str, chat_id: i64, user_id: u64) -> CallbackQuery {
    let json = json!({
        "id": "callback_123",
        "from": { "id": user_id, "is_bot": false, "first_name": "Test", "username": "testuser", "language_code": "uk" },
        "message": {
            "message_id": 42,
            "date": 1735992000,
            "chat": { "id": chat_id, "type": "private", "first_name": "Test", "username": "testuser" },
            "from": { "id": BOT_ID, "is_bot": true, "first_name": "TestBot", "username": "test_bot" },
            "text": "Original message"
        },
        "chat_instance": "chat_instance_123",
        "data": data
    });
    serde_json::from_value(json).expect("Failed to deserialize callback")
}
