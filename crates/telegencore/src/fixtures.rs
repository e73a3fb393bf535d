//! Test data for `generate-test-data` and `cleanup-test-data`

use fake::faker::internet::en::Username;
use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use rand::Rng;
use rusqlite::Connection;

use crate::billing::trial::ensure_user;
use crate::core::{AppError, AppResult};
use crate::models::{ContentLength, FlowSource, Frequency, SourceType};
use crate::storage::channels::get_or_create_channel;
use crate::storage::flows::{create_flow, NewFlow};
use crate::storage::users::{delete_all_users, delete_users_with_prefix, get_user, NewUser};

/// Username prefix of generated users; cleanup deletes by it
pub const TEST_USER_PREFIX: &str = "test_user_";

const TELEGRAM_SOURCES: &[&str] = &[
    "https://t.me/s/telegram",
    "https://t.me/s/durov",
    "https://t.me/s/bbcukrainian",
    "https://t.me/s/nytimes",
];

const WEB_SOURCES: &[&str] = &[
    "https://www.pravda.com.ua/rss/",
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://www.theverge.com/rss/index.xml",
    "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestDataOptions {
    pub users: usize,
    pub min_channels: usize,
    pub max_channels: usize,
    pub min_flows: usize,
    pub max_flows: usize,
    pub min_sources: usize,
    pub max_sources: usize,
}

impl Default for TestDataOptions {
    fn default() -> Self {
        Self {
            users: 5,
            min_channels: 1,
            max_channels: 3,
            min_flows: 1,
            max_flows: 2,
            min_sources: 2,
            max_sources: 5,
        }
    }
}

impl TestDataOptions {
    pub fn validate(&self) -> AppResult<()> {
        let ranges = [
            ("channels", self.min_channels, self.max_channels),
            ("flows", self.min_flows, self.max_flows),
            ("sources", self.min_sources, self.max_sources),
        ];
        if self.min_sources == 0 {
            return Err(AppError::Validation("--min-sources must be at least 1".to_string()));
        }
        for (name, min, max) in ranges {
            if min > max {
                return Err(AppError::Validation(format!(
                    "--min-{0} ({1}) is greater than --max-{0} ({2})",
                    name, min, max
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestDataReport {
    pub users: usize,
    pub channels: usize,
    pub flows: usize,
    pub sources: usize,
}

fn random_sources(rng: &mut impl Rng, count: usize) -> Vec<FlowSource> {
    (0..count)
        .map(|_| {
            if rng.gen_bool(0.5) {
                let link = TELEGRAM_SOURCES[rng.gen_range(0..TELEGRAM_SOURCES.len())];
                FlowSource::new(SourceType::Telegram, link)
            } else {
                let link = WEB_SOURCES[rng.gen_range(0..WEB_SOURCES.len())];
                FlowSource::new(SourceType::Web, link)
            }
        })
        .collect()
}

/// Creates users with channels, flows and sources.
///
/// A channel holds one flow, so a channel whose roll asks for more gets one.
/// Users go through the normal signup path and receive the trial when a free
/// tariff is seeded.
pub fn generate_test_data(conn: &Connection, options: &TestDataOptions) -> AppResult<TestDataReport> {
    options.validate()?;
    let mut rng = rand::thread_rng();
    let mut report = TestDataReport::default();

    for i in 0..options.users {
        let suffix: String = Username().fake_with_rng(&mut rng);
        let username = format!("{}{}_{}", TEST_USER_PREFIX, i, suffix);

        let mut telegram_id: i64 = rng.gen_range(9_000_000_000..9_999_999_999);
        while get_user(conn, telegram_id)?.is_some() {
            telegram_id = rng.gen_range(9_000_000_000..9_999_999_999);
        }

        let first_name: String = Word().fake_with_rng(&mut rng);
        let (user, _) = ensure_user(
            conn,
            &NewUser {
                telegram_id,
                username: Some(&username),
                first_name: Some(&first_name),
                last_name: None,
            },
        )?;
        report.users += 1;

        let channel_count = rng.gen_range(options.min_channels..=options.max_channels);
        for c in 0..channel_count {
            let chat_id = format!("test_channel_{}_{}_{}", user.id, c, rng.gen_range(1000..10_000));
            let word: String = Word().fake_with_rng(&mut rng);
            let (channel, created) = get_or_create_channel(conn, user.id, &chat_id, &format!("Test Channel {} {}", word, c))?;
            if !created {
                continue;
            }
            report.channels += 1;

            if rng.gen_range(options.min_flows..=options.max_flows) == 0 {
                continue;
            }

            let source_count = rng.gen_range(options.min_sources..=options.max_sources);
            let sources = random_sources(&mut rng, source_count);
            let flow_word: String = Word().fake_with_rng(&mut rng);
            let signature: String = Sentence(3..6).fake_with_rng(&mut rng);
            report.sources += sources.len();
            create_flow(
                conn,
                &NewFlow {
                    channel_id: channel.id,
                    name: format!("Test Flow {}", flow_word),
                    theme: "Test".to_string(),
                    sources,
                    content_length: ContentLength::To300,
                    frequency: Frequency::Hourly,
                    signature: Some(signature),
                    flow_volume: rng.gen_range(5..=20),
                    ..NewFlow::default()
                },
            )?;
            report.flows += 1;
        }
    }

    log::info!(
        "🧪 Test data: {} users, {} channels, {} flows, {} sources",
        report.users,
        report.channels,
        report.flows,
        report.sources
    );
    Ok(report)
}

/// Deletes generated users (or every user with `all_users`). Related rows cascade.
pub fn cleanup_test_data(conn: &Connection, all_users: bool) -> AppResult<usize> {
    let deleted = if all_users {
        delete_all_users(conn)?
    } else {
        delete_users_with_prefix(conn, TEST_USER_PREFIX)?
    };
    log::info!("🧹 Deleted {} users", deleted);
    Ok(deleted)
}
