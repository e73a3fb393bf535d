use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEZONE: &str = "Europe/Kiev";

/// Timezones a channel can be configured with
pub const SUPPORTED_TIMEZONES: [&str; 3] = ["Europe/Kiev", "Europe/London", "America/New_York"];

/// A Telegram channel where the bot is an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub user_id: i64,
    /// Telegram chat id, kept as text (e.g. "-1001234567890")
    pub channel_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub notifications: bool,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub const COLUMNS: &'static str =
        "id, user_id, channel_id, name, description, is_active, notifications, timezone, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            channel_id: row.get("channel_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            is_active: row.get("is_active")?,
            notifications: row.get("notifications")?,
            timezone: row.get("timezone")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Channel timezone, falling back to Europe/Kiev for unknown names
    pub fn tz(&self) -> Tz {
        parse_timezone(&self.timezone)
    }

    /// Telegram chat id as a number, if the stored id is numeric
    pub fn chat_id(&self) -> Option<i64> {
        self.channel_id.parse().ok()
    }
}

pub fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::Europe::Kiev)
}
