use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A Telegram user of the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Posts generated since the last monthly reset
    pub generated_posts_count: i64,
    /// When `generated_posts_count` is zeroed next
    pub generation_reset_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, telegram_id, username, first_name, last_name, created_at, generated_posts_count, generation_reset_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            telegram_id: row.get("telegram_id")?,
            username: row.get("username")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            created_at: row.get("created_at")?,
            generated_posts_count: row.get("generated_posts_count")?,
            generation_reset_at: row.get("generation_reset_at")?,
        })
    }

    /// Name for greetings: first name, then @username, then the numeric id
    pub fn display_name(&self) -> String {
        if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            return first.to_string();
        }
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => format!("@{}", username),
            _ => self.telegram_id.to_string(),
        }
    }
}
