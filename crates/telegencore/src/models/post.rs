use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// An image or video attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMedia {
    pub kind: MediaKind,
    /// Absolute http(s) URL or a `/media/...` path under MEDIA_ROOT
    pub url: String,
    pub position: i64,
}

impl PostMedia {
    pub fn image(url: impl Into<String>, position: i64) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            position,
        }
    }

    pub fn video(url: impl Into<String>, position: i64) -> Self {
        Self {
            kind: MediaKind::Video,
            url: url.into(),
            position,
        }
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get("kind")?,
            url: row.get("url")?,
            position: row.get("position")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub flow_id: i64,
    pub content: String,
    pub original_content: Option<String>,
    pub status: PostStatus,
    /// Stable id of the upstream item, used to skip duplicates
    pub source_id: Option<String>,
    pub source_url: Option<String>,
    pub original_link: Option<String>,
    pub original_date: Option<DateTime<Utc>>,
    pub publication_date: Option<DateTime<Utc>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub const COLUMNS: &'static str = "id, flow_id, content, original_content, status, source_id, source_url, \
         original_link, original_date, publication_date, scheduled_time, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            flow_id: row.get("flow_id")?,
            content: row.get("content")?,
            original_content: row.get("original_content")?,
            status: row.get("status")?,
            source_id: row.get("source_id")?,
            source_url: row.get("source_url")?,
            original_link: row.get("original_link")?,
            original_date: row.get("original_date")?,
            publication_date: row.get("publication_date")?,
            scheduled_time: row.get("scheduled_time")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}
