use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Where a flow pulls content from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceType {
    Instagram,
    Facebook,
    Web,
    Telegram,
}

impl SourceType {
    /// Button label in the source picker
    pub fn label(self) -> &'static str {
        match self {
            SourceType::Instagram => "📷 Instagram",
            SourceType::Facebook => "👍 Facebook",
            SourceType::Web => "🌐 Web-сайт",
            SourceType::Telegram => "✈️ Telegram",
        }
    }

    /// Link template shown when the user is asked for a link
    pub fn link_example(self) -> &'static str {
        match self {
            SourceType::Instagram => "https://www.instagram.com/username",
            SourceType::Facebook => "https://www.facebook.com/pagename",
            SourceType::Web => "https://example.com/news",
            SourceType::Telegram => "https://t.me/channelname",
        }
    }

    /// Whether the generation pipeline can fetch content for this type
    pub fn is_fetchable(self) -> bool {
        matches!(self, SourceType::Web | SourceType::Telegram)
    }
}

/// Character limit of generated posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter)]
pub enum ContentLength {
    #[strum(serialize = "to_100")]
    #[serde(rename = "to_100")]
    To100,
    #[default]
    #[strum(serialize = "to_300")]
    #[serde(rename = "to_300")]
    To300,
    #[strum(serialize = "to_1000")]
    #[serde(rename = "to_1000")]
    To1000,
}

impl ContentLength {
    pub fn max_chars(self) -> usize {
        match self {
            ContentLength::To100 => 100,
            ContentLength::To300 => 300,
            ContentLength::To1000 => 1000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentLength::To100 => "До 100",
            ContentLength::To300 => "До 300",
            ContentLength::To1000 => "До 1000",
        }
    }
}

/// How often a flow generates new posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter)]
pub enum Frequency {
    #[strum(serialize = "hourly")]
    #[serde(rename = "hourly")]
    Hourly,
    #[strum(serialize = "12h")]
    #[serde(rename = "12h")]
    TwelveHours,
    #[default]
    #[strum(serialize = "daily")]
    #[serde(rename = "daily")]
    Daily,
}

impl Frequency {
    pub fn interval(self) -> Duration {
        match self {
            Frequency::Hourly => Duration::hours(1),
            Frequency::TwelveHours => Duration::hours(12),
            Frequency::Daily => Duration::days(1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::Hourly => "Раз на годину",
            Frequency::TwelveHours => "Раз на 12 годин",
            Frequency::Daily => "Раз на день",
        }
    }
}

/// A single source entry stored in the flow's JSON `sources` column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub link: String,
    pub added_at: DateTime<Utc>,
}

impl FlowSource {
    pub fn new(source_type: SourceType, link: impl Into<String>) -> Self {
        Self {
            source_type,
            link: link.into(),
            added_at: Utc::now(),
        }
    }
}

/// Per-channel generation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: i64,
    /// Row id of the owning channel (not the Telegram chat id)
    pub channel_id: i64,
    pub name: String,
    pub theme: String,
    pub sources: Vec<FlowSource>,
    pub content_length: ContentLength,
    pub use_emojis: bool,
    pub use_premium_emojis: bool,
    pub title_highlight: bool,
    pub cta: Option<String>,
    pub frequency: Frequency,
    pub signature: Option<String>,
    pub flow_volume: u32,
    pub next_generation_time: Option<DateTime<Utc>>,
    pub last_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    pub const COLUMNS: &'static str = "id, channel_id, name, theme, sources, content_length, use_emojis, \
         use_premium_emojis, title_highlight, cta, frequency, signature, flow_volume, next_generation_time, \
         last_generated_at, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw_sources: String = row.get("sources")?;
        let sources = serde_json::from_str(&raw_sources)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get("id")?,
            channel_id: row.get("channel_id")?,
            name: row.get("name")?,
            theme: row.get("theme")?,
            sources,
            content_length: row.get("content_length")?,
            use_emojis: row.get("use_emojis")?,
            use_premium_emojis: row.get("use_premium_emojis")?,
            title_highlight: row.get("title_highlight")?,
            cta: row.get("cta")?,
            frequency: row.get("frequency")?,
            signature: row.get("signature")?,
            flow_volume: row.get("flow_volume")?,
            next_generation_time: row.get("next_generation_time")?,
            last_generated_at: row.get("last_generated_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn sources_of(&self, source_type: SourceType) -> impl Iterator<Item = &FlowSource> {
        self.sources.iter().filter(move |s| s.source_type == source_type)
    }

    /// Splits `flow_volume` across fetchable sources.
    ///
    /// Every telegram and web source gets `volume / n`; the remainder goes to web.
    /// Returns `(telegram_volume, web_volume)`.
    pub fn volume_split(&self) -> (u32, u32) {
        let telegram = self.sources_of(SourceType::Telegram).count() as u32;
        let web = self.sources_of(SourceType::Web).count() as u32;
        let total = telegram + web;
        if total == 0 {
            return (0, 0);
        }

        let base = self.flow_volume / total;
        let remainder = self.flow_volume % total;
        (base * telegram, base * web + remainder)
    }
}

/// Returns true when `link` is an absolute http(s) URL
pub fn is_valid_link(link: &str) -> bool {
    let link = link.trim();
    (link.starts_with("http://") || link.starts_with("https://")) && url::Url::parse(link).is_ok()
}
