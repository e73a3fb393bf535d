//! Read models handed to the bot layer.
//!
//! Each DTO flattens one or more rows into exactly what a window or a
//! notification renders, so handlers never touch SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentLength, Flow, FlowSource, Frequency, MediaKind, Post, PostMedia, Tariff};

/// Flow parameters as shown in the wizard confirmation and flow settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub flow_name: String,
    pub theme: String,
    pub sources: Vec<FlowSource>,
    pub frequency: Frequency,
    pub content_length: ContentLength,
    pub flow_volume: u32,
    pub title_highlight: bool,
    pub signature: Option<String>,
}

impl From<&Flow> for FlowSummary {
    fn from(flow: &Flow) -> Self {
        Self {
            flow_name: flow.name.clone(),
            theme: flow.theme.clone(),
            sources: flow.sources.clone(),
            frequency: flow.frequency,
            content_length: flow.content_length,
            flow_volume: flow.flow_volume,
            title_highlight: flow.title_highlight,
            signature: flow.signature.clone(),
        }
    }
}

/// A post together with its media, ordered images first then videos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub post: Post,
    pub media: Vec<PostMedia>,
}

impl PostView {
    pub fn new(post: Post, mut media: Vec<PostMedia>) -> Self {
        media.sort_by_key(|m| (m.kind == MediaKind::Video, m.position));
        Self { post, media }
    }

    pub fn images(&self) -> impl Iterator<Item = &PostMedia> {
        self.media.iter().filter(|m| m.kind == MediaKind::Image)
    }

    pub fn videos(&self) -> impl Iterator<Item = &PostMedia> {
        self.media.iter().filter(|m| m.kind == MediaKind::Video)
    }

    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

/// Current subscription of a user as shown in the subscription window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub tariff: Tariff,
    pub months: i64,
    pub end_date: DateTime<Utc>,
    pub is_trial: bool,
    pub generations_used: i64,
}

impl SubscriptionInfo {
    pub fn generations_left(&self) -> i64 {
        (self.tariff.generations_available - self.generations_used).max(0)
    }
}
