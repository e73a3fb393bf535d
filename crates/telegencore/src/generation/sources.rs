//! Content sources: public Telegram channel previews, web pages and feeds

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_regex::{lazy_regex, regex_captures, Lazy, Regex};
use select::document::Document;
use select::node::Node;
use feed_rs::model::Entry;
use select::predicate::{Attr, Class, Name, Predicate};

use crate::core::config;
use crate::core::{AppError, AppResult};
use crate::models::{FlowSource, PostMedia, SourceType};

static BR_TAG: Lazy<Regex> = lazy_regex!(r"(?i)<br\s*/?>");

/// A post found at a source, before processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    /// Stable id used to skip posts that were already generated
    pub source_id: String,
    pub content: String,
    pub source_url: String,
    pub original_link: Option<String>,
    pub original_date: Option<DateTime<Utc>>,
    pub media: Vec<PostMedia>,
}

/// Fetches the latest posts of a flow source
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_latest(&self, source: &FlowSource, limit: usize) -> AppResult<Vec<CandidatePost>>;
}

fn http_client() -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config::network::timeout())
        .user_agent("Mozilla/5.0 (compatible; TelegenBot/1.0)")
        .build()?)
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> AppResult<String> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AppError::HttpStatus(response.status()));
    }
    Ok(response.text().await?)
}

/// Converts an HTML fragment to plain text, keeping line breaks
fn html_to_text(html: &str) -> String {
    let with_newlines = BR_TAG.replace_all(html, "\n");
    let document = Document::from(with_newlines.as_ref());
    document
        .find(Name("body"))
        .next()
        .map(|body| body.text())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Channel username from a t.me link: `https://t.me/name`, `https://t.me/s/name`, `@name`
pub fn telegram_channel_name(link: &str) -> Option<String> {
    let link = link.trim();
    if let Some(name) = link.strip_prefix('@') {
        return Some(name.to_string()).filter(|n| !n.is_empty());
    }
    let url = url::Url::parse(link).ok()?;
    if !matches!(url.host_str(), Some("t.me") | Some("telegram.me") | Some("www.t.me")) {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;
    let name = if first == "s" { segments.next()? } else { first };
    Some(name.to_string())
}

// ==================== Telegram ====================

/// Reads the public web preview of a channel (`https://t.me/s/<channel>`)
pub struct TelegramPreviewSource {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramPreviewSource {
    pub fn new() -> AppResult<Self> {
        Self::with_base_url("https://t.me/s")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
        })
    }
}

/// Extracts `url('...')` from a `background-image` style
fn background_image_url(style: &str) -> Option<String> {
    regex_captures!(r#"background-image:\s*url\(['"]?([^'")]+)['"]?\)"#, style).map(|(_, url)| url.to_string())
}

/// Parses the message widgets of a channel preview page, newest first
pub fn parse_telegram_preview(html: &str, channel: &str) -> Vec<CandidatePost> {
    let document = Document::from(html);
    let mut posts: Vec<CandidatePost> = document
        .find(Class("tgme_widget_message").and(Attr("data-post", ())))
        .filter_map(|node| {
            let data_post = node.attr("data-post")?;
            let content = node
                .find(Class("tgme_widget_message_text"))
                .next()
                .map(|text| html_to_text(&text.inner_html()))
                .unwrap_or_default();

            let mut media: Vec<PostMedia> = node
                .find(Class("tgme_widget_message_photo_wrap"))
                .filter_map(|photo| photo.attr("style").and_then(background_image_url))
                .enumerate()
                .map(|(i, url)| PostMedia::image(url, i as i64))
                .collect();
            media.extend(
                node.find(Name("video"))
                    .filter_map(|video| video.attr("src"))
                    .enumerate()
                    .map(|(i, src)| PostMedia::video(src, i as i64)),
            );

            if content.is_empty() && media.is_empty() {
                return None;
            }

            let original_date = node
                .find(Name("time"))
                .next()
                .and_then(|time| time.attr("datetime"))
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Some(CandidatePost {
                source_id: format!("tg:{}", data_post),
                content,
                source_url: format!("https://t.me/{}", channel),
                original_link: Some(format!("https://t.me/{}", data_post)),
                original_date,
                media,
            })
        })
        .collect();

    // The preview lists oldest first
    posts.reverse();
    posts
}

#[async_trait]
impl ContentSource for TelegramPreviewSource {
    async fn fetch_latest(&self, source: &FlowSource, limit: usize) -> AppResult<Vec<CandidatePost>> {
        let channel = telegram_channel_name(&source.link)
            .ok_or_else(|| AppError::Validation(format!("not a Telegram channel link: {}", source.link)))?;
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), channel);
        let html = fetch_text(&self.client, &url).await?;

        let mut posts = parse_telegram_preview(&html, &channel);
        posts.truncate(limit);
        log::debug!("📡 {} posts from t.me/{}", posts.len(), channel);
        Ok(posts)
    }
}

// ==================== Web ====================

/// Fetches a web page or feed. Feeds yield their items; pages that advertise
/// a feed are followed to it; other pages yield themselves as one post.
pub struct WebSource {
    client: reqwest::Client,
}

impl WebSource {
    pub fn new() -> AppResult<Self> {
        Ok(Self { client: http_client()? })
    }
}

fn looks_like_feed(body: &str) -> bool {
    let head: String = body.chars().take(512).collect::<String>().to_lowercase();
    head.contains("<rss") || head.contains("<feed") || (head.starts_with("<?xml") && !head.contains("<html"))
}

fn text_of(text: &feed_rs::model::Text) -> Option<String> {
    Some(html_to_text(&text.content)).filter(|t| !t.is_empty())
}

fn entry_media(entry: &Entry) -> Vec<PostMedia> {
    entry
        .media
        .iter()
        .flat_map(|object| &object.content)
        .filter_map(|content| {
            let url = content.url.as_ref()?.to_string();
            let kind = content.content_type.as_ref().map_or("image", |mime| mime.ty().as_str());
            match kind {
                "video" => Some((url, true)),
                "image" => Some((url, false)),
                _ => None,
            }
        })
        .enumerate()
        .map(|(i, (url, is_video))| {
            if is_video {
                PostMedia::video(url, i as i64)
            } else {
                PostMedia::image(url, i as i64)
            }
        })
        .collect()
}

fn entry_post(entry: Entry, feed_url: &str) -> Option<CandidatePost> {
    let title = entry.title.as_ref().and_then(text_of);
    let summary = entry
        .summary
        .as_ref()
        .and_then(text_of)
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()).map(html_to_text))
        .filter(|s| !s.is_empty());
    let content = match (title, summary) {
        (Some(title), Some(summary)) if !summary.starts_with(&title) => format!("{}\n\n{}", title, summary),
        (_, Some(summary)) => summary,
        (Some(title), None) => title,
        (None, None) => return None,
    };

    let link = entry.links.first().map(|l| l.href.clone());
    let id = Some(entry.id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| link.clone())
        .unwrap_or_else(|| content.chars().take(64).collect());

    Some(CandidatePost {
        source_id: format!("web:{}", id),
        media: entry_media(&entry),
        original_date: entry.published.or(entry.updated),
        content,
        source_url: feed_url.to_string(),
        original_link: link,
    })
}

/// Parses an RSS or Atom document into posts, newest first.
///
/// Entries without a guid get the id `feed-rs` derives from their link and title.
pub fn parse_feed(body: &str, feed_url: &str) -> AppResult<Vec<CandidatePost>> {
    let feed = feed_rs::parser::parse(body.trim_start().as_bytes())?;
    let mut posts: Vec<CandidatePost> = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_post(entry, feed_url))
        .collect();

    posts.sort_by(|a, b| b.original_date.cmp(&a.original_date));
    Ok(posts)
}

/// Feed URL advertised by a page through `<link rel="alternate">`
pub fn discover_feed_url(html: &str, page_url: &str) -> Option<String> {
    let document = Document::from(html);
    let href = document
        .find(Name("link").and(Attr("rel", "alternate")))
        .find(|node| {
            node.attr("type")
                .is_some_and(|t| t.contains("rss") || t.contains("atom"))
        })
        .and_then(|node| node.attr("href"))?;
    url::Url::parse(page_url)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

fn paragraph_texts<'a>(nodes: impl Iterator<Item = Node<'a>>) -> Vec<String> {
    nodes
        .map(|p| p.text().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect()
}

fn meta_content(document: &Document, property: &str) -> Option<String> {
    document
        .find(Name("meta"))
        .find(|n| n.attr("property") == Some(property) || n.attr("name") == Some(property))
        .and_then(|n| n.attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Reads a single article page: `og:` metadata plus the paragraphs of `<article>`
pub fn parse_article(html: &str, page_url: &str) -> Option<CandidatePost> {
    let document = Document::from(html);
    let title = meta_content(&document, "og:title")
        .or_else(|| document.find(Name("title")).next().map(|n| n.text().trim().to_string()))
        .filter(|t| !t.is_empty());

    let body = match document.find(Name("article")).next() {
        Some(article) => paragraph_texts(article.find(Name("p"))),
        None => paragraph_texts(document.find(Name("p"))),
    };
    let body = if body.is_empty() {
        meta_content(&document, "og:description").into_iter().collect()
    } else {
        body
    };

    let content = match title {
        Some(title) if !body.is_empty() => format!("{}\n\n{}", title, body.join("\n\n")),
        Some(title) => title,
        None if !body.is_empty() => body.join("\n\n"),
        None => return None,
    };

    let media = meta_content(&document, "og:image")
        .map(|image| vec![PostMedia::image(image, 0)])
        .unwrap_or_default();
    let original_date = meta_content(&document, "article:published_time")
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let link = meta_content(&document, "og:url").unwrap_or_else(|| page_url.to_string());

    Some(CandidatePost {
        source_id: format!("web:{}", link),
        content,
        source_url: page_url.to_string(),
        original_link: Some(link),
        original_date,
        media,
    })
}

#[async_trait]
impl ContentSource for WebSource {
    async fn fetch_latest(&self, source: &FlowSource, limit: usize) -> AppResult<Vec<CandidatePost>> {
        let body = fetch_text(&self.client, &source.link).await?;

        let mut posts = if looks_like_feed(&body) {
            parse_feed(&body, &source.link)?
        } else if let Some(feed_url) = discover_feed_url(&body, &source.link) {
            log::debug!("Following feed {} advertised by {}", feed_url, source.link);
            let feed = fetch_text(&self.client, &feed_url).await?;
            parse_feed(&feed, &feed_url)?
        } else {
            parse_article(&body, &source.link).into_iter().collect()
        };

        posts.truncate(limit);
        log::debug!("🌐 {} posts from {}", posts.len(), source.link);
        Ok(posts)
    }
}

// ==================== Routing ====================

/// Dispatches a flow source to the fetcher for its type.
///
/// Instagram and Facebook have no public feed to read; their sources are
/// skipped with a warning.
pub struct SourceRouter {
    telegram: Box<dyn ContentSource>,
    web: Box<dyn ContentSource>,
}

impl SourceRouter {
    pub fn new(telegram: Box<dyn ContentSource>, web: Box<dyn ContentSource>) -> Self {
        Self { telegram, web }
    }

    pub fn from_defaults() -> AppResult<Self> {
        Ok(Self::new(
            Box::new(TelegramPreviewSource::new()?),
            Box::new(WebSource::new()?),
        ))
    }
}

#[async_trait]
impl ContentSource for SourceRouter {
    async fn fetch_latest(&self, source: &FlowSource, limit: usize) -> AppResult<Vec<CandidatePost>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match source.source_type {
            SourceType::Telegram => self.telegram.fetch_latest(source, limit).await,
            SourceType::Web => self.web.fetch_latest(source, limit).await,
            SourceType::Instagram | SourceType::Facebook => {
                log::warn!("⚠️ {} sources are not fetchable, skipping {}", source.source_type, source.link);
                Ok(Vec::new())
            }
        }
    }
}
