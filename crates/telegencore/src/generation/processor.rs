//! Post text processing: cleanup and LLM rewriting

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use lazy_regex::{lazy_regex, Lazy, Regex};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::core::config;
use crate::core::{AppError, AppResult};
use crate::markup::{escape_html, sanitize_html, Fragment};
use crate::models::Flow;

static HIDDEN_CHARS: Lazy<Regex> = lazy_regex!(r"[\u{200B}-\u{200D}\u{FEFF}]");
static URLS: Lazy<Regex> = lazy_regex!(r"https?://\S+|www\.\S+");
static MARKDOWN_LINKS: Lazy<Regex> = lazy_regex!(r"\[([^\]]+)\]\([^)]+\)");
static BOLD_ASTERISKS: Lazy<Regex> = lazy_regex!(r"\*\*([^*]+)\*\*");

/// Turns source text into post text for a flow
#[async_trait]
pub trait ContentProcessor: Send + Sync {
    async fn process(&self, text: &str, flow: &Flow) -> AppResult<String>;
}

/// Cleans the text without rewriting it; the result is escaped HTML
pub struct DefaultProcessor;

impl DefaultProcessor {
    pub fn clean(text: &str) -> String {
        let text = HIDDEN_CHARS.replace_all(text, "");
        let text = URLS.replace_all(&text, "");
        let text = MARKDOWN_LINKS.replace_all(&text, "");
        let text = escape_html(&text);
        let text = BOLD_ASTERISKS.replace_all(&text, "<b>$1</b>");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
impl ContentProcessor for DefaultProcessor {
    async fn process(&self, text: &str, flow: &Flow) -> AppResult<String> {
        let cleaned = Self::clean(text);
        Ok(enforce_length_limit(&cleaned, flow.content_length.max_chars()))
    }
}

/// Cuts post HTML to at most `max_chars` visible characters.
///
/// Prefers the last sentence end past 70 % of the limit, then the last space
/// past 80 % (with "..."), and hard-cuts with "..." otherwise. Tags open at
/// the cut are closed and entities are never split.
pub fn enforce_length_limit(text: &str, max_chars: usize) -> String {
    let fragment = Fragment::parse(text);
    if fragment.visible_len() <= max_chars {
        return text.to_string();
    }

    let units: Vec<(usize, &str)> = fragment.units().take(max_chars).collect();
    let past = |pos: usize, ratio: f64| pos as f64 > max_chars as f64 * ratio;

    let sentence_end = units
        .windows(2)
        .enumerate()
        .filter_map(|(pos, pair)| match (pair[0].1, pair[1].1) {
            ("." | "!" | "?", " ") => Some((pos, pair[0].0 + 1)),
            _ => None,
        })
        .chain(
            units
                .iter()
                .enumerate()
                .filter(|(_, (_, unit))| *unit == "\n")
                .map(|(pos, (piece, _))| (pos, *piece)),
        )
        .max_by_key(|(pos, _)| *pos);
    if let Some((pos, cut)) = sentence_end {
        if past(pos, 0.7) {
            return fragment.render(cut, "");
        }
    }

    if let Some((pos, (piece, _))) = units.iter().enumerate().rev().find(|(_, (_, unit))| *unit == " ") {
        if past(pos, 0.8) {
            return fragment.render(*piece, "...");
        }
    }

    let end = units.last().map_or(0, |(piece, _)| piece + 1);
    fragment.render(end, "...")
}

/// Rule list sent as the system prompt
pub fn build_system_prompt(flow: &Flow) -> String {
    let max_chars = flow.content_length.max_chars();
    let mut rules = vec![
        "You are a professional post editor.".to_string(),
        "Translate it to Ukrainian.".to_string(),
        "Edit the text according to the following rules:".to_string(),
        "1. Keep the original meaning, but improve readability and clarity.".to_string(),
        "2. Remove unnecessary links, formatting artifacts, hashtags, and special characters.".to_string(),
        format!(
            "3. IMPORTANT: The final text MUST be {} characters or less. This is a strict requirement.",
            max_chars
        ),
        "   If the content is longer, summarize or trim it while preserving key information.".to_string(),
        format!("4. Rewrite the text in the following style: {}.", flow.theme),
    ];

    let mut rule = 5;
    if flow.use_emojis {
        let kind = if flow.use_premium_emojis { "premium" } else { "regular" };
        rules.push(format!("{}. Use relevant {} emojis", rule, kind));
        rule += 1;
    }
    if flow.title_highlight {
        rules.push(format!(
            "{}. Format the title using <b> tags, and add an empty line immediately after it.",
            rule
        ));
        rule += 1;
    }
    if let Some(cta) = flow.cta.as_deref().filter(|c| !c.trim().is_empty()) {
        rules.push(format!("{}. Add CTA: {}", rule, cta));
    }
    rules.push("Return only the edited content without commentary.".to_string());
    rules.join("\n")
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Rewrites posts through an OpenAI-compatible chat completions endpoint
pub struct OpenAiProcessor {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    model: String,
    max_retries: usize,
}

impl OpenAiProcessor {
    pub fn new(api_url: impl Into<String>, api_key: SecretString, model: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config::generation::request_timeout())
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            model: model.into(),
            max_retries: config::generation::MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Processor from `OPENAI_*` settings, if an API key is configured
    pub fn from_env() -> AppResult<Option<Self>> {
        use config::generation::{OPENAI_API_KEY, OPENAI_API_URL, OPENAI_MODEL};
        match OPENAI_API_KEY.clone() {
            Some(key) => Ok(Some(Self::new(OPENAI_API_URL.as_str(), key, OPENAI_MODEL.as_str())?)),
            None => Ok(None),
        }
    }

    async fn complete(&self, system_prompt: &str, text: &str) -> AppResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": text},
            ],
            "temperature": 0.5,
            "top_p": 0.9,
            "max_tokens": 2000,
        });

        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::Validation("completion has no content".to_string()))
    }
}

/// Rate limits, server errors and transport failures are worth another attempt
fn is_transient(err: &AppError) -> bool {
    match err {
        AppError::HttpStatus(status) => status.as_u16() == 429 || status.is_server_error(),
        AppError::Http(_) => true,
        _ => false,
    }
}

#[async_trait]
impl ContentProcessor for OpenAiProcessor {
    async fn process(&self, text: &str, flow: &Flow) -> AppResult<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let system_prompt = build_system_prompt(flow);
        let backoff = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_max_delay(std::time::Duration::from_secs(5));

        let result = (|| self.complete(&system_prompt, text))
            .retry(backoff)
            .when(is_transient)
            .notify(|err, delay| {
                log::info!("LLM request for flow {} failed ({}), retrying in {:?}", flow.id, err, delay);
            })
            .await?;

        Ok(enforce_length_limit(&sanitize_html(&result), flow.content_length.max_chars()))
    }
}
