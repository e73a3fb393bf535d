//! Content generation: fetching source posts, rewriting them and saving drafts
//!
//! - `sources`: Telegram channel previews, web pages and feeds
//! - `processor`: text cleanup and LLM rewriting
//! - `pipeline`: per-flow generation with tariff limits

pub mod pipeline;
pub mod processor;
pub mod sources;

use std::sync::Arc;

pub use pipeline::Generator;
pub use processor::{enforce_length_limit, ContentProcessor, DefaultProcessor, OpenAiProcessor};
pub use sources::{CandidatePost, ContentSource, SourceRouter};

use crate::core::AppResult;
use crate::storage::DbPool;

/// Generator wired with the default sources and, when an API key is
/// configured, the LLM processor
pub fn default_generator(pool: Arc<DbPool>) -> AppResult<Generator> {
    let processor: Arc<dyn ContentProcessor> = match OpenAiProcessor::from_env()? {
        Some(openai) => {
            log::info!("🤖 Posts are rewritten with {}", *crate::config::generation::OPENAI_MODEL);
            Arc::new(openai)
        }
        None => {
            log::warn!("OPENAI_API_KEY is not set, posts are only cleaned up");
            Arc::new(DefaultProcessor)
        }
    };
    Ok(Generator::new(pool, Arc::new(SourceRouter::from_defaults()?), processor))
}
