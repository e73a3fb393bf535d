use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;

use crate::core::{AppError, AppResult};
use crate::generation::processor::ContentProcessor;
use crate::generation::sources::{CandidatePost, ContentSource};
use crate::markup::escape_html;
use crate::models::{Flow, Post, SourceType};
use crate::storage::billing::active_plan;
use crate::storage::flows::{get_flow, mark_generated};
use crate::storage::posts::{create_post, post_exists_by_source_id, NewPost};
use crate::storage::users::{get_user_for_flow, increment_generated_posts};
use crate::storage::{get_connection, DbPool};

/// Per-source fetch limits for a flow: each telegram and web source gets
/// `volume / n`, the first web source also takes the remainder.
pub fn source_limits(flow: &Flow) -> Vec<(usize, usize)> {
    let fetchable: Vec<usize> = flow
        .sources
        .iter()
        .enumerate()
        .filter(|(_, s)| s.source_type.is_fetchable())
        .map(|(i, _)| i)
        .collect();
    if fetchable.is_empty() {
        return Vec::new();
    }

    let n = fetchable.len() as u32;
    let base = (flow.flow_volume / n) as usize;
    let mut remainder = (flow.flow_volume % n) as usize;

    fetchable
        .into_iter()
        .map(|i| {
            let mut limit = base;
            if remainder > 0 && flow.sources[i].source_type == SourceType::Web {
                limit += remainder;
                remainder = 0;
            }
            (i, limit)
        })
        .collect()
}

/// How many posts to generate, given what the flow asks for and what the tariff has left
pub fn resolve_generation_volume(requested: i64, remaining: i64, allow_partial: bool) -> AppResult<i64> {
    if requested > remaining && !allow_partial {
        return Err(AppError::GenerationLimitExceeded(format!(
            "❌ Недостатньо генерацій для {} постів (доступно {})",
            requested, remaining
        )));
    }
    Ok(requested.min(remaining))
}

/// Appends the flow signature, escaped, after an empty line
pub fn with_signature(content: &str, signature: Option<&str>) -> String {
    match signature.map(str::trim).filter(|s| !s.is_empty()) {
        Some(signature) => format!("{}\n\n{}", content, escape_html(signature)),
        None => content.to_string(),
    }
}

/// Turns source content into draft posts for flows
#[derive(Clone)]
pub struct Generator {
    pool: Arc<DbPool>,
    source: Arc<dyn ContentSource>,
    processor: Arc<dyn ContentProcessor>,
}

impl Generator {
    pub fn new(pool: Arc<DbPool>, source: Arc<dyn ContentSource>, processor: Arc<dyn ContentProcessor>) -> Self {
        Self {
            pool,
            source,
            processor,
        }
    }

    /// Generates draft posts for a flow.
    ///
    /// The flow's next generation time moves forward whatever the outcome, so
    /// a failing flow is retried on its normal cadence.
    pub async fn generate_for_flow(&self, flow_id: i64, allow_partial: bool) -> AppResult<Vec<Post>> {
        let flow = {
            let conn = get_connection(&self.pool)?;
            get_flow(&conn, flow_id)?.ok_or_else(|| AppError::NotFound(format!("flow {}", flow_id)))?
        };

        let result = self.generate(&flow, allow_partial).await;

        let now = Utc::now();
        let conn = get_connection(&self.pool)?;
        mark_generated(&conn, flow.id, now, now + flow.frequency.interval())?;

        match &result {
            Ok(posts) => log::info!("✨ Flow {} ({}): {} new posts", flow.id, flow.name, posts.len()),
            Err(AppError::GenerationLimitExceeded(msg)) => log::warn!("Flow {}: {}", flow.id, msg),
            Err(e) => log::error!("❌ Generation failed for flow {}: {}", flow.id, e),
        }
        result
    }

    async fn generate(&self, flow: &Flow, allow_partial: bool) -> AppResult<Vec<Post>> {
        let (user, max_to_generate) = {
            let conn = get_connection(&self.pool)?;
            let user = get_user_for_flow(&conn, flow.id)?
                .ok_or_else(|| AppError::NotFound(format!("owner of flow {}", flow.id)))?;
            let Some((_, _, tariff)) = active_plan(&conn, user.id)? else {
                log::info!("Flow {}: owner has no active subscription", flow.id);
                return Ok(Vec::new());
            };

            let remaining = tariff.generations_available - user.generated_posts_count;
            if remaining <= 0 {
                return Err(AppError::GenerationLimitExceeded(format!(
                    "❌ Ліміт генерацій досягнуто ({}/місяць)",
                    tariff.generations_available
                )));
            }

            let (telegram, web) = flow.volume_split();
            let requested = i64::from(telegram + web);
            (user, resolve_generation_volume(requested, remaining, allow_partial)?)
        };

        if max_to_generate <= 0 {
            return Ok(Vec::new());
        }

        let mut candidates = self.fetch_candidates(flow).await;
        candidates.sort_by(|a, b| b.original_date.cmp(&a.original_date));

        let mut created = Vec::new();
        for candidate in candidates {
            if created.len() as i64 >= max_to_generate {
                break;
            }
            if let Some(post) = self.create_from_candidate(flow, candidate).await? {
                created.push(post);
            }
        }

        if !created.is_empty() {
            let conn = get_connection(&self.pool)?;
            increment_generated_posts(&conn, user.id, created.len() as i64)?;
        }
        Ok(created)
    }

    /// Fetches every source of the flow concurrently; failing sources are skipped
    async fn fetch_candidates(&self, flow: &Flow) -> Vec<CandidatePost> {
        let fetches = source_limits(flow).into_iter().map(|(index, limit)| {
            let source = &flow.sources[index];
            async move { (source, self.source.fetch_latest(source, limit).await) }
        });

        let mut candidates = Vec::new();
        for (source, result) in join_all(fetches).await {
            match result {
                Ok(posts) => candidates.extend(posts),
                Err(e) => log::warn!("Source {} of flow {} failed: {}", source.link, flow.id, e),
            }
        }
        candidates
    }

    async fn create_from_candidate(&self, flow: &Flow, candidate: CandidatePost) -> AppResult<Option<Post>> {
        {
            let conn = get_connection(&self.pool)?;
            if post_exists_by_source_id(&conn, &candidate.source_id)? {
                log::debug!("Skipping duplicate post: {}", candidate.source_id);
                return Ok(None);
            }
        }

        let processed = match self.processor.process(&candidate.content, flow).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) if candidate.media.is_empty() => return Ok(None),
            Ok(text) => text,
            Err(e) => {
                log::warn!("Content processing failed for {}: {}", candidate.source_id, e);
                return Ok(None);
            }
        };
        let content = with_signature(&processed, flow.signature.as_deref());

        let conn = get_connection(&self.pool)?;
        create_post(
            &conn,
            flow.id,
            &NewPost {
                content: &content,
                original_content: Some(&candidate.content),
                source_id: Some(&candidate.source_id),
                source_url: Some(&candidate.source_url),
                original_link: candidate.original_link.as_deref(),
                original_date: candidate.original_date,
                media: &candidate.media,
            },
        )
    }
}
