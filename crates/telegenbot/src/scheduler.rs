//! Background jobs: flow generation, scheduled publication, subscription
//! expiry and the monthly generation reset
//!
//! One cycle runs every `config::scheduler::tick_interval()`. A failing job
//! is logged and the rest of the cycle still runs.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use telegencore::billing::{expire_subscriptions, Notifier};
use telegencore::config;
use telegencore::generation::Generator;
use telegencore::storage::flows::flows_due_for_generation;
use telegencore::storage::posts::due_scheduled_posts;
use telegencore::storage::users::reset_due_generation_counters;
use telegencore::{get_connection, AppError, AppResult, DbPool};

use crate::telegram::publisher::publish_post;
use crate::telegram::Bot;

/// Everything a scheduler cycle needs
#[derive(Clone)]
pub struct SchedulerDeps {
    pub bot: Bot,
    pub pool: Arc<DbPool>,
    pub generator: Generator,
    pub notifier: Arc<dyn Notifier>,
}

/// What one cycle did, for logs and tests
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub flows_generated: usize,
    pub posts_created: usize,
    pub posts_published: usize,
    pub subscriptions_expired: usize,
    pub counters_reset: usize,
}

impl CycleReport {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn expiry_text(was_trial: bool) -> &'static str {
    if was_trial {
        "⌛ Ваш пробний період завершився.\n\nОформіть підписку, щоб продовжити генерацію постів: /subscription"
    } else {
        "⌛ Термін дії вашої підписки завершився.\n\nПродовжити підписку: /subscription"
    }
}

/// Spawns the scheduler loop; it stops when `shutdown` is cancelled
pub fn start_scheduler(deps: SchedulerDeps, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config::scheduler::tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        log::info!(
            "⏰ Scheduler started, tick every {}s",
            config::scheduler::TICK_INTERVAL_SECS
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("⏰ Scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    let report = run_scheduled_jobs(&deps).await;
                    if !report.is_empty() {
                        log::info!("⏰ Scheduler cycle: {:?}", report);
                    }
                }
            }
        }
    })
}

/// Runs one scheduler cycle
pub async fn run_scheduled_jobs(deps: &SchedulerDeps) -> CycleReport {
    let mut report = CycleReport::default();

    match generate_due_flows(deps).await {
        Ok((flows, posts)) => {
            report.flows_generated = flows;
            report.posts_created = posts;
        }
        Err(e) => log::error!("Scheduler: loading due flows failed: {}", e),
    }

    match publish_due_posts(deps).await {
        Ok(published) => report.posts_published = published,
        Err(e) => log::error!("Scheduler: loading scheduled posts failed: {}", e),
    }

    match expire_due_subscriptions(deps).await {
        Ok(expired) => report.subscriptions_expired = expired,
        Err(e) => log::error!("Scheduler: subscription expiry failed: {}", e),
    }

    match get_connection(&deps.pool)
        .map_err(AppError::from)
        .and_then(|conn| reset_due_generation_counters(&conn, Utc::now()))
    {
        Ok(reset) => report.counters_reset = reset,
        Err(e) => log::error!("Scheduler: generation counter reset failed: {}", e),
    }

    report
}

async fn generate_due_flows(deps: &SchedulerDeps) -> AppResult<(usize, usize)> {
    let flows = {
        let conn = get_connection(&deps.pool)?;
        flows_due_for_generation(&conn, Utc::now())?
    };

    let mut generated = 0;
    let mut created = 0;
    for flow in flows {
        match deps.generator.generate_for_flow(flow.id, false).await {
            Ok(posts) => {
                generated += 1;
                created += posts.len();
            }
            Err(AppError::GenerationLimitExceeded(msg)) => {
                log::info!("Flow {} skipped: {}", flow.id, msg);
            }
            Err(e) => log::warn!("❌ Generation for flow {} failed: {}", flow.id, e),
        }
    }
    Ok((generated, created))
}

async fn publish_due_posts(deps: &SchedulerDeps) -> AppResult<usize> {
    let posts = {
        let conn = get_connection(&deps.pool)?;
        due_scheduled_posts(&conn, Utc::now())?
    };

    let mut published = 0;
    for post in posts {
        match publish_post(&deps.bot, &deps.pool, post.id).await {
            Ok(()) => published += 1,
            Err(e) => log::warn!("❌ Publishing scheduled post {} failed: {}", post.id, e),
        }
    }
    Ok(published)
}

async fn expire_due_subscriptions(deps: &SchedulerDeps) -> AppResult<usize> {
    let expired = {
        let conn = get_connection(&deps.pool)?;
        expire_subscriptions(&conn, Utc::now())?
    };
    for (telegram_id, was_trial) in &expired {
        deps.notifier.notify_user(*telegram_id, expiry_text(*was_trial)).await;
    }
    Ok(expired.len())
}
