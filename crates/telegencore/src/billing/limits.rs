//! Tariff limits
//!
//! Every check resolves the tariff of the user's active subscription. A user
//! without one can do nothing.

use rusqlite::Connection;

use crate::core::AppResult;
use crate::models::{SubscriptionInfo, Tariff};
use crate::storage::billing::active_plan;
use crate::storage::flows::count_user_flows;
use crate::storage::users::{decrement_generated_posts, get_user_by_id, increment_generated_posts};

/// Tariff of the user's active subscription
pub fn get_user_tariff(conn: &Connection, user_id: i64) -> AppResult<Option<Tariff>> {
    Ok(active_plan(conn, user_id)?.map(|(_, _, tariff)| tariff))
}

/// Whether the user may set up another channel; the channel count is the number of flows they own
pub fn can_add_channel(conn: &Connection, user_id: i64) -> AppResult<bool> {
    let Some(tariff) = get_user_tariff(conn, user_id)? else {
        return Ok(false);
    };
    Ok(count_user_flows(conn, user_id)? < tariff.channels_available)
}

/// Whether a flow that already has `current_sources` sources may get one more
pub fn can_add_source(conn: &Connection, user_id: i64, current_sources: usize) -> AppResult<bool> {
    let Some(tariff) = get_user_tariff(conn, user_id)? else {
        return Ok(false);
    };
    Ok((current_sources as i64) < tariff.sources_available)
}

/// Generations left this month, or `None` without an active tariff
pub fn remaining_generations(conn: &Connection, user_id: i64) -> AppResult<Option<i64>> {
    let Some(tariff) = get_user_tariff(conn, user_id)? else {
        return Ok(None);
    };
    let used = get_user_by_id(conn, user_id)?.map_or(0, |u| u.generated_posts_count);
    Ok(Some(tariff.generations_available - used))
}

/// Whether `count` more posts can be generated this month
pub fn can_generate(conn: &Connection, user_id: i64, count: i64) -> AppResult<bool> {
    Ok(remaining_generations(conn, user_id)?.is_some_and(|remaining| count <= remaining))
}

pub fn increment_generations(conn: &Connection, user_id: i64, count: i64) -> AppResult<()> {
    increment_generated_posts(conn, user_id, count)
}

/// Gives back `count` generations; the counter stays at zero or above
pub fn decrement_generations(conn: &Connection, user_id: i64, count: i64) -> AppResult<()> {
    decrement_generated_posts(conn, user_id, count)
}

/// Summary for the subscription window
pub fn subscription_info(conn: &Connection, user_id: i64) -> AppResult<Option<SubscriptionInfo>> {
    let Some((subscription, period, tariff)) = active_plan(conn, user_id)? else {
        return Ok(None);
    };
    let generations_used = get_user_by_id(conn, user_id)?.map_or(0, |u| u.generated_posts_count);
    Ok(Some(SubscriptionInfo {
        tariff,
        months: period.months,
        end_date: subscription.end_date,
        is_trial: subscription.is_trial,
        generations_used,
    }))
}
