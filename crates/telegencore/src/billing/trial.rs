use chrono::{Duration, Utc};
use rusqlite::Connection;

use crate::core::config::billing::TRIAL_PERIOD_MONTHS;
use crate::core::AppResult;
use crate::models::{Subscription, TariffCode, User};
use crate::storage::billing::{
    count_active_subscriptions, create_subscription, get_period_for, get_tariff_by_code, NewSubscription,
};
use crate::storage::users::{create_user, get_user, update_profile, NewUser};

/// Grants the free-tariff trial to a freshly created user.
///
/// Creates nothing when the user already has an active subscription, when
/// there is no active `free` tariff, or when that tariff has no 1-month period.
pub fn create_trial_subscription(conn: &Connection, user_id: i64) -> AppResult<Option<Subscription>> {
    if count_active_subscriptions(conn, user_id)? > 0 {
        return Ok(None);
    }

    let tariff = match get_tariff_by_code(conn, TariffCode::Free)? {
        Some(tariff) if tariff.is_active => tariff,
        _ => {
            log::warn!("No active free tariff, user {} gets no trial", user_id);
            return Ok(None);
        }
    };

    let Some(period) = get_period_for(conn, tariff.id, TRIAL_PERIOD_MONTHS)? else {
        log::warn!("Free tariff has no {}-month period, user {} gets no trial", TRIAL_PERIOD_MONTHS, user_id);
        return Ok(None);
    };

    let start = Utc::now();
    let subscription = create_subscription(
        conn,
        &NewSubscription {
            user_id,
            tariff_period_id: period.id,
            start_date: start,
            end_date: start + Duration::days(tariff.trial_duration_days),
            is_trial: true,
        },
    )?;

    log::info!(
        "🎁 Trial subscription {} for user {} until {}",
        subscription.id,
        user_id,
        subscription.end_date
    );
    Ok(Some(subscription))
}

/// Returns the user for `new_user.telegram_id`, creating it on first contact.
///
/// Creation and the trial grant run in one transaction. The boolean is true
/// when the user was created.
pub fn ensure_user(conn: &Connection, new_user: &NewUser<'_>) -> AppResult<(User, bool)> {
    if let Some(existing) = get_user(conn, new_user.telegram_id)? {
        if existing.username.as_deref() != new_user.username || existing.first_name.as_deref() != new_user.first_name {
            update_profile(conn, new_user)?;
        }
        return Ok((existing, false));
    }

    let tx = conn.unchecked_transaction()?;
    let user = create_user(&tx, new_user)?;
    create_trial_subscription(&tx, user.id)?;
    tx.commit()?;

    log::info!("👤 New user {} ({})", user.telegram_id, user.display_name());
    Ok((user, true))
}
