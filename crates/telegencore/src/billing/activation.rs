use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::core::config::billing::DAYS_PER_MONTH;
use crate::core::{AppError, AppResult};
use crate::models::{format_price, Payment, Subscription, Tariff, TariffPeriod, User};
use crate::storage::billing::{
    active_plan, create_subscription, deactivate_subscription, deactivate_user_subscriptions, expired_active_subscriptions,
    get_period, get_tariff, link_payment_subscription, NewSubscription,
};
use crate::storage::users::get_user_by_id;

/// Result of turning a successful payment into a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Activated {
        subscription: Subscription,
        tariff: Tariff,
        months: i64,
        price: i64,
        telegram_id: i64,
    },
    /// The paid tariff is below the one currently active; nothing changed
    Rejected { current_level: i64, new_level: i64 },
}

impl Activation {
    /// Text sent to the user after a successful activation
    pub fn message(&self) -> Option<String> {
        match self {
            Activation::Activated {
                tariff, months, price, ..
            } => Some(format!(
                "✅ <b>Оплата успішна!</b>\n\nТариф: <b>{}</b>\nТермін: {} міс.\nСума: {} ₴",
                tariff.name,
                months,
                format_price(*price)
            )),
            Activation::Rejected { .. } => None,
        }
    }
}

/// End of a paid subscription started at `start`: months are 30-day blocks
pub fn paid_period_end(start: DateTime<Utc>, months: i64) -> DateTime<Utc> {
    start + Duration::days(months * DAYS_PER_MONTH)
}

/// Creates the subscription a successful payment paid for.
///
/// Downgrades are refused; the same level is a renewal. The payment is
/// linked to the new subscription. Runs in one transaction.
pub fn activate_subscription(conn: &Connection, payment: &Payment) -> AppResult<Activation> {
    let tx = conn.unchecked_transaction()?;
    let activation = activate_in(&tx, payment)?;
    tx.commit()?;
    Ok(activation)
}

/// Activation steps without a transaction of their own; the caller commits
pub(crate) fn activate_in(conn: &Connection, payment: &Payment) -> AppResult<Activation> {
    let period_id = payment
        .tariff_period_id
        .ok_or_else(|| AppError::Validation(format!("payment {} has no tariff period", payment.order_id)))?;
    let period = get_period(conn, period_id)?.ok_or_else(|| AppError::NotFound(format!("tariff period {}", period_id)))?;
    let tariff = get_tariff(conn, period.tariff_id)?
        .ok_or_else(|| AppError::NotFound(format!("tariff {}", period.tariff_id)))?;
    let user = get_user_by_id(conn, payment.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", payment.user_id)))?;

    let subscription = match grant_period(conn, &user, &period, &tariff)? {
        Grant::Granted(subscription) => subscription,
        Grant::Downgrade {
            current_level,
            new_level,
        } => {
            return Ok(Activation::Rejected {
                current_level,
                new_level,
            })
        }
    };
    link_payment_subscription(conn, payment.id, subscription.id)?;

    Ok(Activation::Activated {
        subscription,
        tariff,
        months: period.months,
        price: payment.amount,
        telegram_id: user.telegram_id,
    })
}

/// Outcome of granting a period to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Grant {
    Granted(Subscription),
    Downgrade { current_level: i64, new_level: i64 },
}

/// Replaces the user's active subscriptions with one for `period`.
///
/// A tariff below the active one is refused and nothing changes; the same
/// level is a renewal. Shared by payments and promo codes.
pub(crate) fn grant_period(conn: &Connection, user: &User, period: &TariffPeriod, tariff: &Tariff) -> AppResult<Grant> {
    if let Some((_, _, current)) = active_plan(conn, user.id)? {
        if tariff.level < current.level {
            log::warn!(
                "⛔ Downgrade refused for user {}: {} (level {}) -> {} (level {})",
                user.telegram_id,
                current.code,
                current.level,
                tariff.code,
                tariff.level
            );
            return Ok(Grant::Downgrade {
                current_level: current.level,
                new_level: tariff.level,
            });
        }
    }

    deactivate_user_subscriptions(conn, user.id)?;
    let start = Utc::now();
    let subscription = create_subscription(
        conn,
        &NewSubscription {
            user_id: user.id,
            tariff_period_id: period.id,
            start_date: start,
            end_date: paid_period_end(start, period.months),
            is_trial: false,
        },
    )?;

    log::info!(
        "💎 Subscription {} activated for user {}: {} × {} міс.",
        subscription.id,
        user.telegram_id,
        tariff.name,
        period.months
    );
    Ok(Grant::Granted(subscription))
}

/// Deactivates subscriptions that ended before `now`.
///
/// Returns `(telegram_id, was_trial)` for every expired subscription so the
/// caller can notify the owners.
pub fn expire_subscriptions(conn: &Connection, now: DateTime<Utc>) -> AppResult<Vec<(i64, bool)>> {
    let mut expired = Vec::new();
    for sub in expired_active_subscriptions(conn, now)? {
        deactivate_subscription(conn, sub.id)?;
        if let Some(user) = get_user_by_id(conn, sub.user_id)? {
            expired.push((user.telegram_id, sub.is_trial));
        }
    }
    if !expired.is_empty() {
        log::info!("⌛ Expired {} subscription(s)", expired.len());
    }
    Ok(expired)
}
