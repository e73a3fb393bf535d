//! Tariffs, tariff periods, subscriptions and payments

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{AppError, AppResult};
use crate::models::{Payment, PaymentMethod, Platform, PromoCode, Subscription, Tariff, TariffCode, TariffPeriod};

/// Tariff fields written by `seed-tariffs`
#[derive(Debug, Clone)]
pub struct NewTariff<'a> {
    pub code: TariffCode,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub channels_available: i64,
    pub sources_available: i64,
    pub generations_available: i64,
    pub platform: Platform,
    pub trial_duration_days: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct NewSubscription {
    pub user_id: i64,
    pub tariff_period_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_trial: bool,
}

#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub user_id: i64,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub tariff_period_id: Option<i64>,
    pub order_id: &'a str,
    pub external_id: Option<&'a str>,
    pub pay_url: Option<&'a str>,
}

// ==================== Tariffs ====================

pub fn get_tariff(conn: &Connection, id: i64) -> AppResult<Option<Tariff>> {
    let sql = format!("SELECT {} FROM tariffs WHERE id = ?1", Tariff::COLUMNS);
    Ok(conn.query_row(&sql, [id], Tariff::from_row).optional()?)
}

pub fn get_tariff_by_code(conn: &Connection, code: TariffCode) -> AppResult<Option<Tariff>> {
    let sql = format!("SELECT {} FROM tariffs WHERE code = ?1", Tariff::COLUMNS);
    Ok(conn.query_row(&sql, [code], Tariff::from_row).optional()?)
}

pub fn list_active_tariffs(conn: &Connection) -> AppResult<Vec<Tariff>> {
    let sql = format!("SELECT {} FROM tariffs WHERE is_active = 1 ORDER BY level", Tariff::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let tariffs = stmt.query_map([], Tariff::from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(tariffs)
}

/// Inserts or updates a tariff by code. Returns the stored row and whether it was inserted.
pub fn upsert_tariff(conn: &Connection, tariff: &NewTariff<'_>) -> AppResult<(Tariff, bool)> {
    let existed = get_tariff_by_code(conn, tariff.code)?.is_some();
    conn.execute(
        "INSERT INTO tariffs (code, name, description, level, channels_available, sources_available,
                              generations_available, platform, is_active, trial_duration_days)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)
         ON CONFLICT(code) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            level = excluded.level,
            channels_available = excluded.channels_available,
            sources_available = excluded.sources_available,
            generations_available = excluded.generations_available,
            platform = excluded.platform,
            is_active = 1,
            trial_duration_days = excluded.trial_duration_days",
        params![
            tariff.code,
            tariff.name,
            tariff.description,
            tariff.code.level(),
            tariff.channels_available,
            tariff.sources_available,
            tariff.generations_available,
            tariff.platform,
            tariff.trial_duration_days,
        ],
    )?;

    let stored = get_tariff_by_code(conn, tariff.code)?
        .ok_or_else(|| AppError::NotFound(format!("tariff {}", tariff.code)))?;
    Ok((stored, !existed))
}

/// Deletes all tariffs; their periods and subscriptions cascade
pub fn delete_all_tariffs(conn: &Connection) -> AppResult<usize> {
    Ok(conn.execute("DELETE FROM tariffs", [])?)
}

// ==================== Periods ====================

pub fn get_period(conn: &Connection, id: i64) -> AppResult<Option<TariffPeriod>> {
    let sql = format!("SELECT {} FROM tariff_periods WHERE id = ?1", TariffPeriod::COLUMNS);
    Ok(conn.query_row(&sql, [id], TariffPeriod::from_row).optional()?)
}

pub fn get_period_for(conn: &Connection, tariff_id: i64, months: i64) -> AppResult<Option<TariffPeriod>> {
    let sql = format!(
        "SELECT {} FROM tariff_periods WHERE tariff_id = ?1 AND months = ?2",
        TariffPeriod::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![tariff_id, months], TariffPeriod::from_row)
        .optional()?)
}

pub fn list_periods(conn: &Connection, tariff_id: i64) -> AppResult<Vec<TariffPeriod>> {
    let sql = format!(
        "SELECT {} FROM tariff_periods WHERE tariff_id = ?1 ORDER BY months",
        TariffPeriod::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let periods = stmt
        .query_map([tariff_id], TariffPeriod::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(periods)
}

/// Inserts or updates the price of a (tariff, months) period. Returns whether it was inserted.
pub fn upsert_period(conn: &Connection, tariff_id: i64, months: i64, price: i64) -> AppResult<bool> {
    let existed = get_period_for(conn, tariff_id, months)?.is_some();
    conn.execute(
        "INSERT INTO tariff_periods (tariff_id, months, price) VALUES (?1, ?2, ?3)
         ON CONFLICT(tariff_id, months) DO UPDATE SET price = excluded.price",
        params![tariff_id, months, price],
    )?;
    Ok(!existed)
}

// ==================== Subscriptions ====================

pub fn create_subscription(conn: &Connection, sub: &NewSubscription) -> AppResult<Subscription> {
    conn.execute(
        "INSERT INTO subscriptions (user_id, tariff_period_id, start_date, end_date, is_active, is_trial)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![
            sub.user_id,
            sub.tariff_period_id,
            sub.start_date,
            sub.end_date,
            sub.is_trial
        ],
    )?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {} FROM subscriptions WHERE id = ?1", Subscription::COLUMNS);
    Ok(conn.query_row(&sql, [id], Subscription::from_row)?)
}

/// The user's active subscription; the newest one if several are flagged active
pub fn get_active_subscription(conn: &Connection, user_id: i64) -> AppResult<Option<Subscription>> {
    let sql = format!(
        "SELECT {} FROM subscriptions WHERE user_id = ?1 AND is_active = 1 ORDER BY end_date DESC, id DESC LIMIT 1",
        Subscription::COLUMNS
    );
    Ok(conn.query_row(&sql, [user_id], Subscription::from_row).optional()?)
}

pub fn count_active_subscriptions(conn: &Connection, user_id: i64) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1 AND is_active = 1",
        [user_id],
        |row| row.get(0),
    )?)
}

/// Deactivates every active subscription of the user. Returns how many were touched.
pub fn deactivate_user_subscriptions(conn: &Connection, user_id: i64) -> AppResult<usize> {
    Ok(conn.execute(
        "UPDATE subscriptions SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
        [user_id],
    )?)
}

pub fn deactivate_subscription(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute("UPDATE subscriptions SET is_active = 0 WHERE id = ?1", [id])?;
    Ok(())
}

/// Active subscriptions that ended before `now`
pub fn expired_active_subscriptions(conn: &Connection, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
    let sql = format!(
        "SELECT {} FROM subscriptions WHERE is_active = 1 AND end_date < ?1",
        Subscription::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let subs = stmt
        .query_map([now], Subscription::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subs)
}

/// Tariff and period behind the user's active subscription
pub fn active_plan(conn: &Connection, user_id: i64) -> AppResult<Option<(Subscription, TariffPeriod, Tariff)>> {
    let Some(sub) = get_active_subscription(conn, user_id)? else {
        return Ok(None);
    };
    let Some(period) = get_period(conn, sub.tariff_period_id)? else {
        return Ok(None);
    };
    let Some(tariff) = get_tariff(conn, period.tariff_id)? else {
        return Ok(None);
    };
    Ok(Some((sub, period, tariff)))
}

// ==================== Promo codes ====================

/// Stores a new active promo code; the code is normalized first
pub fn create_promo_code(conn: &Connection, code: &str, tariff_id: i64, months: i64) -> AppResult<PromoCode> {
    let code = PromoCode::normalize(code);
    if code.is_empty() {
        return Err(AppError::Validation("promo code is empty".to_string()));
    }
    conn.execute(
        "INSERT INTO promo_codes (code, tariff_id, months, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        params![code, tariff_id, months, Utc::now()],
    )?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {} FROM promo_codes WHERE id = ?1", PromoCode::COLUMNS);
    Ok(conn.query_row(&sql, [id], PromoCode::from_row)?)
}

/// Active promo code matching `code` case-insensitively
pub fn get_active_promo_code(conn: &Connection, code: &str) -> AppResult<Option<PromoCode>> {
    let sql = format!(
        "SELECT {} FROM promo_codes WHERE code = ?1 AND is_active = 1",
        PromoCode::COLUMNS
    );
    Ok(conn
        .query_row(&sql, [PromoCode::normalize(code)], PromoCode::from_row)
        .optional()?)
}

pub fn set_promo_code_active(conn: &Connection, id: i64, active: bool) -> AppResult<()> {
    conn.execute("UPDATE promo_codes SET is_active = ?2 WHERE id = ?1", params![id, active])?;
    Ok(())
}

/// Records that `user_id` used the code. Returns false when they already had.
pub fn record_promo_redemption(conn: &Connection, promo_code_id: i64, user_id: i64) -> AppResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO promo_redemptions (promo_code_id, user_id, redeemed_at) VALUES (?1, ?2, ?3)",
        params![promo_code_id, user_id, Utc::now()],
    )?;
    Ok(inserted == 1)
}

pub fn link_redemption_subscription(
    conn: &Connection,
    promo_code_id: i64,
    user_id: i64,
    subscription_id: i64,
) -> AppResult<()> {
    conn.execute(
        "UPDATE promo_redemptions SET subscription_id = ?3 WHERE promo_code_id = ?1 AND user_id = ?2",
        params![promo_code_id, user_id, subscription_id],
    )?;
    Ok(())
}

// ==================== Payments ====================

pub fn create_payment(conn: &Connection, payment: &NewPayment<'_>) -> AppResult<Payment> {
    conn.execute(
        "INSERT INTO payments (user_id, amount, payment_method, payment_date, is_successful, tariff_period_id,
                               order_id, external_id, pay_url)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8)",
        params![
            payment.user_id,
            payment.amount,
            payment.payment_method,
            Utc::now(),
            payment.tariff_period_id,
            payment.order_id,
            payment.external_id,
            payment.pay_url,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_payment(conn, id)?.ok_or_else(|| AppError::NotFound(format!("payment {}", id)))
}

pub fn get_payment(conn: &Connection, id: i64) -> AppResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = ?1", Payment::COLUMNS);
    Ok(conn.query_row(&sql, [id], Payment::from_row).optional()?)
}

pub fn get_payment_by_order_id(conn: &Connection, order_id: &str) -> AppResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE order_id = ?1", Payment::COLUMNS);
    Ok(conn.query_row(&sql, [order_id], Payment::from_row).optional()?)
}

pub fn get_payment_by_external_id(conn: &Connection, external_id: &str) -> AppResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE external_id = ?1", Payment::COLUMNS);
    Ok(conn.query_row(&sql, [external_id], Payment::from_row).optional()?)
}

pub fn set_payment_status(conn: &Connection, id: i64, successful: bool) -> AppResult<()> {
    conn.execute(
        "UPDATE payments SET is_successful = ?2, payment_date = ?3 WHERE id = ?1",
        params![id, successful, Utc::now()],
    )?;
    Ok(())
}

/// Marks a pending payment successful. Returns false when it already was,
/// so only one of several concurrent deliveries goes on to activate.
pub fn claim_payment(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE payments SET is_successful = 1, payment_date = ?2 WHERE id = ?1 AND is_successful = 0",
        params![id, Utc::now()],
    )?;
    Ok(changed == 1)
}

pub fn set_payment_external_id(conn: &Connection, id: i64, external_id: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE payments SET external_id = ?2 WHERE id = ?1",
        params![id, external_id],
    )?;
    Ok(())
}

pub fn link_payment_subscription(conn: &Connection, payment_id: i64, subscription_id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE payments SET subscription_id = ?2 WHERE id = ?1",
        params![payment_id, subscription_id],
    )?;
    Ok(())
}
