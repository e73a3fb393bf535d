//! Promo codes: a code grants its (tariff, months) period without payment

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::billing::activation::{grant_period, Grant};
use crate::core::{AppError, AppResult};
use crate::models::{PromoCode, Subscription, Tariff, TariffCode};
use crate::storage::billing::{
    create_promo_code, get_active_promo_code, get_period_for, get_tariff, get_tariff_by_code,
    link_redemption_subscription, record_promo_redemption,
};
use crate::storage::users::get_user_by_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoOutcome {
    Activated {
        subscription: Subscription,
        tariff: Tariff,
        months: i64,
    },
    /// The code's tariff is below the active one; the code stays unused
    Rejected { current_level: i64, new_level: i64 },
    /// Unknown, inactive, or pointing at a period that no longer exists
    Invalid,
    AlreadyUsed,
}

impl PromoOutcome {
    /// Text shown to the user who entered the code
    pub fn message(&self) -> String {
        match self {
            PromoOutcome::Activated { tariff, months, .. } => format!(
                "🎉 <b>Вітаємо!</b> Підписку активовано за промокодом.\n\nТариф: <b>{}</b>\nТермін: {} міс.",
                tariff.name, months
            ),
            PromoOutcome::Rejected { .. } => {
                "⛔ Промокод на нижчий тариф, ніж ваш поточний, не може бути застосований".to_string()
            }
            PromoOutcome::Invalid => "❌ Промокод недійсний".to_string(),
            PromoOutcome::AlreadyUsed => "⚠️ Ви вже використали цей промокод".to_string(),
        }
    }
}

/// Adds a promo code for an existing (tariff, months) period
pub fn add_promo_code(conn: &Connection, code: &str, tariff: TariffCode, months: i64) -> AppResult<PromoCode> {
    let stored = get_tariff_by_code(conn, tariff)?.ok_or_else(|| AppError::NotFound(format!("tariff {}", tariff)))?;
    if get_period_for(conn, stored.id, months)?.is_none() {
        return Err(AppError::NotFound(format!("{} period of {} month(s)", tariff, months)));
    }
    let promo = create_promo_code(conn, code, stored.id, months)?;
    log::info!("🎟 Promo code {} added: {} × {} міс.", promo.code, tariff, months);
    Ok(promo)
}

/// Redeems `code` for the user with internal id `user_id`.
///
/// Each user may use a code once. The downgrade rule of paid activation
/// applies; a refused code is not marked as used. Runs in one immediate
/// transaction.
pub fn redeem_promo_code(conn: &Connection, user_id: i64, code: &str) -> AppResult<PromoOutcome> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let Some(promo) = get_active_promo_code(&tx, code)? else {
        log::info!("🎟 Unknown promo code '{}' from user {}", code.trim(), user_id);
        return Ok(PromoOutcome::Invalid);
    };
    let (Some(period), Some(tariff)) = (
        get_period_for(&tx, promo.tariff_id, promo.months)?,
        get_tariff(&tx, promo.tariff_id)?,
    ) else {
        log::warn!("🎟 Promo code {} points at a missing period", promo.code);
        return Ok(PromoOutcome::Invalid);
    };
    let user = get_user_by_id(&tx, user_id)?.ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

    if !record_promo_redemption(&tx, promo.id, user.id)? {
        return Ok(PromoOutcome::AlreadyUsed);
    }
    let subscription = match grant_period(&tx, &user, &period, &tariff)? {
        Grant::Granted(subscription) => subscription,
        // dropping the transaction rolls the redemption back
        Grant::Downgrade {
            current_level,
            new_level,
        } => {
            return Ok(PromoOutcome::Rejected {
                current_level,
                new_level,
            })
        }
    };
    link_redemption_subscription(&tx, promo.id, user.id, subscription.id)?;
    tx.commit()?;

    log::info!("🎟 Promo code {} redeemed by user {}", promo.code, user.telegram_id);
    Ok(PromoOutcome::Activated {
        subscription,
        tariff,
        months: period.months,
    })
}
