use uuid::Uuid;

use crate::billing::invoices::PaymentGateway;
use crate::core::{AppError, AppResult};
use crate::models::{Payment, PaymentMethod};
use crate::storage::billing::{self, get_period, get_tariff, NewPayment};
use crate::storage::users::get_user;
use crate::storage::{get_connection, DbPool};

/// Order id sent to the provider: `ORDER_{telegram_id}_{8 hex chars}`
pub fn new_order_id(telegram_id: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORDER_{}_{}", telegram_id, &suffix[..8])
}

/// Creates a provider invoice for a tariff period and stores it as a pending payment.
///
/// The connection is released while the provider is called.
pub async fn create_payment(
    pool: &DbPool,
    gateway: &PaymentGateway,
    telegram_id: i64,
    tariff_period_id: i64,
    method: PaymentMethod,
) -> AppResult<Payment> {
    let (user, period, tariff) = {
        let conn = get_connection(pool)?;
        let user = get_user(&conn, telegram_id)?.ok_or_else(|| AppError::NotFound(format!("user {}", telegram_id)))?;
        let period = get_period(&conn, tariff_period_id)?
            .ok_or_else(|| AppError::NotFound(format!("tariff period {}", tariff_period_id)))?;
        let tariff = get_tariff(&conn, period.tariff_id)?
            .ok_or_else(|| AppError::NotFound(format!("tariff {}", period.tariff_id)))?;
        (user, period, tariff)
    };

    let amount = period.effective_price();
    if amount <= 0 {
        return Err(AppError::Validation(format!(
            "tariff {} for {} months is free and cannot be paid",
            tariff.code, period.months
        )));
    }

    let order_id = new_order_id(telegram_id);
    let description = format!("Telegen {}, {} міс.", tariff.name, period.months);
    let invoice = gateway.create_invoice(method, &order_id, amount, &description).await?;

    let conn = get_connection(pool)?;
    let payment = billing::create_payment(
        &conn,
        &NewPayment {
            user_id: user.id,
            amount,
            payment_method: method,
            tariff_period_id: Some(period.id),
            order_id: &order_id,
            external_id: invoice.external_id.as_deref(),
            pay_url: Some(&invoice.pay_url),
        },
    )?;

    log::info!(
        "💳 Payment {} created for user {}: {} via {}",
        payment.order_id,
        telegram_id,
        crate::models::format_price(amount),
        method
    );
    Ok(payment)
}
