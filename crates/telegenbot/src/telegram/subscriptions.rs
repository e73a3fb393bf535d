//! Subscription windows and the tariff purchase flow
//!
//! Subscription → tariff → period → payment method → pay link. Payment
//! confirmation arrives through the provider webhooks, not here.

use strum::IntoEnumIterator;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, MessageId};
use teloxide::utils::html::escape;

use telegencore::billing::limits::subscription_info;
use telegencore::billing::payments::create_payment;
use telegencore::models::{format_price, Payment, PaymentMethod, SubscriptionInfo, Tariff, TariffCode, TariffPeriod};
use telegencore::storage::billing::{get_period, get_tariff, list_active_tariffs, list_periods};
use telegencore::storage::users::get_user;
use telegencore::{get_connection, AppError, AppResult};

use crate::telegram::handlers::HandlerDeps;
use crate::telegram::menu::{back_button, format_local, show_window, Window};
use crate::telegram::{cb, Bot, CallbackData};

fn tariff_limits(tariff: &Tariff) -> String {
    format!(
        "📢 Каналів: {}\n📰 Джерел на флоу: {}\n✨ Генерацій на місяць: {}",
        tariff.channels_available, tariff.sources_available, tariff.generations_available
    )
}

fn months_label(months: i64) -> String {
    format!("{} міс.", months)
}

pub fn subscription_window(info: Option<&SubscriptionInfo>, tariffs: &[Tariff]) -> Window {
    let current = match info {
        Some(info) => format!(
            "Поточний тариф: <b>{}</b>{}\nДіє до: {}\n\n{}\n\nВикористано генерацій: {} (залишилось {})",
            escape(&info.tariff.name),
            if info.is_trial { " (пробний)" } else { "" },
            format_local(info.end_date, chrono_tz::Europe::Kiev),
            tariff_limits(&info.tariff),
            info.generations_used,
            info.generations_left()
        ),
        None => "У вас немає активної підписки.".to_string(),
    };

    let mut rows: Vec<Vec<InlineKeyboardButton>> = tariffs
        .iter()
        .filter(|t| t.code != TariffCode::Free)
        .map(|t| vec![cb(format!("💎 {}", t.name), CallbackData::Tariff(t.id))])
        .collect();
    rows.push(vec![cb("🎟 Є промокод?", CallbackData::PromoCode)]);
    rows.push(vec![back_button(CallbackData::MainMenu)]);
    Window::new(format!("💎 <b>Підписка</b>\n\n{}", current), rows)
}

pub fn promo_prompt_window() -> Window {
    Window::new(
        "🎟 Введіть промокод одним повідомленням",
        vec![vec![back_button(CallbackData::Subscription)]],
    )
}

pub fn tariff_window(tariff: &Tariff, periods: &[TariffPeriod]) -> Window {
    let mut text = format!("💎 <b>{}</b>\n\n{}", escape(&tariff.name), tariff_limits(tariff));
    if let Some(description) = &tariff.description {
        text.push_str(&format!("\n\n{}", escape(description)));
    }
    text.push_str("\n\nОберіть період:");

    let mut rows: Vec<Vec<InlineKeyboardButton>> = periods
        .iter()
        .filter(|p| p.effective_price() > 0)
        .map(|p| {
            let discount = if p.discount_percent > 0 {
                format!(" (-{}%)", p.discount_percent)
            } else {
                String::new()
            };
            vec![cb(
                format!("{} · {} грн{}", months_label(p.months), format_price(p.effective_price()), discount),
                CallbackData::Period(p.id),
            )]
        })
        .collect();
    rows.push(vec![back_button(CallbackData::Subscription)]);
    Window::new(text, rows)
}

pub fn payment_methods_window(tariff: &Tariff, period: &TariffPeriod) -> Window {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = PaymentMethod::iter()
        .map(|method| {
            vec![cb(
                method.label(),
                CallbackData::Pay {
                    period_id: period.id,
                    method,
                },
            )]
        })
        .collect();
    rows.push(vec![back_button(CallbackData::Tariff(tariff.id))]);
    Window::new(
        format!(
            "💎 <b>{}</b> · {}\nДо сплати: {} грн\n\nОберіть спосіб оплати:",
            escape(&tariff.name),
            months_label(period.months),
            format_price(period.effective_price())
        ),
        rows,
    )
}

pub fn payment_window(payment: &Payment) -> Window {
    let mut rows = Vec::new();
    if let Some(url) = payment.pay_url.as_deref().and_then(|u| url::Url::parse(u).ok()) {
        rows.push(vec![InlineKeyboardButton::url("💳 Оплатити", url)]);
    }
    rows.push(vec![back_button(CallbackData::Subscription)]);
    Window::new(
        format!(
            "🧾 Рахунок <code>{}</code> на {} грн створено.\n\nПісля оплати підписка активується автоматично.",
            escape(&payment.order_id),
            format_price(payment.amount)
        ),
        rows,
    )
}

pub async fn show_subscription(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    deps: &HandlerDeps,
    telegram_id: i64,
) -> AppResult<()> {
    let window = {
        let conn = get_connection(&deps.db_pool)?;
        let info = match get_user(&conn, telegram_id)? {
            Some(user) => subscription_info(&conn, user.id)?,
            None => None,
        };
        subscription_window(info.as_ref(), &list_active_tariffs(&conn)?)
    };
    show_window(bot, chat_id, message_id, window).await?;
    Ok(())
}

pub async fn show_tariff(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    deps: &HandlerDeps,
    tariff_id: i64,
) -> AppResult<()> {
    let window = {
        let conn = get_connection(&deps.db_pool)?;
        let tariff = get_tariff(&conn, tariff_id)?.ok_or_else(|| AppError::NotFound(format!("tariff {}", tariff_id)))?;
        tariff_window(&tariff, &list_periods(&conn, tariff.id)?)
    };
    show_window(bot, chat_id, message_id, window).await?;
    Ok(())
}

pub async fn show_payment_methods(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    deps: &HandlerDeps,
    period_id: i64,
) -> AppResult<()> {
    let window = {
        let conn = get_connection(&deps.db_pool)?;
        let period = get_period(&conn, period_id)?.ok_or_else(|| AppError::NotFound(format!("period {}", period_id)))?;
        let tariff = get_tariff(&conn, period.tariff_id)?
            .ok_or_else(|| AppError::NotFound(format!("tariff {}", period.tariff_id)))?;
        payment_methods_window(&tariff, &period)
    };
    show_window(bot, chat_id, message_id, window).await?;
    Ok(())
}

/// Creates an invoice with the chosen provider and shows its pay link
pub async fn start_payment(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    deps: &HandlerDeps,
    telegram_id: i64,
    period_id: i64,
    method: PaymentMethod,
) -> AppResult<()> {
    let payment = create_payment(&deps.db_pool, &deps.gateway, telegram_id, period_id, method).await?;
    log::info!(
        "🧾 Payment {} created for {} via {} ({})",
        payment.order_id,
        telegram_id,
        method,
        format_price(payment.amount)
    );
    show_window(bot, chat_id, message_id, payment_window(&payment)).await?;
    Ok(())
}
