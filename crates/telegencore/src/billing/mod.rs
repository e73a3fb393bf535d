//! Subscriptions and payments
//!
//! - `trial`: free-tariff subscription granted when a user is created
//! - `activation`: turning a successful payment into a subscription, expiry
//! - `webhooks`: Monobank / CryptoBot callback payloads and their handling
//! - `signature`: webhook authenticity checks
//! - `invoices`: provider API clients
//! - `payments`: creating a payment for a tariff period
//! - `promo`: promo codes that grant a period without payment
//! - `limits`: channel, source and generation limits of the active tariff

pub mod activation;
pub mod invoices;
pub mod limits;
pub mod payments;
pub mod promo;
pub mod signature;
pub mod trial;
pub mod webhooks;

use async_trait::async_trait;

pub use activation::{activate_subscription, expire_subscriptions, Activation};
pub use invoices::{Invoice, PaymentGateway};
pub use promo::{add_promo_code, redeem_promo_code, PromoOutcome};
pub use trial::{create_trial_subscription, ensure_user};
pub use webhooks::{handle_cryptobot_update, handle_monobank_update, WebhookOutcome};

/// Delivers user-facing billing messages (payment success, expiry)
///
/// Implemented by the bot crate on top of `teloxide::Bot`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_user(&self, telegram_id: i64, text: &str);
}

/// Notifier that only logs; used by CLI commands and when no bot is running
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_user(&self, telegram_id: i64, text: &str) {
        log::info!("📨 Notification for {}: {}", telegram_id, text);
    }
}
