//! HTTP endpoints for the payment providers
//!
//! - `/webhook/monobank/`: invoice status callbacks, shared-token auth
//! - `/webhook/cryptobot/`: Crypto Pay updates, HMAC-signed
//! - `/health`: liveness

mod server;
mod webhooks;

pub use server::{create_router, run_webhook_server, WebhookState};
