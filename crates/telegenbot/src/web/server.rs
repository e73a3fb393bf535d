use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;

use telegencore::billing::{Notifier, PaymentGateway};
use telegencore::DbPool;

use super::webhooks::{cryptobot_webhook, monobank_webhook};

/// Shared state for the webhook server
#[derive(Clone)]
pub struct WebhookState {
    pub pool: Arc<DbPool>,
    pub notifier: Arc<dyn Notifier>,
    pub monobank_secret: Option<SecretString>,
    pub cryptobot_token: Option<SecretString>,
}

impl WebhookState {
    /// Takes the webhook credentials from the payment gateway configuration
    pub fn new(pool: Arc<DbPool>, notifier: Arc<dyn Notifier>, gateway: &PaymentGateway) -> Self {
        Self {
            pool,
            notifier,
            monobank_secret: gateway.config().monobank_webhook_secret.clone(),
            cryptobot_token: gateway.config().cryptobot_token.clone(),
        }
    }
}

pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/monobank/", any(monobank_webhook))
        .route("/webhook/cryptobot/", any(cryptobot_webhook))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

/// Starts the webhook server on `0.0.0.0:port`
pub async fn run_webhook_server(port: u16, state: WebhookState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_router(state);

    log::info!("Starting webhook server on http://{}", addr);
    log::info!("  /webhook/monobank/   - Monobank invoice updates");
    log::info!("  /webhook/cryptobot/  - CryptoBot updates");
    log::info!("  /health              - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
