//! Payment provider callbacks
//!
//! Authentication and status codes live here; payment semantics are in
//! `telegencore::billing::webhooks`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use secrecy::ExposeSecret;
use serde_json::json;

use telegencore::billing::signature::{verify_cryptobot_signature, verify_shared_token, CRYPTOBOT_SIGNATURE_HEADER};
use telegencore::billing::webhooks::{
    handle_cryptobot_update, handle_monobank_update, parse_cryptobot_update, parse_monobank_update,
};
use telegencore::billing::WebhookOutcome;
use telegencore::{get_connection, AppResult};

use super::server::WebhookState;

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn method_not_allowed() -> Response {
    error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn ok() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// Runs a synchronous payment handler and sends the resulting notification
async fn process(
    state: &WebhookState,
    provider: &str,
    handle: impl FnOnce(&rusqlite::Connection) -> AppResult<WebhookOutcome>,
) -> Response {
    let outcome = get_connection(&state.pool)
        .map_err(Into::into)
        .and_then(|conn| handle(&conn));

    match outcome {
        Ok(outcome) => {
            log::info!("💳 {} webhook processed: {:?}", provider, outcome);
            if let Some((telegram_id, text)) = outcome.notification() {
                state.notifier.notify_user(telegram_id, &text).await;
            }
            ok()
        }
        Err(e) => {
            log::warn!("{} webhook rejected: {}", provider, e);
            error(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

/// `GET` answers Monobank's liveness check, `POST` carries an invoice status update
pub async fn monobank_webhook(
    method: Method,
    State(state): State<Arc<WebhookState>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if method == Method::GET {
        return (StatusCode::OK, "OK").into_response();
    }
    if method != Method::POST {
        return method_not_allowed();
    }

    if let Some(secret) = &state.monobank_secret {
        if let Err(e) = verify_shared_token(secret.expose_secret(), query.get("token").map(String::as_str)) {
            log::warn!("Monobank webhook with bad token: {}", e);
            return error(StatusCode::FORBIDDEN, e.to_string());
        }
    }

    let update = match parse_monobank_update(&body) {
        Ok(update) => update,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    process(&state, "Monobank", |conn| handle_monobank_update(conn, &update)).await
}

/// Crypto Pay update, signed with the API token
pub async fn cryptobot_webhook(
    method: Method,
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }

    let Some(token) = &state.cryptobot_token else {
        log::warn!("CryptoBot webhook received but CRYPTOBOT_TOKEN is not set");
        return error(StatusCode::UNAUTHORIZED, "CryptoBot is not configured");
    };
    let signature = headers
        .get(CRYPTOBOT_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = verify_cryptobot_signature(token.expose_secret(), &body, signature) {
        log::warn!("CryptoBot webhook with bad signature: {}", e);
        return error(StatusCode::UNAUTHORIZED, e.to_string());
    }

    let update = match parse_cryptobot_update(&body) {
        Ok(update) => update,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    process(&state, "CryptoBot", |conn| handle_cryptobot_update(conn, &update)).await
}
