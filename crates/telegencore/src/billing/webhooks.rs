//! Monobank and CryptoBot payment callbacks
//!
//! Both handlers are synchronous and work on a single connection. The HTTP
//! layer parses nothing itself: it passes the raw body here and maps the
//! returned error to a status code.

use std::fmt;

use lazy_regex::regex_captures;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Deserialize;

use crate::billing::activation::{activate_in, Activation};
use crate::core::{AppError, AppResult};
use crate::models::Payment;
use crate::storage::billing::{
    claim_payment, get_payment, get_payment_by_external_id, get_payment_by_order_id, set_payment_status,
};

/// Monobank invoice status callback
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonobankUpdate {
    pub invoice_id: Option<String>,
    pub status: String,
    pub reference: Option<String>,
}

/// Crypto Pay webhook update
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoBotUpdate {
    pub update_type: String,
    pub payload: Option<CryptoBotInvoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoBotInvoice {
    pub invoice_id: Option<InvoiceId>,
    pub status: Option<String>,
    pub hidden_message: Option<String>,
}

/// Crypto Pay sends numeric invoice ids; string ids are accepted too
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InvoiceId {
    Number(i64),
    Text(String),
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceId::Number(n) => write!(f, "{}", n),
            InvoiceId::Text(s) => f.write_str(s),
        }
    }
}

/// What a webhook did to the payment it referenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment marked successful; the activation result decides whether a
    /// subscription was created
    Paid(Activation),
    MarkedFailed { order_id: String },
    AlreadyProcessed { order_id: String },
    Ignored,
}

impl WebhookOutcome {
    /// Telegram id and text to notify, if the outcome warrants a message
    pub fn notification(&self) -> Option<(i64, String)> {
        match self {
            WebhookOutcome::Paid(activation @ Activation::Activated { telegram_id, .. }) => {
                activation.message().map(|text| (*telegram_id, text))
            }
            _ => None,
        }
    }
}

/// Extracts the order id from a CryptoBot `hidden_message` ("Order ORDER_1_ab12cd34")
pub fn order_id_from_hidden_message(message: &str) -> Option<&str> {
    regex_captures!(r"Order\s+(\S+)", message).map(|(_, order_id)| order_id)
}

pub fn parse_monobank_update(body: &[u8]) -> AppResult<MonobankUpdate> {
    Ok(serde_json::from_slice(body)?)
}

pub fn parse_cryptobot_update(body: &[u8]) -> AppResult<CryptoBotUpdate> {
    Ok(serde_json::from_slice(body)?)
}

/// Handles a Monobank invoice status update.
///
/// The payment is found by `invoiceId`, then by `reference`. `success`
/// activates, `failure` and `expired` mark it failed, other statuses are
/// logged only.
pub fn handle_monobank_update(conn: &Connection, update: &MonobankUpdate) -> AppResult<WebhookOutcome> {
    let by_invoice = match update.invoice_id.as_deref() {
        Some(invoice_id) => get_payment_by_external_id(conn, invoice_id)?,
        None => None,
    };
    let payment = match (by_invoice, update.reference.as_deref(), update.invoice_id.as_deref()) {
        (Some(payment), _, _) => payment,
        (None, Some(reference), _) => get_payment_by_order_id(conn, reference)?
            .ok_or_else(|| AppError::NotFound(format!("payment for order {}", reference)))?,
        (None, None, Some(invoice_id)) => {
            return Err(AppError::NotFound(format!("payment for invoice {}", invoice_id)));
        }
        (None, None, None) => {
            return Err(AppError::Validation(
                "Monobank update has neither invoiceId nor reference".to_string(),
            ))
        }
    };

    log::info!(
        "🏦 Monobank update for order {}: status={}",
        payment.order_id,
        update.status
    );

    match update.status.as_str() {
        "success" => mark_paid(conn, &payment),
        "failure" | "expired" => mark_failed(conn, &payment),
        other => {
            log::info!("Monobank status '{}' for order {} needs no action", other, payment.order_id);
            Ok(WebhookOutcome::Ignored)
        }
    }
}

/// Handles a Crypto Pay update. Only `invoice_paid` updates are acted upon.
pub fn handle_cryptobot_update(conn: &Connection, update: &CryptoBotUpdate) -> AppResult<WebhookOutcome> {
    if update.update_type != "invoice_paid" {
        log::info!("CryptoBot update '{}' ignored", update.update_type);
        return Ok(WebhookOutcome::Ignored);
    }
    let invoice = update
        .payload
        .as_ref()
        .ok_or_else(|| AppError::Validation("CryptoBot update has no payload".to_string()))?;

    let order_id = invoice.hidden_message.as_deref().and_then(order_id_from_hidden_message);
    let payment = match (order_id, invoice.invoice_id.as_ref()) {
        (Some(order_id), _) => get_payment_by_order_id(conn, order_id)?,
        (None, Some(invoice_id)) => get_payment_by_external_id(conn, &invoice_id.to_string())?,
        (None, None) => {
            return Err(AppError::Validation(
                "CryptoBot update has neither order id nor invoice_id".to_string(),
            ))
        }
    }
    .ok_or_else(|| AppError::NotFound("payment for CryptoBot invoice".to_string()))?;

    let status = invoice.status.as_deref().unwrap_or("paid");
    log::info!("🪙 CryptoBot update for order {}: status={}", payment.order_id, status);

    match status {
        "paid" => mark_paid(conn, &payment),
        "expired" => mark_failed(conn, &payment),
        other => {
            log::info!("CryptoBot status '{}' for order {} needs no action", other, payment.order_id);
            Ok(WebhookOutcome::Ignored)
        }
    }
}

/// Marks the payment successful and activates what it paid for, all in one
/// immediate transaction. A failed activation rolls the status back so the
/// provider's retry can try again; a payment that is already successful is
/// reported as processed.
fn mark_paid(conn: &Connection, payment: &Payment) -> AppResult<WebhookOutcome> {
    let already_processed = || -> AppResult<WebhookOutcome> {
        log::info!("Payment {} already processed", payment.order_id);
        Ok(WebhookOutcome::AlreadyProcessed {
            order_id: payment.order_id.clone(),
        })
    };
    if payment.is_successful {
        return already_processed();
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if !claim_payment(&tx, payment.id)? {
        return already_processed();
    }
    let payment = get_payment(&tx, payment.id)?.ok_or_else(|| AppError::NotFound(format!("payment {}", payment.id)))?;
    let activation = activate_in(&tx, &payment)?;
    tx.commit()?;

    log::info!("✅ Payment {} succeeded", payment.order_id);
    Ok(WebhookOutcome::Paid(activation))
}

fn mark_failed(conn: &Connection, payment: &Payment) -> AppResult<WebhookOutcome> {
    if payment.is_successful {
        return Ok(WebhookOutcome::AlreadyProcessed {
            order_id: payment.order_id.clone(),
        });
    }
    set_payment_status(conn, payment.id, false)?;
    log::warn!("❌ Payment {} failed or expired", payment.order_id);
    Ok(WebhookOutcome::MarkedFailed {
        order_id: payment.order_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_from_hidden_message() {
        assert_eq!(order_id_from_hidden_message("Order ORDER_42_ab12cd34"), Some("ORDER_42_ab12cd34"));
        assert_eq!(order_id_from_hidden_message("Order   X1 trailing"), Some("X1"));
        assert_eq!(order_id_from_hidden_message("no order here"), None);
    }

    #[test]
    fn test_parse_cryptobot_numeric_and_string_invoice_id() {
        let numeric = parse_cryptobot_update(
            br#"{"update_type":"invoice_paid","payload":{"invoice_id":123,"status":"paid"}}"#,
        )
        .unwrap();
        let invoice_id = numeric.payload.unwrap().invoice_id.unwrap();
        assert_eq!(invoice_id.to_string(), "123");

        let text = parse_cryptobot_update(br#"{"update_type":"invoice_paid","payload":{"invoice_id":"abc"}}"#).unwrap();
        assert_eq!(text.payload.unwrap().invoice_id, Some(InvoiceId::Text("abc".to_string())));
    }

    #[test]
    fn test_parse_monobank_update() {
        let update =
            parse_monobank_update(br#"{"invoiceId":"inv1","status":"success","reference":"ORDER_1_aa"}"#).unwrap();
        assert_eq!(update.invoice_id.as_deref(), Some("inv1"));
        assert_eq!(update.status, "success");
        assert!(parse_monobank_update(b"not json").is_err());
    }
}
