//! Monobank acquiring and Crypto Pay invoice clients

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::billing::webhooks::InvoiceId;
use crate::core::config::{self, billing::UAH_CURRENCY_CODE};
use crate::core::{AppError, AppResult};
use crate::models::{format_price, PaymentMethod};

/// Provider endpoints and credentials
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub monobank_api_url: String,
    pub monobank_token: Option<SecretString>,
    pub monobank_webhook_secret: Option<SecretString>,
    pub cryptobot_api_url: String,
    pub cryptobot_token: Option<SecretString>,
    pub cryptobot_asset: String,
    /// Base URL the providers call back, without trailing slash
    pub public_base_url: String,
    pub redirect_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        use config::billing::*;
        Self {
            monobank_api_url: MONOBANK_API_URL.clone(),
            monobank_token: MONOBANK_TOKEN.clone(),
            monobank_webhook_secret: MONOBANK_WEBHOOK_SECRET.clone(),
            cryptobot_api_url: CRYPTOBOT_API_URL.clone(),
            cryptobot_token: CRYPTOBOT_TOKEN.clone(),
            cryptobot_asset: CRYPTOBOT_ASSET.clone(),
            public_base_url: PUBLIC_BASE_URL.trim_end_matches('/').to_string(),
            redirect_url: REDIRECT_URL.clone(),
        }
    }

    /// Webhook URL registered with Monobank, carrying the shared secret when configured
    pub fn monobank_webhook_url(&self) -> String {
        let base = format!("{}/webhook/monobank/", self.public_base_url);
        match &self.monobank_webhook_secret {
            Some(secret) => format!("{}?token={}", base, secret.expose_secret()),
            None => base,
        }
    }
}

/// Invoice created at a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Provider-side invoice id, when the provider returned one
    pub external_id: Option<String>,
    pub pay_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonobankInvoiceResponse {
    invoice_id: Option<String>,
    page_url: Option<String>,
}

#[derive(Deserialize)]
struct CryptoBotResponse {
    ok: bool,
    result: Option<CryptoBotInvoiceResult>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CryptoBotInvoiceResult {
    invoice_id: Option<InvoiceId>,
    pay_url: Option<String>,
    bot_invoice_url: Option<String>,
}

/// HTTP client for both payment providers
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> AppResult<Self> {
        Self::new(GatewayConfig::from_env())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Creates an invoice with the given provider. `amount` is in minor units.
    pub async fn create_invoice(
        &self,
        method: PaymentMethod,
        order_id: &str,
        amount: i64,
        description: &str,
    ) -> AppResult<Invoice> {
        match method {
            PaymentMethod::Monobank => self.create_monobank_invoice(order_id, amount, description).await,
            PaymentMethod::Cryptobot => self.create_cryptobot_invoice(order_id, amount, description).await,
        }
    }

    pub async fn create_monobank_invoice(&self, order_id: &str, amount: i64, destination: &str) -> AppResult<Invoice> {
        let token = self
            .config
            .monobank_token
            .as_ref()
            .ok_or_else(|| AppError::Payment("MONOBANK_TOKEN is not configured".to_string()))?;

        let body = json!({
            "amount": amount,
            "ccy": UAH_CURRENCY_CODE,
            "merchantPaymInfo": {
                "reference": order_id,
                "destination": destination,
            },
            "redirectUrl": self.config.redirect_url,
            "webHookUrl": self.config.monobank_webhook_url(),
        });

        let url = format!(
            "{}/api/merchant/invoice/create",
            self.config.monobank_api_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("X-Token", token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            log::error!("Monobank invoice for {} failed: HTTP {}", order_id, status);
            return Err(AppError::HttpStatus(status));
        }

        let data: MonobankInvoiceResponse = response.json().await?;
        let pay_url = data
            .page_url
            .ok_or_else(|| AppError::Payment("Monobank response has no pageUrl".to_string()))?;

        log::info!("🧾 Monobank invoice created for {}", order_id);
        Ok(Invoice {
            external_id: data.invoice_id,
            pay_url,
        })
    }

    pub async fn create_cryptobot_invoice(&self, order_id: &str, amount: i64, description: &str) -> AppResult<Invoice> {
        let token = self
            .config
            .cryptobot_token
            .as_ref()
            .ok_or_else(|| AppError::Payment("CRYPTOBOT_TOKEN is not configured".to_string()))?;

        let body = json!({
            "asset": self.config.cryptobot_asset,
            "amount": format_price(amount),
            "description": description,
            "hidden_message": format!("Order {}", order_id),
        });

        let url = format!("{}/api/createInvoice", self.config.cryptobot_api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Crypto-Pay-API-Token", token.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            log::error!("CryptoBot invoice for {} failed: HTTP {}", order_id, status);
            return Err(AppError::HttpStatus(status));
        }

        let data: CryptoBotResponse = response.json().await?;
        if !data.ok {
            let reason = data.error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string());
            return Err(AppError::Payment(format!("CryptoBot refused invoice: {}", reason)));
        }
        let result = data
            .result
            .ok_or_else(|| AppError::Payment("CryptoBot response has no result".to_string()))?;
        let pay_url = result
            .pay_url
            .or(result.bot_invoice_url)
            .ok_or_else(|| AppError::Payment("CryptoBot response has no pay_url".to_string()))?;

        log::info!("🧾 CryptoBot invoice created for {}", order_id);
        Ok(Invoice {
            external_id: result.invoice_id.map(|id| id.to_string()),
            pay_url,
        })
    }
}
