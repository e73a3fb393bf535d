use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TariffCode {
    Free,
    Basic,
    Pro,
}

impl TariffCode {
    /// Ordering used to reject downgrades: free < basic < pro
    pub fn level(self) -> i64 {
        match self {
            TariffCode::Free => 1,
            TariffCode::Basic => 2,
            TariffCode::Pro => 3,
        }
    }
}

/// Where a tariff can be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Tg,
    Web,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    Monobank,
    Cryptobot,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Monobank => "💳 Картка (Monobank)",
            PaymentMethod::Cryptobot => "🪙 Крипта (CryptoBot)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: i64,
    pub code: TariffCode,
    pub name: String,
    pub description: Option<String>,
    pub level: i64,
    pub channels_available: i64,
    pub sources_available: i64,
    pub generations_available: i64,
    pub platform: Platform,
    pub is_active: bool,
    pub trial_duration_days: i64,
}

impl Tariff {
    pub const COLUMNS: &'static str = "id, code, name, description, level, channels_available, sources_available, \
         generations_available, platform, is_active, trial_duration_days";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            name: row.get("name")?,
            description: row.get("description")?,
            level: row.get("level")?,
            channels_available: row.get("channels_available")?,
            sources_available: row.get("sources_available")?,
            generations_available: row.get("generations_available")?,
            platform: row.get("platform")?,
            is_active: row.get("is_active")?,
            trial_duration_days: row.get("trial_duration_days")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffPeriod {
    pub id: i64,
    pub tariff_id: i64,
    pub months: i64,
    /// Price in minor units (kopiyky)
    pub price: i64,
    pub promo_code: Option<String>,
    pub discount_percent: i64,
}

impl TariffPeriod {
    pub const COLUMNS: &'static str = "id, tariff_id, months, price, promo_code, discount_percent";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            tariff_id: row.get("tariff_id")?,
            months: row.get("months")?,
            price: row.get("price")?,
            promo_code: row.get("promo_code")?,
            discount_percent: row.get("discount_percent")?,
        })
    }

    /// Price after `discount_percent`, rounded down to whole kopiyky
    pub fn effective_price(&self) -> i64 {
        let discount = self.discount_percent.clamp(0, 100);
        self.price * (100 - discount) / 100
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub tariff_period_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub is_trial: bool,
}

impl Subscription {
    pub const COLUMNS: &'static str = "id, user_id, tariff_period_id, start_date, end_date, is_active, is_trial";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            tariff_period_id: row.get("tariff_period_id")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            is_active: row.get("is_active")?,
            is_trial: row.get("is_trial")?,
        })
    }
}

/// Code that grants a (tariff, months) period without payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: i64,
    pub code: String,
    pub tariff_id: i64,
    pub months: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    pub const COLUMNS: &'static str = "id, code, tariff_id, months, is_active, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            tariff_id: row.get("tariff_id")?,
            months: row.get("months")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Codes are compared trimmed and upper-cased
    pub fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    /// Amount in minor units (kopiyky)
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_date: DateTime<Utc>,
    pub is_successful: bool,
    pub subscription_id: Option<i64>,
    pub tariff_period_id: Option<i64>,
    pub order_id: String,
    /// Provider-side invoice id
    pub external_id: Option<String>,
    pub pay_url: Option<String>,
}

impl Payment {
    pub const COLUMNS: &'static str = "id, user_id, amount, payment_method, payment_date, is_successful, \
         subscription_id, tariff_period_id, order_id, external_id, pay_url";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            amount: row.get("amount")?,
            payment_method: row.get("payment_method")?,
            payment_date: row.get("payment_date")?,
            is_successful: row.get("is_successful")?,
            subscription_id: row.get("subscription_id")?,
            tariff_period_id: row.get("tariff_period_id")?,
            order_id: row.get("order_id")?,
            external_id: row.get("external_id")?,
            pay_url: row.get("pay_url")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_price_applies_discount() {
        let period = TariffPeriod {
            id: 1,
            tariff_id: 1,
            months: 6,
            price: 149900,
            promo_code: None,
            discount_percent: 10,
        };
        assert_eq!(period.effective_price(), 134910);

        let free = TariffPeriod {
            discount_percent: 150,
            ..period
        };
        assert_eq!(free.effective_price(), 0);
    }

    #[test]
    fn test_promo_code_normalize() {
        assert_eq!(PromoCode::normalize("  spring25 \n"), "SPRING25");
    }

    #[test]
    fn test_tariff_levels_are_ordered() {
        assert!(TariffCode::Free.level() < TariffCode::Basic.level());
        assert!(TariffCode::Basic.level() < TariffCode::Pro.level());
    }
}
