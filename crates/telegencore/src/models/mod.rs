//! Persisted records and the DTOs handed to the messaging layer

pub mod billing;
pub mod channel;
pub mod dto;
pub mod flow;
pub mod post;
pub mod user;

pub use billing::{Payment, PaymentMethod, Platform, PromoCode, Subscription, Tariff, TariffCode, TariffPeriod};
pub use channel::{parse_timezone, Channel, DEFAULT_TIMEZONE, SUPPORTED_TIMEZONES};
pub use dto::{FlowSummary, PostView, SubscriptionInfo};
pub use flow::{ContentLength, Flow, FlowSource, Frequency, SourceType};
pub use post::{MediaKind, Post, PostMedia, PostStatus};
pub use user::User;

/// Stores a strum-backed enum as its TEXT representation.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(AsRef::<str>::as_ref(self)))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    )+};
}

sql_text_enum!(
    SourceType,
    ContentLength,
    Frequency,
    PostStatus,
    MediaKind,
    TariffCode,
    Platform,
    PaymentMethod,
);

/// Formats minor units (kopiyky) as a price string with two decimals: 29900 -> "299.00"
pub fn format_price(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
