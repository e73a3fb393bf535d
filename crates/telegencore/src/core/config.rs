use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

/// Reads an optional secret, treating an empty value as unset.
fn secret_var(name: &str) -> Option<SecretString> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Bot username without the leading @, used for deep links and the add-to-channel button
pub static BOT_USERNAME: Lazy<String> =
    Lazy::new(|| env::var("BOT_USERNAME").unwrap_or_else(|_| "telegen_bot".to_string()));

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    pub fn is_admin(telegram_id: i64) -> bool {
        ADMIN_IDS.contains(&telegram_id)
    }
}

/// Payment providers and subscription terms
pub mod billing {
    use super::secret_var;
    use once_cell::sync::Lazy;
    use secrecy::SecretString;
    use std::env;

    /// Length of a billing month when computing subscription end dates
    pub const DAYS_PER_MONTH: i64 = 30;

    /// Period (in months) of the free tariff used for trial subscriptions
    pub const TRIAL_PERIOD_MONTHS: i64 = 1;

    /// ISO 4217 numeric code for UAH
    pub const UAH_CURRENCY_CODE: u16 = 980;

    /// Monobank acquiring token (X-Token header)
    pub static MONOBANK_TOKEN: Lazy<Option<SecretString>> = Lazy::new(|| secret_var("MONOBANK_TOKEN"));

    pub static MONOBANK_API_URL: Lazy<String> =
        Lazy::new(|| env::var("MONOBANK_API_URL").unwrap_or_else(|_| "https://api.monobank.ua".to_string()));

    /// Shared secret appended to the Monobank webhook URL as `?token=`.
    /// When unset, Monobank callbacks are accepted without a token check.
    pub static MONOBANK_WEBHOOK_SECRET: Lazy<Option<SecretString>> =
        Lazy::new(|| secret_var("MONOBANK_WEBHOOK_SECRET"));

    /// CryptoBot (Crypto Pay API) token, also the HMAC key source for webhook signatures
    pub static CRYPTOBOT_TOKEN: Lazy<Option<SecretString>> = Lazy::new(|| secret_var("CRYPTOBOT_TOKEN"));

    pub static CRYPTOBOT_API_URL: Lazy<String> =
        Lazy::new(|| env::var("CRYPTOBOT_API_URL").unwrap_or_else(|_| "https://testnet-pay.crypt.bot".to_string()));

    /// Asset invoices are issued in
    pub static CRYPTOBOT_ASSET: Lazy<String> =
        Lazy::new(|| env::var("CRYPTOBOT_ASSET").unwrap_or_else(|_| "JET".to_string()));

    /// Public base URL of the webhook server, e.g. https://telegen.example.com
    pub static PUBLIC_BASE_URL: Lazy<String> =
        Lazy::new(|| env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()));

    /// Where Monobank sends the user after payment
    pub static REDIRECT_URL: Lazy<String> = Lazy::new(|| {
        env::var("PAYMENT_REDIRECT_URL").unwrap_or_else(|_| format!("https://t.me/{}", *super::BOT_USERNAME))
    });
}

/// Background scheduler configuration
pub mod scheduler {
    use super::Duration;

    /// Interval between scheduler cycles (in seconds)
    pub const TICK_INTERVAL_SECS: u64 = 60;

    pub fn tick_interval() -> Duration {
        Duration::from_secs(TICK_INTERVAL_SECS)
    }
}

/// Content generation configuration
pub mod generation {
    use super::{secret_var, Duration};
    use once_cell::sync::Lazy;
    use secrecy::SecretString;
    use std::env;

    pub const DEFAULT_FLOW_VOLUME: u32 = 5;
    pub const MIN_FLOW_VOLUME: u32 = 1;
    pub const MAX_FLOW_VOLUME: u32 = 50;

    /// Preset volumes offered by the flow wizard
    pub const VOLUME_OPTIONS: [u32; 4] = [5, 10, 20, 30];

    /// Retries for a single LLM rewrite before giving up on a post
    pub const MAX_RETRIES: usize = 5;

    pub const REQUEST_TIMEOUT_SECS: u64 = 15;

    pub fn request_timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    /// API key for an OpenAI-compatible chat completions endpoint.
    /// Without it posts are cleaned but not rewritten.
    pub static OPENAI_API_KEY: Lazy<Option<SecretString>> = Lazy::new(|| secret_var("OPENAI_API_KEY"));

    pub static OPENAI_API_URL: Lazy<String> =
        Lazy::new(|| env::var("OPENAI_API_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()));

    pub static OPENAI_MODEL: Lazy<String> =
        Lazy::new(|| env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()));
}

/// Webhook HTTP server configuration
pub mod web {
    use once_cell::sync::Lazy;
    use std::env;

    /// Port for the payment webhook server
    /// Read from WEB_PORT environment variable
    /// Default: 8000
    pub static WEB_PORT: Lazy<u16> = Lazy::new(|| {
        env::var("WEB_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8000)
    });
}

/// Media storage configuration
pub mod media {
    use once_cell::sync::Lazy;
    use std::env;

    /// Root directory for locally stored post media
    pub static MEDIA_ROOT: Lazy<String> = Lazy::new(|| env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()));

    /// Telegram allows at most 10 items per media group
    pub const MEDIA_GROUP_LIMIT: usize = 10;

    /// Caption length limit for media messages
    pub const CAPTION_LIMIT: usize = 1024;

    /// Text length limit for regular messages
    pub const MESSAGE_LIMIT: usize = 4096;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for outgoing HTTP calls (in seconds)
    pub const TIMEOUT_SECS: u64 = 30;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}
