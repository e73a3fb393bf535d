use thiserror::Error;

/// Centralized error types for the application
///
/// Storage, billing and generation code return `AppResult`; the bot crate
/// converts to its handler error type at the dispatcher boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[cfg(feature = "telegram")]
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status code errors
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// RSS/Atom documents that could not be parsed
    #[error("Feed parsing error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record that was expected to exist is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed in the current state (e.g. scheduling in the past)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The user's tariff has no generations left for the requested amount
    #[error("{0}")]
    GenerationLimitExceeded(String),

    /// Payment provider returned an unusable response
    #[error("Payment error: {0}")]
    Payment(String),

    /// Webhook signature or token did not verify
    #[error("Signature error: {0}")]
    Signature(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_limit_message_is_user_facing() {
        let err = AppError::GenerationLimitExceeded("❌ Ліміт генерацій досягнуто (300/місяць)".to_string());
        assert_eq!(err.to_string(), "❌ Ліміт генерацій досягнуто (300/місяць)");
    }

    #[test]
    fn test_from_rusqlite() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
