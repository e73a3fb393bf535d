//! Logging initialization and startup diagnostics

use anyhow::Result;
use secrecy::SecretString;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("html5ever")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            log_config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

fn describe(secret: &Option<SecretString>) -> &'static str {
    if secret.is_some() {
        "configured"
    } else {
        "not set"
    }
}

/// Logs which integrations are configured at startup.
///
/// Secrets are never printed, only whether they are present.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Telegen configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🗄  DATABASE_PATH: {}", *config::DATABASE_PATH);
    log::info!("🖼  MEDIA_ROOT: {}", *config::media::MEDIA_ROOT);
    log::info!("🌐 PUBLIC_BASE_URL: {}", *config::billing::PUBLIC_BASE_URL);
    log::info!("💳 MONOBANK_TOKEN: {}", describe(&config::billing::MONOBANK_TOKEN));
    log::info!(
        "🔐 MONOBANK_WEBHOOK_SECRET: {}",
        describe(&config::billing::MONOBANK_WEBHOOK_SECRET)
    );
    log::info!("🪙 CRYPTOBOT_TOKEN: {}", describe(&config::billing::CRYPTOBOT_TOKEN));
    log::info!("🤖 OPENAI_API_KEY: {}", describe(&config::generation::OPENAI_API_KEY));

    if config::billing::MONOBANK_WEBHOOK_SECRET.is_none() {
        log::warn!("⚠️  Monobank webhooks are accepted without a token check");
    }
    if config::generation::OPENAI_API_KEY.is_none() {
        log::warn!("⚠️  OPENAI_API_KEY not set, posts are cleaned but not rewritten");
    }
    if config::admin::ADMIN_IDS.is_empty() {
        log::warn!("⚠️  ADMIN_IDS not set, admin notifications are disabled");
    }
}
