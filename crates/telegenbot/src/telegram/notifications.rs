use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html::escape;

use telegencore::billing::Notifier;
use telegencore::config::admin::ADMIN_IDS;

use crate::telegram::Bot;

/// Delivers billing messages (payment success, subscription expiry) over Telegram
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_user(&self, telegram_id: i64, text: &str) {
        if let Err(e) = self
            .bot
            .send_message(ChatId(telegram_id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            log::error!("Failed to notify user {}: {}", telegram_id, e);
        }
    }
}

/// Tells every admin that a new user started the bot
pub async fn notify_admins_new_user(bot: &Bot, telegram_id: i64, username: Option<&str>, first_name: Option<&str>) {
    if ADMIN_IDS.is_empty() {
        return;
    }

    let username = username.map_or_else(|| "-".to_string(), |u| format!("@{}", escape(u)));
    let first_name = first_name.map_or_else(|| "-".to_string(), escape);
    let text = format!(
        "🆕 <b>Новий користувач</b>\n\nID: <code>{}</code>\nUsername: {}\nІм'я: {}",
        telegram_id, username, first_name
    );

    for admin_id in ADMIN_IDS.iter() {
        if let Err(e) = bot
            .send_message(ChatId(*admin_id), text.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            log::warn!("Failed to notify admin {} about user {}: {}", admin_id, telegram_id, e);
        }
    }
}
