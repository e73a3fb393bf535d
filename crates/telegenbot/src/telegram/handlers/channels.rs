//! Channel registration from `my_chat_member` updates

use teloxide::prelude::*;
use teloxide::types::{ChatMemberUpdated, ParseMode};
use teloxide::utils::html::escape;

use telegencore::get_connection;
use telegencore::storage::channels::{deactivate_channel, get_channel_by_chat_id, get_or_create_channel};

use super::types::{ensure_user_exists, HandlerDeps, HandlerError};
use crate::telegram::{cb, Bot, CallbackData};

/// Registers a channel when the bot is made an administrator there and
/// deactivates it when the bot is removed.
///
/// The user who changed the bot's rights becomes the channel owner.
pub async fn handle_my_chat_member(bot: &Bot, upd: &ChatMemberUpdated, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !upd.chat.is_channel() {
        return Ok(());
    }
    let chat_id = upd.chat.id.0.to_string();
    let title = upd.chat.title().unwrap_or("Канал").to_string();
    let owner_chat = ChatId::from(upd.from.id);

    let new_status = &upd.new_chat_member.kind;
    if new_status.is_administrator() {
        let user = ensure_user_exists(deps, bot, &upd.from)?;
        let (channel, created) = {
            let conn = get_connection(&deps.db_pool)?;
            get_or_create_channel(&conn, user.id, &chat_id, &title)?
        };
        log::info!(
            "📢 Bot is admin in {} ({}), owner {}, new: {}",
            channel.name,
            channel.channel_id,
            user.telegram_id,
            created
        );
        bot.send_message(
            owner_chat,
            format!("✅ Канал <b>{}</b> підключено!", escape(&channel.name)),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(teloxide::types::InlineKeyboardMarkup::new(vec![vec![cb(
            "⚡ Налаштувати",
            CallbackData::Channel(channel.id),
        )]]))
        .await?;
    } else if new_status.is_left() || new_status.is_banned() || new_status.is_member() {
        let known = {
            let conn = get_connection(&deps.db_pool)?;
            let known = get_channel_by_chat_id(&conn, &chat_id)?.is_some_and(|c| c.is_active);
            deactivate_channel(&conn, &chat_id)?;
            known
        };
        if known {
            log::info!("📢 Bot lost admin rights in {} ({})", title, chat_id);
            bot.send_message(
                owner_chat,
                format!(
                    "⚠️ Бот більше не адміністратор каналу <b>{}</b>. Публікація зупинена.",
                    escape(&title)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }
    Ok(())
}
