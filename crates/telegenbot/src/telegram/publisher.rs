//! Publishing posts to their channel

use std::sync::Arc;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use telegencore::scheduling::{message_chunks, truncate_caption};
use telegencore::storage::channels::get_channel;
use telegencore::storage::flows::get_flow;
use telegencore::storage::posts::{get_post_view, mark_published};
use telegencore::{get_connection, AppError, AppResult, DbPool};

use crate::telegram::media::send_album;
use crate::telegram::Bot;

/// Sends a post to its channel and marks it published.
///
/// Posts with media go out as an album with the text as caption (cut to the
/// caption limit); text-only posts are split into messages of at most 4096
/// characters.
pub async fn publish_post(bot: &Bot, pool: &Arc<DbPool>, post_id: i64) -> AppResult<()> {
    let (view, channel) = {
        let conn = get_connection(pool)?;
        let view = get_post_view(&conn, post_id)?.ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
        let flow = get_flow(&conn, view.post.flow_id)?
            .ok_or_else(|| AppError::NotFound(format!("flow {}", view.post.flow_id)))?;
        let channel = get_channel(&conn, flow.channel_id)?
            .ok_or_else(|| AppError::NotFound(format!("channel {}", flow.channel_id)))?;
        (view, channel)
    };

    if view.post.is_published() {
        return Err(AppError::InvalidOperation(format!("post {} is already published", post_id)));
    }
    let chat_id = channel
        .chat_id()
        .map(ChatId)
        .ok_or_else(|| AppError::Validation(format!("channel {} has no numeric chat id", channel.channel_id)))?;

    let mut sent_album = false;
    if view.has_media() {
        let caption = truncate_caption(&view.post.content);
        let sent = send_album(bot, chat_id, &view, Some(&caption)).await?;
        sent_album = !sent.is_empty();
    }
    if !sent_album {
        for chunk in message_chunks(&view.post.content) {
            bot.send_message(chat_id, chunk).parse_mode(ParseMode::Html).await?;
        }
    }

    let conn = get_connection(pool)?;
    mark_published(&conn, post_id, Utc::now())?;
    log::info!("📤 Post {} published to {} ({})", post_id, channel.name, channel.channel_id);
    Ok(())
}
