use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{AppError, AppResult};
use crate::models::{Channel, SUPPORTED_TIMEZONES};

pub fn get_channel(conn: &Connection, id: i64) -> AppResult<Option<Channel>> {
    let sql = format!("SELECT {} FROM channels WHERE id = ?1", Channel::COLUMNS);
    Ok(conn.query_row(&sql, [id], Channel::from_row).optional()?)
}

/// Looks a channel up by its Telegram chat id
pub fn get_channel_by_chat_id(conn: &Connection, chat_id: &str) -> AppResult<Option<Channel>> {
    let sql = format!("SELECT {} FROM channels WHERE channel_id = ?1", Channel::COLUMNS);
    Ok(conn.query_row(&sql, [chat_id], Channel::from_row).optional()?)
}

/// Returns the channel for `chat_id`, creating it for `user_id` if needed.
///
/// An existing channel is re-activated and renamed, but keeps its owner.
/// The boolean is true when a row was inserted.
pub fn get_or_create_channel(conn: &Connection, user_id: i64, chat_id: &str, name: &str) -> AppResult<(Channel, bool)> {
    if let Some(existing) = get_channel_by_chat_id(conn, chat_id)? {
        conn.execute(
            "UPDATE channels SET name = ?2, is_active = 1 WHERE id = ?1",
            params![existing.id, name],
        )?;
        let refreshed = get_channel(conn, existing.id)?.unwrap_or(existing);
        return Ok((refreshed, false));
    }

    conn.execute(
        "INSERT INTO channels (user_id, channel_id, name, is_active, notifications, timezone, created_at)
         VALUES (?1, ?2, ?3, 1, 0, ?4, ?5)",
        params![user_id, chat_id, name, crate::models::DEFAULT_TIMEZONE, Utc::now()],
    )?;
    let id = conn.last_insert_rowid();
    let channel = get_channel(conn, id)?.ok_or_else(|| AppError::NotFound(format!("channel {}", id)))?;
    Ok((channel, true))
}

pub fn list_user_channels(conn: &Connection, user_id: i64) -> AppResult<Vec<Channel>> {
    let sql = format!(
        "SELECT {} FROM channels WHERE user_id = ?1 AND is_active = 1 ORDER BY id",
        Channel::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let channels = stmt
        .query_map([user_id], Channel::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(channels)
}

/// Marks a channel inactive, e.g. after the bot lost admin rights there
pub fn deactivate_channel(conn: &Connection, chat_id: &str) -> AppResult<bool> {
    let updated = conn.execute("UPDATE channels SET is_active = 0 WHERE channel_id = ?1", [chat_id])?;
    Ok(updated > 0)
}

pub fn set_channel_timezone(conn: &Connection, id: i64, timezone: &str) -> AppResult<()> {
    if !SUPPORTED_TIMEZONES.contains(&timezone) {
        return Err(AppError::Validation(format!("Unsupported timezone: {}", timezone)));
    }
    conn.execute("UPDATE channels SET timezone = ?2 WHERE id = ?1", params![id, timezone])?;
    Ok(())
}

pub fn set_channel_notifications(conn: &Connection, id: i64, enabled: bool) -> AppResult<()> {
    conn.execute(
        "UPDATE channels SET notifications = ?2 WHERE id = ?1",
        params![id, enabled],
    )?;
    Ok(())
}
