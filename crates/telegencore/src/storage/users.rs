use chrono::{DateTime, Months, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::AppResult;
use crate::models::User;

/// Parameters for a new user, taken from the Telegram profile
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub telegram_id: i64,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

/// When the monthly generation counter of a user created at `now` resets
pub fn next_reset_after(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(1)).unwrap_or(now + chrono::Duration::days(30))
}

pub fn get_user(conn: &Connection, telegram_id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE telegram_id = ?1", User::COLUMNS);
    let user = conn.query_row(&sql, [telegram_id], User::from_row).optional()?;
    Ok(user)
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);
    let user = conn.query_row(&sql, [id], User::from_row).optional()?;
    Ok(user)
}

/// Inserts a user row. Does not grant the trial; see `billing::trial`.
pub fn create_user(conn: &Connection, new_user: &NewUser<'_>) -> AppResult<User> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (telegram_id, username, first_name, last_name, created_at, generated_posts_count, generation_reset_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            new_user.telegram_id,
            new_user.username,
            new_user.first_name,
            new_user.last_name,
            now,
            next_reset_after(now),
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_user_by_id(conn, id)?.ok_or_else(|| crate::AppError::NotFound(format!("user {}", id)))
}

/// Refreshes the stored Telegram profile fields
pub fn update_profile(conn: &Connection, new_user: &NewUser<'_>) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET username = ?2, first_name = ?3, last_name = ?4 WHERE telegram_id = ?1",
        params![
            new_user.telegram_id,
            new_user.username,
            new_user.first_name,
            new_user.last_name
        ],
    )?;
    Ok(())
}

/// Owner of the channel a flow belongs to
pub fn get_user_for_flow(conn: &Connection, flow_id: i64) -> AppResult<Option<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE id = (
            SELECT c.user_id FROM flows f JOIN channels c ON c.id = f.channel_id WHERE f.id = ?1
         )",
        User::COLUMNS
    );
    let user = conn.query_row(&sql, [flow_id], User::from_row).optional()?;
    Ok(user)
}

pub fn increment_generated_posts(conn: &Connection, user_id: i64, count: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET generated_posts_count = generated_posts_count + ?2 WHERE id = ?1",
        params![user_id, count.max(0)],
    )?;
    Ok(())
}

/// Subtracts `count` from the generation counter, never going below zero
pub fn decrement_generated_posts(conn: &Connection, user_id: i64, count: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET generated_posts_count = MAX(0, generated_posts_count - ?2) WHERE id = ?1",
        params![user_id, count.max(0)],
    )?;
    Ok(())
}

/// Zeroes the counters whose reset date has passed and moves the date one month ahead.
///
/// Returns the number of users reset.
pub fn reset_due_generation_counters(conn: &Connection, now: DateTime<Utc>) -> AppResult<usize> {
    let mut stmt = conn.prepare("SELECT id FROM users WHERE generation_reset_at <= ?1")?;
    let due: Vec<i64> = stmt
        .query_map([now], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for id in &due {
        conn.execute(
            "UPDATE users SET generated_posts_count = 0, generation_reset_at = ?2 WHERE id = ?1",
            params![id, next_reset_after(now)],
        )?;
    }
    Ok(due.len())
}

/// Deletes users whose username starts with `prefix`. Channels, flows and posts cascade.
pub fn delete_users_with_prefix(conn: &Connection, prefix: &str) -> AppResult<usize> {
    let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
    let deleted = conn.execute("DELETE FROM users WHERE username LIKE ?1 ESCAPE '\\'", [pattern])?;
    Ok(deleted)
}

pub fn delete_all_users(conn: &Connection) -> AppResult<usize> {
    Ok(conn.execute("DELETE FROM users", [])?)
}

pub fn count_users(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}
