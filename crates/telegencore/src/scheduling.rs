//! Post scheduling and publication text helpers

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

use crate::core::config::media::{CAPTION_LIMIT, MESSAGE_LIMIT};
use crate::core::{AppError, AppResult};
use crate::markup::{chunk_html, truncate_html};
use crate::models::{parse_timezone, Frequency, DEFAULT_TIMEZONE};
use crate::storage::channels::get_channel;
use crate::storage::flows::get_flow;
use crate::storage::posts::{get_post, mark_scheduled};

/// Input format of the buffer's "schedule" prompt
pub const SCHEDULE_INPUT_FORMAT: &str = "%d.%m.%Y %H:%M";

/// A requested publication time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAt {
    /// Wall-clock time in the channel's timezone
    Local(NaiveDateTime),
    Utc(DateTime<Utc>),
}

/// Parses `ДД.ММ.РРРР ГГ:ХХ`, e.g. `25.12.2025 18:30`
pub fn parse_schedule_input(input: &str) -> AppResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), SCHEDULE_INPUT_FORMAT)
        .map_err(|_| AppError::Validation(format!("expected ДД.ММ.РРРР ГГ:ХХ, got '{}'", input.trim())))
}

/// Converts a wall-clock time in `tz` to UTC.
///
/// Times skipped by a DST jump are rejected; ambiguous ones take the earlier instant.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> AppResult<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation(format!("{} does not exist in {}", naive, tz)))
}

/// Timezone of the channel a post belongs to
pub fn post_timezone(conn: &Connection, post_id: i64) -> AppResult<Tz> {
    let post = get_post(conn, post_id)?.ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
    let channel = match get_flow(conn, post.flow_id)? {
        Some(flow) => get_channel(conn, flow.channel_id)?,
        None => None,
    };
    Ok(parse_timezone(
        channel.as_ref().map_or(DEFAULT_TIMEZONE, |c| c.timezone.as_str()),
    ))
}

/// Schedules a post for publication and returns the stored UTC time.
///
/// Local times are read in the channel's timezone. A time that is not after
/// `now` is an `InvalidOperation`.
pub fn schedule_post(conn: &Connection, post_id: i64, when: ScheduleAt, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    let when = match when {
        ScheduleAt::Utc(when) => when,
        ScheduleAt::Local(naive) => local_to_utc(naive, post_timezone(conn, post_id)?)?,
    };

    if when <= now {
        return Err(AppError::InvalidOperation(format!(
            "cannot schedule post {} in the past ({})",
            post_id, when
        )));
    }

    let post = get_post(conn, post_id)?.ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
    if post.is_published() {
        return Err(AppError::InvalidOperation(format!("post {} is already published", post_id)));
    }

    mark_scheduled(conn, post_id, when)?;
    log::info!("🗓 Post {} scheduled for {}", post_id, when);
    Ok(when)
}

pub fn next_generation_time(frequency: Frequency, now: DateTime<Utc>) -> DateTime<Utc> {
    now + frequency.interval()
}

/// Message chunks for a text-only post; each chunk is valid HTML on its own
pub fn message_chunks(text: &str) -> Vec<String> {
    chunk_html(text, MESSAGE_LIMIT)
}

/// Truncates a media caption to `CAPTION_LIMIT` visible characters, ending with "..."
pub fn truncate_caption(text: &str) -> String {
    truncate_html(text, CAPTION_LIMIT)
}
