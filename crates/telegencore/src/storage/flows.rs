use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::core::config::generation::{DEFAULT_FLOW_VOLUME, MAX_FLOW_VOLUME, MIN_FLOW_VOLUME};
use crate::core::{AppError, AppResult};
use crate::models::{ContentLength, Flow, FlowSource, Frequency};

/// Parameters for a new flow, produced by the create-flow wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlow {
    /// Row id of the channel
    pub channel_id: i64,
    pub name: String,
    pub theme: String,
    pub sources: Vec<FlowSource>,
    pub content_length: ContentLength,
    pub use_emojis: bool,
    pub use_premium_emojis: bool,
    pub title_highlight: bool,
    pub cta: Option<String>,
    pub frequency: Frequency,
    pub signature: Option<String>,
    pub flow_volume: u32,
}

impl Default for NewFlow {
    fn default() -> Self {
        Self {
            channel_id: 0,
            name: String::new(),
            theme: String::new(),
            sources: Vec::new(),
            content_length: ContentLength::default(),
            use_emojis: false,
            use_premium_emojis: false,
            title_highlight: false,
            cta: None,
            frequency: Frequency::default(),
            signature: None,
            flow_volume: DEFAULT_FLOW_VOLUME,
        }
    }
}

fn validate_volume(volume: u32) -> AppResult<()> {
    if !(MIN_FLOW_VOLUME..=MAX_FLOW_VOLUME).contains(&volume) {
        return Err(AppError::Validation(format!(
            "flow_volume must be between {} and {}, got {}",
            MIN_FLOW_VOLUME, MAX_FLOW_VOLUME, volume
        )));
    }
    Ok(())
}

/// A flow needs a theme and at least one source to generate anything
fn validate_settings(theme: &str, sources: &[FlowSource], volume: u32) -> AppResult<()> {
    if theme.trim().is_empty() {
        return Err(AppError::Validation("flow theme must not be empty".to_string()));
    }
    if sources.is_empty() {
        return Err(AppError::Validation("flow needs at least one source".to_string()));
    }
    validate_volume(volume)
}

/// Inserts a flow. A channel can only have one.
pub fn create_flow(conn: &Connection, new_flow: &NewFlow) -> AppResult<Flow> {
    validate_settings(&new_flow.theme, &new_flow.sources, new_flow.flow_volume)?;
    if get_flow_by_channel(conn, new_flow.channel_id)?.is_some() {
        return Err(AppError::InvalidOperation(format!(
            "channel {} already has a flow",
            new_flow.channel_id
        )));
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO flows (channel_id, name, theme, sources, content_length, use_emojis, use_premium_emojis,
                            title_highlight, cta, frequency, signature, flow_volume, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            new_flow.channel_id,
            new_flow.name,
            new_flow.theme,
            serde_json::to_string(&new_flow.sources)?,
            new_flow.content_length,
            new_flow.use_emojis,
            new_flow.use_premium_emojis,
            new_flow.title_highlight,
            new_flow.cta,
            new_flow.frequency,
            new_flow.signature,
            new_flow.flow_volume,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_flow(conn, id)?.ok_or_else(|| AppError::NotFound(format!("flow {}", id)))
}

pub fn get_flow(conn: &Connection, id: i64) -> AppResult<Option<Flow>> {
    let sql = format!("SELECT {} FROM flows WHERE id = ?1", Flow::COLUMNS);
    Ok(conn.query_row(&sql, [id], Flow::from_row).optional()?)
}

/// Flow of a channel (by channel row id)
pub fn get_flow_by_channel(conn: &Connection, channel_id: i64) -> AppResult<Option<Flow>> {
    let sql = format!("SELECT {} FROM flows WHERE channel_id = ?1", Flow::COLUMNS);
    Ok(conn.query_row(&sql, [channel_id], Flow::from_row).optional()?)
}

/// Number of flows across all channels of a user; this is what channel limits count
pub fn count_user_flows(conn: &Connection, user_id: i64) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM flows f JOIN channels c ON c.id = f.channel_id WHERE c.user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?)
}

/// Flows whose next generation is unset or already due
pub fn flows_due_for_generation(conn: &Connection, now: DateTime<Utc>) -> AppResult<Vec<Flow>> {
    let sql = format!(
        "SELECT {} FROM flows f WHERE (f.next_generation_time IS NULL OR f.next_generation_time <= ?1)
           AND EXISTS (SELECT 1 FROM channels c WHERE c.id = f.channel_id AND c.is_active = 1)
         ORDER BY f.id",
        Flow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let flows = stmt
        .query_map([now], Flow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(flows)
}

/// Records a generation run and when the next one is due
pub fn mark_generated(conn: &Connection, flow_id: i64, at: DateTime<Utc>, next: DateTime<Utc>) -> AppResult<()> {
    conn.execute(
        "UPDATE flows SET last_generated_at = ?2, next_generation_time = ?3, updated_at = ?2 WHERE id = ?1",
        params![flow_id, at, next],
    )?;
    Ok(())
}

/// Saves the editable settings of a flow
pub fn update_flow(conn: &Connection, flow: &Flow) -> AppResult<()> {
    validate_settings(&flow.theme, &flow.sources, flow.flow_volume)?;
    conn.execute(
        "UPDATE flows SET name = ?2, theme = ?3, sources = ?4, content_length = ?5, use_emojis = ?6,
                use_premium_emojis = ?7, title_highlight = ?8, cta = ?9, frequency = ?10, signature = ?11,
                flow_volume = ?12, updated_at = ?13
         WHERE id = ?1",
        params![
            flow.id,
            flow.name,
            flow.theme,
            serde_json::to_string(&flow.sources)?,
            flow.content_length,
            flow.use_emojis,
            flow.use_premium_emojis,
            flow.title_highlight,
            flow.cta,
            flow.frequency,
            flow.signature,
            flow.flow_volume,
            Utc::now(),
        ],
    )?;
    Ok(())
}

pub fn delete_flow(conn: &Connection, flow_id: i64) -> AppResult<bool> {
    Ok(conn.execute("DELETE FROM flows WHERE id = ?1", [flow_id])? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use crate::storage::channels::get_or_create_channel;
    use crate::storage::migrations::run_migrations;
    use crate::storage::users::{create_user, NewUser};

    fn setup() -> (Connection, i64, i64) {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&mut conn).unwrap();
        let user = create_user(
            &conn,
            &NewUser {
                telegram_id: 1,
                username: None,
                first_name: None,
                last_name: None,
            },
        )
        .unwrap();
        let (channel, _) = get_or_create_channel(&conn, user.id, "-100", "Chan").unwrap();
        (conn, user.id, channel.id)
    }

    fn new_flow(channel_id: i64) -> NewFlow {
        NewFlow {
            channel_id,
            name: "Chan".to_string(),
            theme: "Sport".to_string(),
            sources: vec![FlowSource::new(SourceType::Web, "https://example.com")],
            frequency: Frequency::Hourly,
            ..NewFlow::default()
        }
    }

    #[test]
    fn test_create_flow_roundtrips_sources() {
        let (conn, user_id, channel_id) = setup();
        let flow = create_flow(&conn, &new_flow(channel_id)).unwrap();
        assert_eq!(flow.sources.len(), 1);
        assert_eq!(flow.sources[0].source_type, SourceType::Web);
        assert_eq!(flow.frequency, Frequency::Hourly);
        assert_eq!(flow.flow_volume, 5);
        assert_eq!(count_user_flows(&conn, user_id).unwrap(), 1);
    }

    #[test]
    fn test_second_flow_for_channel_is_refused() {
        let (conn, _, channel_id) = setup();
        create_flow(&conn, &new_flow(channel_id)).unwrap();
        let err = create_flow(&conn, &new_flow(channel_id)).unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[test]
    fn test_volume_out_of_range_is_rejected() {
        let (conn, _, channel_id) = setup();
        let mut flow = new_flow(channel_id);
        flow.flow_volume = 51;
        assert!(matches!(create_flow(&conn, &flow), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_flow_without_theme_or_sources_is_rejected() {
        let (conn, user_id, channel_id) = setup();

        let mut no_sources = new_flow(channel_id);
        no_sources.sources.clear();
        assert!(matches!(create_flow(&conn, &no_sources), Err(AppError::Validation(_))));

        let mut blank_theme = new_flow(channel_id);
        blank_theme.theme = "   ".to_string();
        assert!(matches!(create_flow(&conn, &blank_theme), Err(AppError::Validation(_))));

        assert_eq!(count_user_flows(&conn, user_id).unwrap(), 0);
    }

    #[test]
    fn test_update_flow_saves_settings() {
        let (conn, _, channel_id) = setup();
        let mut flow = create_flow(&conn, &new_flow(channel_id)).unwrap();

        flow.theme = "Football".to_string();
        flow.frequency = Frequency::Daily;
        flow.signature = Some("@chan".to_string());
        update_flow(&conn, &flow).unwrap();

        let saved = get_flow(&conn, flow.id).unwrap().unwrap();
        assert_eq!(saved.theme, "Football");
        assert_eq!(saved.frequency, Frequency::Daily);
        assert_eq!(saved.signature.as_deref(), Some("@chan"));

        flow.sources.clear();
        assert!(matches!(update_flow(&conn, &flow), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_flows_due_for_generation() {
        let (conn, _, channel_id) = setup();
        let flow = create_flow(&conn, &new_flow(channel_id)).unwrap();
        let now = Utc::now();

        assert_eq!(flows_due_for_generation(&conn, now).unwrap().len(), 1);

        mark_generated(&conn, flow.id, now, now + chrono::Duration::hours(1)).unwrap();
        assert!(flows_due_for_generation(&conn, now).unwrap().is_empty());
        assert_eq!(
            flows_due_for_generation(&conn, now + chrono::Duration::hours(2))
                .unwrap()
                .len(),
            1
        );
    }
}
