use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{AppError, AppResult};
use crate::markup::sanitize_html;
use crate::models::{Post, PostMedia, PostStatus, PostView};

/// Parameters for a generated draft
#[derive(Debug, Clone, Default)]
pub struct NewPost<'a> {
    pub content: &'a str,
    pub original_content: Option<&'a str>,
    pub source_id: Option<&'a str>,
    pub source_url: Option<&'a str>,
    pub original_link: Option<&'a str>,
    pub original_date: Option<DateTime<Utc>>,
    pub media: &'a [PostMedia],
}

pub fn post_exists_by_source_id(conn: &Connection, source_id: &str) -> AppResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE source_id = ?1)",
        [source_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Saves a draft and its media in one transaction.
///
/// Returns `None` when a post with the same `source_id` already exists.
pub fn create_post(conn: &Connection, flow_id: i64, new_post: &NewPost<'_>) -> AppResult<Option<Post>> {
    if let Some(source_id) = new_post.source_id {
        if post_exists_by_source_id(conn, source_id)? {
            log::info!("Skipping duplicate post: {}", source_id);
            return Ok(None);
        }
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO posts (flow_id, content, original_content, status, source_id, source_url, original_link,
                            original_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            flow_id,
            new_post.content,
            new_post.original_content,
            PostStatus::Draft,
            new_post.source_id,
            new_post.source_url,
            new_post.original_link,
            new_post.original_date,
            Utc::now(),
        ],
    )?;
    let post_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare("INSERT INTO post_media (post_id, kind, url, position) VALUES (?1, ?2, ?3, ?4)")?;
        for media in new_post.media {
            stmt.execute(params![post_id, media.kind, media.url, media.position])?;
        }
    }
    tx.commit()?;

    get_post(conn, post_id)
}

pub fn get_post(conn: &Connection, id: i64) -> AppResult<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS);
    Ok(conn.query_row(&sql, [id], Post::from_row).optional()?)
}

pub fn get_media(conn: &Connection, post_id: i64) -> AppResult<Vec<PostMedia>> {
    let mut stmt = conn.prepare("SELECT kind, url, position FROM post_media WHERE post_id = ?1 ORDER BY kind, position")?;
    let media = stmt
        .query_map([post_id], PostMedia::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

pub fn get_post_view(conn: &Connection, id: i64) -> AppResult<Option<PostView>> {
    match get_post(conn, id)? {
        Some(post) => {
            let media = get_media(conn, post.id)?;
            Ok(Some(PostView::new(post, media)))
        }
        None => Ok(None),
    }
}

/// Posts of a flow with the given status, newest first
pub fn list_posts(conn: &Connection, flow_id: i64, status: PostStatus) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {} FROM posts WHERE flow_id = ?1 AND status = ?2 ORDER BY created_at DESC, id DESC",
        Post::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![flow_id, status], Post::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn count_posts(conn: &Connection, flow_id: i64, status: PostStatus) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE flow_id = ?1 AND status = ?2",
        params![flow_id, status],
        |row| row.get(0),
    )?)
}

pub fn mark_scheduled(conn: &Connection, id: i64, when: DateTime<Utc>) -> AppResult<()> {
    let updated = conn.execute(
        "UPDATE posts SET status = ?2, scheduled_time = ?3 WHERE id = ?1",
        params![id, PostStatus::Scheduled, when],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("post {}", id)));
    }
    Ok(())
}

pub fn mark_published(conn: &Connection, id: i64, at: DateTime<Utc>) -> AppResult<()> {
    conn.execute(
        "UPDATE posts SET status = ?2, publication_date = ?3, scheduled_time = NULL WHERE id = ?1",
        params![id, PostStatus::Published, at],
    )?;
    Ok(())
}

/// Replaces the text of an unpublished post with user-edited HTML.
///
/// The HTML is reduced to Telegram's tag set first; empty text and
/// published posts are refused.
pub fn update_content(conn: &Connection, id: i64, html: &str) -> AppResult<Post> {
    let content = sanitize_html(html);
    if content.is_empty() {
        return Err(AppError::Validation("post text is empty".to_string()));
    }
    let updated = conn.execute(
        "UPDATE posts SET content = ?2 WHERE id = ?1 AND status != ?3",
        params![id, content, PostStatus::Published],
    )?;
    let post = get_post(conn, id)?.ok_or_else(|| AppError::NotFound(format!("post {}", id)))?;
    if updated == 0 {
        return Err(AppError::InvalidOperation(format!("post {} is already published", id)));
    }
    Ok(post)
}

pub fn delete_post(conn: &Connection, id: i64) -> AppResult<bool> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? > 0)
}

/// Scheduled posts whose time has come, oldest first
pub fn due_scheduled_posts(conn: &Connection, now: DateTime<Utc>) -> AppResult<Vec<Post>> {
    let sql = format!(
        "SELECT {} FROM posts WHERE status = ?1 AND scheduled_time IS NOT NULL AND scheduled_time <= ?2
         ORDER BY scheduled_time",
        Post::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![PostStatus::Scheduled, now], Post::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowSource, SourceType};
    use crate::storage::channels::get_or_create_channel;
    use crate::storage::flows::{create_flow, NewFlow};
    use crate::storage::migrations::run_migrations;
    use crate::storage::users::{create_user, NewUser};

    fn setup() -> (Connection, i64) {
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
        let flow = create_flow(
            &conn,
            &NewFlow {
                channel_id: channel.id,
                name: "Chan".to_string(),
                theme: "News".to_string(),
                sources: vec![FlowSource::new(SourceType::Web, "https://news.example")],
                ..NewFlow::default()
            },
        )
        .unwrap();
        (conn, flow.id)
    }

    #[test]
    fn test_create_post_skips_duplicate_source_id() {
        let (conn, flow_id) = setup();
        let media = [PostMedia::image("/media/a.jpg", 0)];
        let new_post = NewPost {
            content: "hello",
            source_id: Some("web:1"),
            media: &media,
            ..NewPost::default()
        };

        let first = create_post(&conn, flow_id, &new_post).unwrap().unwrap();
        assert_eq!(first.status, PostStatus::Draft);
        assert!(create_post(&conn, flow_id, &new_post).unwrap().is_none());

        let view = get_post_view(&conn, first.id).unwrap().unwrap();
        assert_eq!(view.media.len(), 1);
    }

    #[test]
    fn test_posts_without_source_id_are_not_deduplicated() {
        let (conn, flow_id) = setup();
        let new_post = NewPost {
            content: "manual",
            ..NewPost::default()
        };
        create_post(&conn, flow_id, &new_post).unwrap().unwrap();
        create_post(&conn, flow_id, &new_post).unwrap().unwrap();
        assert_eq!(count_posts(&conn, flow_id, PostStatus::Draft).unwrap(), 2);
    }

    #[test]
    fn test_due_scheduled_posts_and_publish() {
        let (conn, flow_id) = setup();
        let post = create_post(
            &conn,
            flow_id,
            &NewPost {
                content: "soon",
                ..NewPost::default()
            },
        )
        .unwrap()
        .unwrap();

        let now = Utc::now();
        mark_scheduled(&conn, post.id, now + chrono::Duration::minutes(5)).unwrap();
        assert!(due_scheduled_posts(&conn, now).unwrap().is_empty());

        let later = now + chrono::Duration::minutes(6);
        let due = due_scheduled_posts(&conn, later).unwrap();
        assert_eq!(due.len(), 1);

        mark_published(&conn, post.id, later).unwrap();
        let published = get_post(&conn, post.id).unwrap().unwrap();
        assert_eq!(published.status, PostStatus::Published);
        assert!(published.scheduled_time.is_none());
        assert!(published.publication_date.is_some());
    }

    #[test]
    fn test_update_content_sanitizes_and_refuses_published() {
        let (conn, flow_id) = setup();
        let post = create_post(
            &conn,
            flow_id,
            &NewPost {
                content: "draft",
                ..NewPost::default()
            },
        )
        .unwrap()
        .unwrap();

        let edited = update_content(&conn, post.id, "<b>New</b> <span>title</span> &amp; more").unwrap();
        assert_eq!(edited.content, "<b>New</b> title &amp; more");
        assert!(matches!(update_content(&conn, post.id, "  <p> </p>"), Err(AppError::Validation(_))));

        mark_published(&conn, post.id, Utc::now()).unwrap();
        assert!(matches!(
            update_content(&conn, post.id, "late edit"),
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(get_post(&conn, post.id).unwrap().unwrap().content, "<b>New</b> title &amp; more");
        assert!(matches!(update_content(&conn, 9999, "x"), Err(AppError::NotFound(_))));
    }
}
