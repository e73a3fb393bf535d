//! Post media: resolving stored urls and sending albums
//!
//! Media urls are either absolute http(s) urls or paths under `/media/`
//! that live in `MEDIA_ROOT` on disk.

use std::path::{Path, PathBuf};

use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, InputMediaVideo, MessageId, ParseMode};
use url::Url;

use telegencore::config::media::{MEDIA_GROUP_LIMIT, MEDIA_ROOT};
use telegencore::models::{MediaKind, PostMedia, PostView};

use crate::telegram::Bot;

/// Where the bytes of a media item come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFile {
    Local(PathBuf),
    Remote(Url),
}

impl MediaFile {
    fn into_input_file(self) -> InputFile {
        match self {
            MediaFile::Local(path) => InputFile::file(path),
            MediaFile::Remote(url) => InputFile::url(url),
        }
    }
}

/// Resolves a stored media url against `root`
pub fn media_path_in(root: &Path, url: &str) -> Option<MediaFile> {
    if let Ok(parsed) = Url::parse(url) {
        return matches!(parsed.scheme(), "http" | "https").then_some(MediaFile::Remote(parsed));
    }
    let relative = url
        .trim_start_matches('/')
        .strip_prefix("media/")
        .unwrap_or(url.trim_start_matches('/'));
    if relative.is_empty() || relative.split('/').any(|part| part == "..") {
        return None;
    }
    Some(MediaFile::Local(root.join(relative)))
}

/// Resolves a stored media url against `MEDIA_ROOT`
pub fn get_media_path(url: &str) -> Option<MediaFile> {
    media_path_in(Path::new(MEDIA_ROOT.as_str()), url)
}

fn media_input_file(media: &PostMedia) -> Option<InputFile> {
    match get_media_path(&media.url) {
        Some(MediaFile::Local(path)) if !path.exists() => {
            log::warn!("Media file {} is missing, skipping", path.display());
            None
        }
        Some(file) => Some(file.into_input_file()),
        None => {
            log::warn!("Unusable media url {}, skipping", media.url);
            None
        }
    }
}

/// Album items for a post: at most `MEDIA_GROUP_LIMIT`, caption on the first one
pub fn album_media(view: &PostView, caption: Option<&str>) -> Vec<InputMedia> {
    view.media
        .iter()
        .filter_map(|media| media_input_file(media).map(|file| (media.kind, file)))
        .take(MEDIA_GROUP_LIMIT)
        .enumerate()
        .map(|(i, (kind, file))| {
            let caption = caption.filter(|_| i == 0);
            match kind {
                MediaKind::Image => {
                    let mut photo = InputMediaPhoto::new(file);
                    if let Some(caption) = caption {
                        photo = photo.caption(caption).parse_mode(ParseMode::Html);
                    }
                    InputMedia::Photo(photo)
                }
                MediaKind::Video => {
                    let mut video = InputMediaVideo::new(file);
                    if let Some(caption) = caption {
                        video = video.caption(caption).parse_mode(ParseMode::Html);
                    }
                    InputMedia::Video(video)
                }
            }
        })
        .collect()
}

/// Sends the post's media as an album and returns the sent message ids.
///
/// Telegram albums need 2-10 items, so a single item is sent on its own.
/// Returns an empty list when none of the media could be resolved.
pub async fn send_album(
    bot: &Bot,
    chat_id: ChatId,
    view: &PostView,
    caption: Option<&str>,
) -> ResponseResult<Vec<MessageId>> {
    let mut items = album_media(view, caption);
    match items.len() {
        0 => Ok(Vec::new()),
        1 => {
            let sent = match items.remove(0) {
                InputMedia::Photo(photo) => {
                    let mut request = bot.send_photo(chat_id, photo.media);
                    if let Some(caption) = photo.caption {
                        request = request.caption(caption).parse_mode(ParseMode::Html);
                    }
                    request.await?
                }
                InputMedia::Video(video) => {
                    let mut request = bot.send_video(chat_id, video.media);
                    if let Some(caption) = video.caption {
                        request = request.caption(caption).parse_mode(ParseMode::Html);
                    }
                    request.await?
                }
                _ => return Ok(Vec::new()),
            };
            Ok(vec![sent.id])
        }
        count => {
            let sent = bot.send_media_group(chat_id, items).await?;
            log::debug!("Sent album of {} items to {}", count, chat_id);
            Ok(sent.into_iter().map(|m| m.id).collect())
        }
    }
}

/// Replaces the album on screen with the media of `view`.
///
/// The previous album (`message_ids`) and the trigger message are deleted
/// first; `message_ids` ends up holding the new album.
pub async fn send_media_album(
    bot: &Bot,
    chat_id: ChatId,
    trigger: Option<MessageId>,
    view: &PostView,
    message_ids: &mut Vec<MessageId>,
) {
    safe_delete_messages(bot, chat_id, message_ids).await;
    message_ids.clear();
    if let Some(trigger) = trigger {
        safe_delete_messages(bot, chat_id, &[trigger]).await;
    }

    match send_album(bot, chat_id, view, None).await {
        Ok(sent) => message_ids.extend(sent),
        Err(e) => {
            log::error!("Failed to send album of post {}: {}", view.post.id, e);
            if let Err(e) = bot.send_message(chat_id, "⚠️ Не вдалось вiдправити альбом").await {
                log::debug!("Cannot report album failure to {}: {}", chat_id, e);
            }
        }
    }
}

/// Deletes messages, ignoring the ones that are already gone
pub async fn safe_delete_messages(bot: &Bot, chat_id: ChatId, message_ids: &[MessageId]) {
    for message_id in message_ids {
        if let Err(e) = bot.delete_message(chat_id, *message_id).await {
            log::debug!("Cannot delete message {} in {}: {}", message_id.0, chat_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use telegencore::models::{Post, PostStatus};

    fn view(media: Vec<PostMedia>) -> PostView {
        PostView::new(
            Post {
                id: 1,
                flow_id: 1,
                content: "text".to_string(),
                original_content: None,
                status: PostStatus::Draft,
                source_id: None,
                source_url: None,
                original_link: None,
                original_date: None,
                publication_date: None,
                scheduled_time: None,
                created_at: Utc::now(),
            },
            media,
        )
    }

    #[test]
    fn test_media_path_resolution() {
        let root = Path::new("/srv/media");
        assert_eq!(
            media_path_in(root, "/media/posts/a.jpg"),
            Some(MediaFile::Local(PathBuf::from("/srv/media/posts/a.jpg")))
        );
        assert_eq!(
            media_path_in(root, "posts/b.jpg"),
            Some(MediaFile::Local(PathBuf::from("/srv/media/posts/b.jpg")))
        );
        assert!(matches!(
            media_path_in(root, "https://cdn.example.com/c.jpg"),
            Some(MediaFile::Remote(_))
        ));
        assert_eq!(media_path_in(root, "/media/../etc/passwd"), None);
        assert_eq!(media_path_in(root, "ftp://example.com/x.jpg"), None);
    }

    #[test]
    fn test_album_is_capped_and_captioned_once() {
        let media = (0..12)
            .map(|i| PostMedia::image(format!("https://cdn.example.com/{}.jpg", i), i))
            .collect();
        let items = album_media(&view(media), Some("<b>Title</b>"));
        assert_eq!(items.len(), MEDIA_GROUP_LIMIT);

        let captions: Vec<Option<String>> = items
            .iter()
            .map(|item| match item {
                InputMedia::Photo(photo) => photo.caption.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(captions[0].as_deref(), Some("<b>Title</b>"));
        assert!(captions[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_missing_local_files_are_skipped() {
        let media = vec![
            PostMedia::image("/media/does-not-exist.jpg", 0),
            PostMedia::video("https://cdn.example.com/v.mp4", 0),
        ];
        let items = album_media(&view(media), None);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], InputMedia::Video(_)));
    }
}
