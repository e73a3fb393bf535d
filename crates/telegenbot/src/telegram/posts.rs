//! Buffer: browsing a flow's draft posts one at a time

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, MessageId};
use teloxide::utils::html::escape;

use telegencore::config::media::MESSAGE_LIMIT;
use telegencore::models::{Channel, PostStatus, PostView};
use telegencore::markup::truncate_html;
use telegencore::storage::channels::get_channel;
use telegencore::storage::flows::get_flow;
use telegencore::storage::posts::{get_post_view, list_posts};
use telegencore::{get_connection, AppError, AppResult};

use crate::telegram::handlers::HandlerDeps;
use crate::telegram::media::{safe_delete_messages, send_media_album};
use crate::telegram::menu::{back_button, format_local, show_window, Window};
use crate::telegram::{cb, Bot, CallbackData};

/// Room left for the header and the HTML of a buffer window
const PREVIEW_TEXT_LIMIT: usize = MESSAGE_LIMIT - 512;

pub fn empty_buffer_window(channel: &Channel) -> Window {
    Window::new(
        format!(
            "📂 <b>{}</b>\n\nБуфер порожній. Згенеруйте нові пости, і вони з'являться тут.",
            escape(&channel.name)
        ),
        vec![
            vec![cb("🚀 Згенерувати зараз", CallbackData::GenerateNow(channel.id))],
            vec![back_button(CallbackData::Channel(channel.id))],
        ],
    )
}

/// Window for draft `index` of `total`
pub fn buffer_window(channel: &Channel, view: &PostView, index: usize, total: usize) -> Window {
    let post = &view.post;
    let mut text = format!(
        "📝 <b>Пост {}/{}</b> · {}\n🕐 Створено: {}",
        index + 1,
        total,
        escape(&channel.name),
        format_local(post.created_at, channel.tz())
    );
    if let Some(link) = post.original_link.as_deref().or(post.source_url.as_deref()) {
        text.push_str(&format!("\n🔗 Джерело: {}", escape(link)));
    }
    if view.has_media() {
        text.push_str(&format!("\n🖼 Медіа: {}", view.media.len()));
    }
    text.push_str("\n\n");
    text.push_str(&truncate_html(&post.content, PREVIEW_TEXT_LIMIT));

    let mut navigation = Vec::new();
    if index > 0 {
        navigation.push(cb(
            "◀️",
            CallbackData::BufferPost {
                flow_id: post.flow_id,
                index: index - 1,
            },
        ));
    }
    if index + 1 < total {
        navigation.push(cb(
            "▶️",
            CallbackData::BufferPost {
                flow_id: post.flow_id,
                index: index + 1,
            },
        ));
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    if !navigation.is_empty() {
        rows.push(navigation);
    }
    rows.push(vec![
        cb("✅ Опублікувати", CallbackData::PublishPost { post_id: post.id, index }),
        cb("🗓 Запланувати", CallbackData::SchedulePost { post_id: post.id, index }),
    ]);
    rows.push(vec![
        cb("✏️ Редагувати", CallbackData::EditPost { post_id: post.id, index }),
        cb("🗑 Видалити", CallbackData::DeletePost { post_id: post.id, index }),
    ]);
    rows.push(vec![back_button(CallbackData::Channel(channel.id))]);
    Window::new(text, rows)
}

pub fn edit_prompt_window(flow_id: i64, index: usize) -> Window {
    Window::new(
        "✏️ Надішліть новий текст поста одним повідомленням.\n\nФорматування (жирний, курсив, посилання) збережеться.",
        vec![vec![back_button(CallbackData::BufferPost { flow_id, index })]],
    )
}

/// Shows draft `index` (clamped) of a flow's buffer.
///
/// The album of the previously shown post is removed first. A post with
/// media is shown as its album followed by a fresh window message, since an
/// album cannot carry buttons.
pub async fn show_buffer_post(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    deps: &HandlerDeps,
    flow_id: i64,
    index: usize,
) -> AppResult<()> {
    let (channel, drafts, view) = {
        let conn = get_connection(&deps.db_pool)?;
        let flow = get_flow(&conn, flow_id)?.ok_or_else(|| AppError::NotFound(format!("flow {}", flow_id)))?;
        let channel = get_channel(&conn, flow.channel_id)?
            .ok_or_else(|| AppError::NotFound(format!("channel {}", flow.channel_id)))?;
        let drafts = list_posts(&conn, flow.id, PostStatus::Draft)?;
        let index = index.min(drafts.len().saturating_sub(1));
        let view = match drafts.get(index) {
            Some(post) => get_post_view(&conn, post.id)?,
            None => None,
        };
        (channel, drafts, view.map(|v| (v, index)))
    };

    let mut album = deps.albums.remove(&chat_id).map(|(_, ids)| ids).unwrap_or_default();

    let Some((view, index)) = view else {
        safe_delete_messages(bot, chat_id, &album).await;
        show_window(bot, chat_id, message_id, empty_buffer_window(&channel)).await?;
        return Ok(());
    };

    let window = buffer_window(&channel, &view, index, drafts.len());
    if !view.has_media() {
        safe_delete_messages(bot, chat_id, &album).await;
        show_window(bot, chat_id, message_id, window).await?;
        return Ok(());
    }

    send_media_album(bot, chat_id, message_id, &view, &mut album).await;
    if !album.is_empty() {
        deps.albums.insert(chat_id, album);
    }
    show_window(bot, chat_id, None, window).await?;
    Ok(())
}
