//! Windows: HTML text plus an inline keyboard
//!
//! Render functions are pure; `show_window` puts a window on screen by
//! editing the message the button was pressed on, or sending a new one.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::html::escape;
use teloxide::{ApiError, RequestError};

use telegencore::config;
use telegencore::models::{Channel, Flow, FlowSummary, SUPPORTED_TIMEZONES};

use crate::telegram::callback::FlowSetting;
use crate::telegram::{cb, Bot, CallbackData};

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

impl Window {
    pub fn new(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self {
            text: text.into(),
            keyboard: InlineKeyboardMarkup::new(rows),
        }
    }
}

/// Which section a channel list leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Generation,
    Buffer,
    Settings,
}

pub fn back_button(target: CallbackData) -> InlineKeyboardButton {
    cb("🔙 Назад", target)
}

/// `25.12.2025 18:30` in the given timezone
pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%d.%m.%Y %H:%M").to_string()
}

/// Edits `message_id` into the window, or sends it as a new message
pub async fn show_window(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    window: Window,
) -> ResponseResult<()> {
    if let Some(message_id) = message_id {
        let edited = bot
            .edit_message_text(chat_id, message_id, window.text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(window.keyboard.clone())
            .await;
        match edited {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
            Err(e) => log::debug!("Cannot edit message {} in {}: {}, sending a new one", message_id.0, chat_id, e),
        }
    }

    bot.send_message(chat_id, window.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(window.keyboard)
        .await?;
    Ok(())
}

pub fn main_menu(name: &str) -> Window {
    Window::new(
        format!(
            "👋 Вітаю, <b>{}</b>!\n\nЯ генерую та публікую пости у ваших каналах.\nОберіть розділ:",
            escape(name)
        ),
        vec![
            vec![
                cb("✨ Генерація", CallbackData::Generation),
                cb("📂 Буфер", CallbackData::Buffer),
            ],
            vec![
                cb("⚙️ Налаштування", CallbackData::Settings),
                cb("💎 Підписка", CallbackData::Subscription),
            ],
        ],
    )
}

pub fn help_text() -> &'static str {
    indoc::indoc! {"
        🆘 <b>Допомога</b>

        1. Додайте бота адміністратором у свій канал.
        2. У розділі ✨ Генерація створіть флоу: тему, джерела та розклад.
        3. Згенеровані пости з'являться у 📂 Буфері, звідки їх можна опублікувати або запланувати.

        /start - головне меню
        /subscription - підписка та тарифи
        /cancel - скасувати поточну дію
    "}
}

/// Link that opens Telegram's "add bot to channel" picker with posting rights
pub fn add_to_channel_url() -> Option<url::Url> {
    url::Url::parse(&format!(
        "https://t.me/{}?startchannel&admin=post_messages+edit_messages+delete_messages",
        *config::BOT_USERNAME
    ))
    .ok()
}

pub fn channels_window(channels: &[Channel], section: Section) -> Window {
    let title = match section {
        Section::Generation => "✨ <b>Генерація</b>",
        Section::Buffer => "📂 <b>Буфер</b>",
        Section::Settings => "⚙️ <b>Налаштування</b>",
    };
    let text = if channels.is_empty() {
        format!(
            "{}\n\nУ вас ще немає каналів.\nДодайте бота адміністратором у свій канал, і він з'явиться тут.",
            title
        )
    } else {
        format!("{}\n\nОберіть канал:", title)
    };

    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .map(|channel| {
            let target = match section {
                Section::Generation => CallbackData::Channel(channel.id),
                Section::Buffer => CallbackData::BufferChannel(channel.id),
                Section::Settings => CallbackData::ChannelSettings(channel.id),
            };
            vec![cb(format!("📢 {}", channel.name), target)]
        })
        .collect();
    if section == Section::Generation {
        if let Some(url) = add_to_channel_url() {
            rows.push(vec![InlineKeyboardButton::url("➕ Додати канал", url)]);
        }
    }
    rows.push(vec![back_button(CallbackData::MainMenu)]);
    Window::new(text, rows)
}

pub fn channel_menu(channel: &Channel, flow: Option<&Flow>, drafts: i64) -> Window {
    let flow_line = match flow {
        Some(flow) => format!("📋 Флоу: <b>{}</b> ({})", escape(&flow.name), escape(&flow.theme)),
        None => "📋 Флоу: ще не створено".to_string(),
    };
    let text = format!(
        "📢 <b>{}</b>\n\n{}\n📝 Чернеток у буфері: {}",
        escape(&channel.name),
        flow_line,
        drafts
    );
    Window::new(
        text,
        vec![
            vec![
                cb("⚡ Створити флоу", CallbackData::CreateFlow(channel.id)),
                cb("📋 Флоу", CallbackData::ShowFlow(channel.id)),
            ],
            vec![cb("🚀 Згенерувати зараз", CallbackData::GenerateNow(channel.id))],
            vec![cb("📂 Буфер", CallbackData::BufferChannel(channel.id))],
            vec![back_button(CallbackData::Generation)],
        ],
    )
}

pub fn flow_summary_text(summary: &FlowSummary) -> String {
    let sources = summary
        .sources
        .iter()
        .map(|s| format!("  • {} {}", s.source_type.label(), escape(&s.link)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "📋 <b>{}</b>\n\n🎯 Тема: {}\n📰 Джерела:\n{}\n⏱ Частота: {}\n📏 Довжина: {} символів\n🔠 Виділення заголовка: {}\n📦 Постів за генерацію: {}\n✍️ Підпис: {}",
        escape(&summary.flow_name),
        escape(&summary.theme),
        sources,
        summary.frequency.label(),
        summary.content_length.label(),
        if summary.title_highlight { "так" } else { "ні" },
        summary.flow_volume,
        summary.signature.as_deref().map_or_else(|| "немає".to_string(), escape),
    )
}

pub fn flow_window(channel: &Channel, flow: &Flow) -> Window {
    let mut text = flow_summary_text(&FlowSummary::from(flow));
    if let Some(next) = flow.next_generation_time {
        text.push_str(&format!("\n\n🕐 Наступна генерація: {}", format_local(next, channel.tz())));
    }
    Window::new(
        text,
        vec![
            vec![cb("🚀 Згенерувати зараз", CallbackData::GenerateNow(channel.id))],
            vec![
                cb("📂 Буфер", CallbackData::BufferChannel(channel.id)),
                cb(
                    "⚙️ Налаштування",
                    CallbackData::FlowSettings {
                        channel_id: channel.id,
                        setting: FlowSetting::Open,
                    },
                ),
            ],
            vec![back_button(CallbackData::Channel(channel.id))],
        ],
    )
}

pub fn channel_settings_window(channel: &Channel) -> Window {
    let text = format!(
        "⚙️ <b>{}</b>\n\n🌍 Часовий пояс: {}\n🔔 Сповіщення: {}",
        escape(&channel.name),
        channel.timezone,
        if channel.notifications { "увімкнено" } else { "вимкнено" }
    );
    let mut rows: Vec<Vec<InlineKeyboardButton>> = SUPPORTED_TIMEZONES
        .iter()
        .enumerate()
        .map(|(index, tz)| {
            let mark = if *tz == channel.timezone { "✅ " } else { "" };
            vec![cb(
                format!("{}{}", mark, tz),
                CallbackData::Timezone {
                    channel_id: channel.id,
                    index,
                },
            )]
        })
        .collect();
    let toggle = if channel.notifications {
        "🔕 Вимкнути сповіщення"
    } else {
        "🔔 Увімкнути сповіщення"
    };
    rows.push(vec![cb(toggle, CallbackData::ToggleNotifications(channel.id))]);
    rows.push(vec![back_button(CallbackData::Settings)]);
    Window::new(text, rows)
}
