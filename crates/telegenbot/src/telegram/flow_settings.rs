//! Editing an existing flow
//!
//! Buttons change a setting at once; theme, volume, signature, CTA and new
//! sources are typed in while the chat is in `State::EditingFlow`. The
//! functions here only change a `Flow` in memory, handlers save it.

use strum::IntoEnumIterator;
use teloxide::types::InlineKeyboardButton;
use teloxide::utils::html::escape;

use telegencore::config::generation::{MAX_FLOW_VOLUME, MIN_FLOW_VOLUME};
use telegencore::models::flow::is_valid_link;
use telegencore::models::{Channel, ContentLength, Flow, FlowSource, Frequency, SourceType};

use crate::telegram::callback::FlowSetting;
use crate::telegram::dialogue::WizardError;
use crate::telegram::menu::{back_button, Window};
use crate::telegram::{cb, CallbackData};

/// Flow setting that is answered with a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowField {
    Theme,
    Volume,
    Signature,
    Cta,
    Source(SourceType),
}

impl FlowField {
    /// Field a settings button asks for, if it asks for text
    pub fn of(setting: FlowSetting) -> Option<Self> {
        match setting {
            FlowSetting::Theme => Some(FlowField::Theme),
            FlowSetting::Volume => Some(FlowField::Volume),
            FlowSetting::Signature => Some(FlowField::Signature),
            FlowSetting::Cta => Some(FlowField::Cta),
            FlowSetting::AddSource(source_type) => Some(FlowField::Source(source_type)),
            _ => None,
        }
    }
}

fn non_empty(text: &str) -> Result<String, WizardError> {
    match text.trim() {
        "" => Err(WizardError::EmptyText),
        text => Ok(text.to_string()),
    }
}

/// Applies a typed answer to `flow`
pub fn apply_text(flow: &mut Flow, field: FlowField, text: &str) -> Result<(), WizardError> {
    match field {
        FlowField::Theme => flow.theme = non_empty(text)?,
        FlowField::Volume => {
            let volume = text.trim().parse::<u32>().map_err(|_| WizardError::VolumeOutOfRange)?;
            if !(MIN_FLOW_VOLUME..=MAX_FLOW_VOLUME).contains(&volume) {
                return Err(WizardError::VolumeOutOfRange);
            }
            flow.flow_volume = volume;
        }
        FlowField::Signature => flow.signature = Some(non_empty(text)?),
        FlowField::Cta => flow.cta = Some(non_empty(text)?),
        FlowField::Source(source_type) => {
            let link = text.trim();
            if !is_valid_link(link) {
                return Err(WizardError::InvalidLink);
            }
            flow.sources.push(FlowSource::new(source_type, link));
        }
    }
    Ok(())
}

/// Applies a button that changes `flow` directly.
///
/// Returns `Ok(false)` for buttons that only navigate or ask for text.
/// The last source cannot be deleted.
pub fn apply_setting(flow: &mut Flow, setting: FlowSetting) -> Result<bool, WizardError> {
    match setting {
        FlowSetting::Frequency(frequency) => flow.frequency = frequency,
        FlowSetting::Length(length) => flow.content_length = length,
        FlowSetting::TitleHighlight => flow.title_highlight = !flow.title_highlight,
        FlowSetting::ClearSignature => flow.signature = None,
        FlowSetting::ClearCta => flow.cta = None,
        FlowSetting::DeleteSource(index) => {
            if flow.sources.len() <= 1 {
                return Err(WizardError::LastSource);
            }
            if index >= flow.sources.len() {
                return Err(WizardError::StaleStep);
            }
            flow.sources.remove(index);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn fs(text: impl Into<String>, channel_id: i64, setting: FlowSetting) -> InlineKeyboardButton {
    cb(text, CallbackData::FlowSettings { channel_id, setting })
}

fn on_off(on: bool) -> &'static str {
    if on {
        "✅"
    } else {
        "❌"
    }
}

pub fn settings_window(channel: &Channel, flow: &Flow) -> Window {
    let id = channel.id;
    let text = format!(
        "⚙️ <b>Налаштування флоу</b> · {}\n\n🎯 Тема: {}\n⏱ Частота: {}\n📏 Довжина: {} символів\n🔠 Виділення заголовка: {}\n📦 Постів за генерацію: {}\n✍️ Підпис: {}\n📣 Рекламний блок: {}\n📰 Джерел: {}",
        escape(&channel.name),
        escape(&flow.theme),
        flow.frequency.label(),
        flow.content_length.label(),
        on_off(flow.title_highlight),
        flow.flow_volume,
        flow.signature.as_deref().map_or_else(|| "немає".to_string(), escape),
        flow.cta.as_deref().map_or_else(|| "немає".to_string(), escape),
        flow.sources.len(),
    );

    let mut rows = vec![
        vec![fs("🎯 Тема", id, FlowSetting::Theme), fs("📰 Джерела", id, FlowSetting::Sources)],
        vec![
            fs("⏱ Частота", id, FlowSetting::FrequencyMenu),
            fs("📏 Довжина", id, FlowSetting::LengthMenu),
        ],
        vec![
            fs(
                format!("🔠 Заголовок {}", on_off(flow.title_highlight)),
                id,
                FlowSetting::TitleHighlight,
            ),
            fs("📦 Кількість постів", id, FlowSetting::Volume),
        ],
    ];
    let mut signature_row = vec![fs("✍️ Підпис", id, FlowSetting::Signature)];
    if flow.signature.is_some() {
        signature_row.push(fs("🗑 Прибрати підпис", id, FlowSetting::ClearSignature));
    }
    rows.push(signature_row);
    let mut cta_row = vec![fs("📣 Рекламний блок", id, FlowSetting::Cta)];
    if flow.cta.is_some() {
        cta_row.push(fs("🗑 Прибрати блок", id, FlowSetting::ClearCta));
    }
    rows.push(cta_row);
    rows.push(vec![back_button(CallbackData::ShowFlow(id))]);
    Window::new(text, rows)
}

fn back_to_settings(channel_id: i64) -> InlineKeyboardButton {
    back_button(CallbackData::FlowSettings {
        channel_id,
        setting: FlowSetting::Open,
    })
}

pub fn frequency_window(channel: &Channel, flow: &Flow) -> Window {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Frequency::iter()
        .map(|f| {
            let mark = if f == flow.frequency { "✅ " } else { "" };
            vec![fs(format!("{}{}", mark, f.label()), channel.id, FlowSetting::Frequency(f))]
        })
        .collect();
    rows.push(vec![back_to_settings(channel.id)]);
    Window::new("⏱ Як часто генерувати пости?", rows)
}

pub fn length_window(channel: &Channel, flow: &Flow) -> Window {
    let buttons = ContentLength::iter()
        .map(|l| {
            let mark = if l == flow.content_length { "✅ " } else { "" };
            fs(format!("{}{}", mark, l.label()), channel.id, FlowSetting::Length(l))
        })
        .collect();
    Window::new(
        "📏 Оберіть максимальну довжину поста (символів)",
        vec![buttons, vec![back_to_settings(channel.id)]],
    )
}

pub fn sources_window(channel: &Channel, flow: &Flow) -> Window {
    let listed = flow
        .sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} {}", i + 1, s.source_type.label(), escape(&s.link)))
        .collect::<Vec<_>>()
        .join("\n");
    let mut rows: Vec<Vec<InlineKeyboardButton>> = (0..flow.sources.len())
        .map(|i| vec![fs(format!("🗑 Видалити {}", i + 1), channel.id, FlowSetting::DeleteSource(i))])
        .collect();
    rows.extend(SourceType::iter().collect::<Vec<_>>().chunks(2).map(|pair| {
        pair.iter()
            .map(|t| fs(format!("➕ {}", t.label()), channel.id, FlowSetting::AddSource(*t)))
            .collect()
    }));
    rows.push(vec![back_to_settings(channel.id)]);
    Window::new(format!("📰 <b>Джерела</b>\n\n{}", listed), rows)
}

/// Asks for the text of `field`
pub fn prompt_window(channel_id: i64, field: FlowField) -> Window {
    let text = match field {
        FlowField::Theme => "✏️ Надішліть нову тему флоу".to_string(),
        FlowField::Volume => "✏️ Надішліть кількість постів за одну генерацію (від 1 до 50)".to_string(),
        FlowField::Signature => "✍️ Надішліть підпис, який додаватиметься в кінці кожного поста".to_string(),
        FlowField::Cta => "📣 Надішліть текст рекламного блоку (заклик до дії)".to_string(),
        FlowField::Source(source_type) => format!(
            "🔗 Надішліть посилання на джерело {}\n\nНаприклад: {}",
            source_type.label(),
            source_type.link_example()
        ),
    };
    Window::new(text, vec![vec![back_to_settings(channel_id)]])
}
