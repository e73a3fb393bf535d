use strum::IntoEnumIterator;
use teloxide::types::InlineKeyboardButton;
use teloxide::utils::html::escape;

use telegencore::config::generation::VOLUME_OPTIONS;
use telegencore::models::{ContentLength, Flow, FlowSummary, Frequency, SourceType};

use super::wizard::{FlowWizard, Input, Stage, THEMES};
use crate::telegram::callback::{CallbackData, WizardAction};
use crate::telegram::cb;
use crate::telegram::menu::{flow_summary_text, Window};

fn wz(text: impl Into<String>, action: WizardAction) -> InlineKeyboardButton {
    cb(text, CallbackData::Wizard(action))
}

fn navigation() -> Vec<InlineKeyboardButton> {
    vec![
        wz("🔙 Назад", WizardAction::Back),
        wz("✖️ Скасувати", WizardAction::Cancel),
    ]
}

fn progress(stage: Stage) -> &'static str {
    match stage {
        Stage::Theme => "Крок 1/7",
        Stage::Sources => "Крок 2/7",
        Stage::Frequency => "Крок 3/7",
        Stage::Length => "Крок 4/7",
        Stage::TitleHighlight => "Крок 5/7",
        Stage::Volume => "Крок 6/7",
        Stage::Signature => "Крок 7/7",
    }
}

fn input_window(wizard: &FlowWizard, input: Input) -> Window {
    let text = match input {
        Input::CustomTheme => "✏️ Надішліть тему флоу одним повідомленням".to_string(),
        Input::SourceLink(source_type) => format!(
            "🔗 Надішліть посилання на джерело {}\n\nНаприклад: {}",
            source_type.label(),
            source_type.link_example()
        ),
        Input::CustomVolume => "✏️ Надішліть кількість постів за одну генерацію (від 1 до 50)".to_string(),
        Input::Signature => {
            return signature_window(wizard);
        }
    };
    Window::new(
        format!("⚡ <b>Створення флоу</b> · {}\n\n{}", progress(wizard.stage), text),
        vec![navigation()],
    )
}

fn signature_window(wizard: &FlowWizard) -> Window {
    Window::new(
        format!(
            "⚡ <b>Створення флоу</b> · {}\n\n✍️ Надішліть підпис, який додаватиметься в кінці кожного поста, або пропустіть цей крок",
            progress(wizard.stage)
        ),
        vec![vec![wz("⏭ Пропустити", WizardAction::SkipSignature)], navigation()],
    )
}

/// Window for the wizard's current stage (or the pending text prompt)
pub fn stage_window(wizard: &FlowWizard) -> Window {
    if let Some(input) = wizard.awaiting {
        return input_window(wizard, input);
    }

    let header = format!("⚡ <b>Створення флоу</b> · {}", progress(wizard.stage));
    let (text, mut rows): (String, Vec<Vec<InlineKeyboardButton>>) = match wizard.stage {
        Stage::Theme => (
            "🎯 Оберіть тему контенту".to_string(),
            THEMES
                .iter()
                .enumerate()
                .map(|(index, (label, _))| vec![wz(*label, WizardAction::Theme(index))])
                .chain(std::iter::once(vec![wz("✏️ Своя тема", WizardAction::CustomTheme)]))
                .collect(),
        ),
        Stage::Sources => {
            let added = if wizard.draft.sources.is_empty() {
                "Джерел ще немає.".to_string()
            } else {
                wizard
                    .draft
                    .sources
                    .iter()
                    .map(|s| format!("✅ {} {}", s.source_type.label(), escape(&s.link)))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let mut rows: Vec<Vec<InlineKeyboardButton>> = SourceType::iter()
                .collect::<Vec<_>>()
                .chunks(2)
                .map(|pair| {
                    pair.iter()
                        .map(|t| wz(t.label(), WizardAction::Source(*t)))
                        .collect()
                })
                .collect();
            if !wizard.draft.sources.is_empty() {
                rows.push(vec![wz("➡️ Далі", WizardAction::Next)]);
            }
            (format!("📰 Додайте джерела контенту\n\n{}", added), rows)
        }
        Stage::Frequency => (
            "⏱ Як часто генерувати пости?".to_string(),
            Frequency::iter()
                .map(|f| vec![wz(f.label(), WizardAction::Frequency(f))])
                .collect(),
        ),
        Stage::Length => (
            "📏 Оберіть максимальну довжину поста (символів)".to_string(),
            vec![ContentLength::iter()
                .map(|l| wz(l.label(), WizardAction::Length(l)))
                .collect()],
        ),
        Stage::TitleHighlight => (
            "🔠 Виділяти заголовок жирним шрифтом?".to_string(),
            vec![vec![
                wz("Так", WizardAction::TitleHighlight(true)),
                wz("Ні", WizardAction::TitleHighlight(false)),
            ]],
        ),
        Stage::Volume => (
            "📦 Скільки постів генерувати за раз?".to_string(),
            vec![
                VOLUME_OPTIONS
                    .iter()
                    .map(|v| wz(v.to_string(), WizardAction::Volume(*v)))
                    .collect(),
                vec![wz("✏️ Своя кількість", WizardAction::CustomVolume)],
            ],
        ),
        Stage::Signature => return signature_window(wizard),
    };

    rows.push(navigation());
    Window::new(format!("{}\n\n{}", header, text), rows)
}

/// Shown once the flow is saved
pub fn confirmation_window(channel_id: i64, flow: &Flow) -> Window {
    Window::new(
        format!(
            "✅ <b>Флоу створено!</b>\n\n{}",
            flow_summary_text(&FlowSummary::from(flow))
        ),
        vec![
            vec![cb("⚙️ Налаштування Flow", CallbackData::ShowFlow(channel_id))],
            vec![cb("🚀 Почати генерацію", CallbackData::GenerateNow(channel_id))],
        ],
    )
}
