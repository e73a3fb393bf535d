//! Create-flow wizard
//!
//! Theme → Sources → Frequency → Length → TitleHighlight → Volume →
//! Signature. Limit checks that need the database (sources per tariff) are
//! done by the handlers before calling in here.

use telegencore::config::generation::{MAX_FLOW_VOLUME, MIN_FLOW_VOLUME};
use telegencore::models::flow::is_valid_link;
use telegencore::models::{ContentLength, FlowSource, Frequency, SourceType};
use telegencore::storage::flows::NewFlow;
use thiserror::Error;

/// Preset themes: (button label, stored theme)
pub const THEMES: [(&str, &str); 3] = [
    ("⚽ Спорт", "Sport"),
    ("🍳 Кулінарія", "Cooking"),
    ("🏙 Регіональні новини", "Regional"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Theme,
    Sources,
    Frequency,
    Length,
    TitleHighlight,
    Volume,
    Signature,
}

impl Stage {
    fn previous(self) -> Option<Stage> {
        match self {
            Stage::Theme => None,
            Stage::Sources => Some(Stage::Theme),
            Stage::Frequency => Some(Stage::Sources),
            Stage::Length => Some(Stage::Frequency),
            Stage::TitleHighlight => Some(Stage::Length),
            Stage::Volume => Some(Stage::TitleHighlight),
            Stage::Signature => Some(Stage::Volume),
        }
    }
}

/// Free-text input the wizard is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    CustomTheme,
    SourceLink(SourceType),
    CustomVolume,
    Signature,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("❌ Посилання має починатися з http:// або https://")]
    InvalidLink,
    #[error("❌ Додайте хоча б одне джерело")]
    NoSources,
    #[error("❌ Введіть число від 1 до 50")]
    VolumeOutOfRange,
    #[error("❌ Текст не може бути порожнім")]
    EmptyText,
    #[error("⚠️ Зараз очікується вибір кнопкою")]
    UnexpectedInput,
    #[error("⚠️ Ця кнопка вже неактивна")]
    StaleStep,
    #[error("❌ Флоу має мати хоча б одне джерело")]
    LastSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowWizard {
    pub channel_id: i64,
    pub stage: Stage,
    pub awaiting: Option<Input>,
    pub draft: NewFlow,
}

impl FlowWizard {
    /// Starts the wizard for a channel; the flow is named after the channel
    pub fn new(channel_id: i64, channel_name: &str) -> Self {
        Self {
            channel_id,
            stage: Stage::Theme,
            awaiting: None,
            draft: NewFlow {
                channel_id,
                name: channel_name.to_string(),
                ..NewFlow::default()
            },
        }
    }

    fn require(&self, stage: Stage) -> Result<(), WizardError> {
        if self.stage != stage {
            return Err(WizardError::StaleStep);
        }
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.awaiting = (stage == Stage::Signature).then_some(Input::Signature);
    }

    pub fn choose_theme(&mut self, theme: &str) -> Result<(), WizardError> {
        self.require(Stage::Theme)?;
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(WizardError::EmptyText);
        }
        self.draft.theme = theme.to_string();
        self.enter(Stage::Sources);
        Ok(())
    }

    /// Waits for free text; only the stage that owns `input` may ask for it
    pub fn ask(&mut self, input: Input) -> Result<(), WizardError> {
        let stage = match input {
            Input::CustomTheme => Stage::Theme,
            Input::SourceLink(_) => Stage::Sources,
            Input::CustomVolume => Stage::Volume,
            Input::Signature => Stage::Signature,
        };
        self.require(stage)?;
        self.awaiting = Some(input);
        Ok(())
    }

    /// Adds the link the wizard asked for with `Input::SourceLink`
    pub fn add_source(&mut self, link: &str) -> Result<SourceType, WizardError> {
        let Some(Input::SourceLink(source_type)) = self.awaiting else {
            return Err(WizardError::UnexpectedInput);
        };
        let link = link.trim();
        if !is_valid_link(link) {
            return Err(WizardError::InvalidLink);
        }
        self.draft.sources.push(FlowSource::new(source_type, link));
        self.awaiting = None;
        Ok(source_type)
    }

    /// Leaves the sources stage; refused while no source was added
    pub fn next_from_sources(&mut self) -> Result<(), WizardError> {
        self.require(Stage::Sources)?;
        if self.draft.sources.is_empty() {
            return Err(WizardError::NoSources);
        }
        self.enter(Stage::Frequency);
        Ok(())
    }

    pub fn choose_frequency(&mut self, frequency: Frequency) -> Result<(), WizardError> {
        self.require(Stage::Frequency)?;
        self.draft.frequency = frequency;
        self.enter(Stage::Length);
        Ok(())
    }

    pub fn choose_length(&mut self, length: ContentLength) -> Result<(), WizardError> {
        self.require(Stage::Length)?;
        self.draft.content_length = length;
        self.enter(Stage::TitleHighlight);
        Ok(())
    }

    pub fn choose_title_highlight(&mut self, on: bool) -> Result<(), WizardError> {
        self.require(Stage::TitleHighlight)?;
        self.draft.title_highlight = on;
        self.enter(Stage::Volume);
        Ok(())
    }

    pub fn choose_volume(&mut self, volume: u32) -> Result<(), WizardError> {
        self.require(Stage::Volume)?;
        if !(MIN_FLOW_VOLUME..=MAX_FLOW_VOLUME).contains(&volume) {
            return Err(WizardError::VolumeOutOfRange);
        }
        self.draft.flow_volume = volume;
        self.enter(Stage::Signature);
        Ok(())
    }

    pub fn custom_volume(&mut self, text: &str) -> Result<(), WizardError> {
        let volume = text.trim().parse::<u32>().map_err(|_| WizardError::VolumeOutOfRange)?;
        self.choose_volume(volume)
    }

    /// Sets or skips the signature; the wizard is complete afterwards
    pub fn set_signature(&mut self, signature: Option<&str>) -> Result<(), WizardError> {
        self.require(Stage::Signature)?;
        let signature = match signature.map(str::trim) {
            Some("") => return Err(WizardError::EmptyText),
            other => other.map(str::to_string),
        };
        self.draft.signature = signature;
        self.awaiting = None;
        Ok(())
    }

    /// Handles a text message according to what the wizard is waiting for
    pub fn accept_text(&mut self, text: &str) -> Result<Input, WizardError> {
        let Some(input) = self.awaiting else {
            return Err(WizardError::UnexpectedInput);
        };
        match input {
            Input::CustomTheme => self.choose_theme(text)?,
            Input::SourceLink(_) => {
                self.add_source(text)?;
            }
            Input::CustomVolume => self.custom_volume(text)?,
            Input::Signature => self.set_signature(Some(text))?,
        }
        Ok(input)
    }

    /// Goes one step back. A pending custom input is dropped first.
    ///
    /// Returns `false` on the first stage, where back leaves the wizard.
    pub fn back(&mut self) -> bool {
        match self.awaiting {
            Some(Input::Signature) | None => match self.stage.previous() {
                Some(previous) => {
                    self.enter(previous);
                    true
                }
                None => false,
            },
            Some(_) => {
                self.awaiting = None;
                true
            }
        }
    }

    /// Whether the signature step has been answered with a usable draft
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Signature
            && self.awaiting.is_none()
            && !self.draft.theme.is_empty()
            && !self.draft.sources.is_empty()
    }

    pub fn into_new_flow(self) -> NewFlow {
        self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_sources() -> FlowWizard {
        let mut wizard = FlowWizard::new(1, "My channel");
        wizard.choose_theme("Sport").unwrap();
        wizard
    }

    #[test]
    fn test_custom_theme_is_trimmed_and_required() {
        let mut wizard = FlowWizard::new(1, "My channel");
        wizard.ask(Input::CustomTheme).unwrap();
        assert_eq!(wizard.accept_text("   "), Err(WizardError::EmptyText));
        assert_eq!(wizard.stage, Stage::Theme);
        assert_eq!(wizard.accept_text("  Crypto "), Ok(Input::CustomTheme));
        assert_eq!(wizard.draft.theme, "Crypto");
        assert_eq!(wizard.stage, Stage::Sources);
        assert_eq!(wizard.draft.name, "My channel");
    }

    #[test]
    fn test_link_without_request_is_unexpected() {
        let mut wizard = at_sources();
        assert_eq!(wizard.add_source("https://t.me/x"), Err(WizardError::UnexpectedInput));
    }

    #[test]
    fn test_signature_stage_waits_for_text() {
        let mut wizard = at_sources();
        wizard.ask(Input::SourceLink(SourceType::Web)).unwrap();
        wizard.add_source("https://example.com").unwrap();
        wizard.next_from_sources().unwrap();
        wizard.choose_frequency(Frequency::Daily).unwrap();
        wizard.choose_length(ContentLength::To100).unwrap();
        wizard.choose_title_highlight(false).unwrap();
        wizard.choose_volume(10).unwrap();
        assert_eq!(wizard.awaiting, Some(Input::Signature));
        assert!(!wizard.is_complete());

        assert_eq!(wizard.set_signature(Some("  ")), Err(WizardError::EmptyText));
        wizard.set_signature(None).unwrap();
        assert!(wizard.is_complete());
        assert_eq!(wizard.into_new_flow().signature, None);
    }

    #[test]
    fn test_buttons_from_later_steps_are_refused() {
        let mut wizard = FlowWizard::new(1, "My channel");
        assert_eq!(wizard.choose_frequency(Frequency::Hourly), Err(WizardError::StaleStep));
        assert_eq!(wizard.choose_length(ContentLength::To300), Err(WizardError::StaleStep));
        assert_eq!(wizard.choose_title_highlight(true), Err(WizardError::StaleStep));
        assert_eq!(wizard.choose_volume(5), Err(WizardError::StaleStep));
        assert_eq!(wizard.set_signature(None), Err(WizardError::StaleStep));
        assert_eq!(wizard.ask(Input::CustomVolume), Err(WizardError::StaleStep));
        assert_eq!(wizard.stage, Stage::Theme);
        assert!(!wizard.is_complete());
        assert!(wizard.draft.theme.is_empty());
    }

    #[test]
    fn test_old_button_after_back_is_refused() {
        let mut wizard = at_sources();
        wizard.ask(Input::SourceLink(SourceType::Telegram)).unwrap();
        wizard.add_source("https://t.me/news").unwrap();
        wizard.next_from_sources().unwrap();
        assert!(wizard.back());
        assert_eq!(wizard.stage, Stage::Sources);
        assert_eq!(wizard.choose_frequency(Frequency::Daily), Err(WizardError::StaleStep));
        assert_eq!(wizard.choose_theme("Cooking"), Err(WizardError::StaleStep));
        assert_eq!(wizard.draft.theme, "Sport");
    }
}
