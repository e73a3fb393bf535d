//! Callback data carried by inline buttons
//!
//! Every button encodes one `CallbackData` as a short `prefix:arg:arg`
//! string; Telegram limits callback data to 64 bytes.

use std::fmt;
use std::str::FromStr;

use telegencore::models::{ContentLength, Frequency, PaymentMethod, SourceType};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown callback data: {0}")]
pub struct CallbackParseError(pub String);

/// Create-flow wizard button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    /// Preset theme by index into `dialogue::THEMES`
    Theme(usize),
    CustomTheme,
    Source(SourceType),
    Next,
    Frequency(Frequency),
    Length(ContentLength),
    TitleHighlight(bool),
    Volume(u32),
    CustomVolume,
    SkipSignature,
    Back,
    Cancel,
}

/// Flow settings button; `Open` shows the settings window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSetting {
    Open,
    Theme,
    FrequencyMenu,
    Frequency(Frequency),
    LengthMenu,
    Length(ContentLength),
    TitleHighlight,
    Volume,
    Signature,
    ClearSignature,
    Cta,
    ClearCta,
    Sources,
    AddSource(SourceType),
    /// Source by index into `Flow::sources`
    DeleteSource(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    MainMenu,
    Generation,
    Buffer,
    Settings,
    Subscription,
    /// Channel menu in the generation section (channel row id)
    Channel(i64),
    CreateFlow(i64),
    ShowFlow(i64),
    GenerateNow(i64),
    /// Generate only what the tariff still allows
    GeneratePartial(i64),
    BufferChannel(i64),
    BufferPost { flow_id: i64, index: usize },
    PublishPost { post_id: i64, index: usize },
    SchedulePost { post_id: i64, index: usize },
    DeletePost { post_id: i64, index: usize },
    EditPost { post_id: i64, index: usize },
    FlowSettings { channel_id: i64, setting: FlowSetting },
    ChannelSettings(i64),
    /// Timezone by index into `SUPPORTED_TIMEZONES`
    Timezone { channel_id: i64, index: usize },
    ToggleNotifications(i64),
    Tariff(i64),
    Period(i64),
    Pay { period_id: i64, method: PaymentMethod },
    PromoCode,
    Wizard(WizardAction),
}

impl fmt::Display for WizardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardAction::Theme(index) => write!(f, "wz:theme:{}", index),
            WizardAction::CustomTheme => f.write_str("wz:theme_custom"),
            WizardAction::Source(source_type) => write!(f, "wz:src:{}", source_type),
            WizardAction::Next => f.write_str("wz:next"),
            WizardAction::Frequency(frequency) => write!(f, "wz:freq:{}", frequency),
            WizardAction::Length(length) => write!(f, "wz:len:{}", length),
            WizardAction::TitleHighlight(on) => write!(f, "wz:title:{}", u8::from(*on)),
            WizardAction::Volume(volume) => write!(f, "wz:vol:{}", volume),
            WizardAction::CustomVolume => f.write_str("wz:vol_custom"),
            WizardAction::SkipSignature => f.write_str("wz:sig_skip"),
            WizardAction::Back => f.write_str("wz:back"),
            WizardAction::Cancel => f.write_str("wz:cancel"),
        }
    }
}

impl fmt::Display for FlowSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowSetting::Open => Ok(()),
            FlowSetting::Theme => f.write_str(":theme"),
            FlowSetting::FrequencyMenu => f.write_str(":freq"),
            FlowSetting::Frequency(frequency) => write!(f, ":freq:{}", frequency),
            FlowSetting::LengthMenu => f.write_str(":len"),
            FlowSetting::Length(length) => write!(f, ":len:{}", length),
            FlowSetting::TitleHighlight => f.write_str(":title"),
            FlowSetting::Volume => f.write_str(":vol"),
            FlowSetting::Signature => f.write_str(":sig"),
            FlowSetting::ClearSignature => f.write_str(":sig_del"),
            FlowSetting::Cta => f.write_str(":cta"),
            FlowSetting::ClearCta => f.write_str(":cta_del"),
            FlowSetting::Sources => f.write_str(":src"),
            FlowSetting::AddSource(source_type) => write!(f, ":src_add:{}", source_type),
            FlowSetting::DeleteSource(index) => write!(f, ":src_del:{}", index),
        }
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackData::MainMenu => f.write_str("menu:main"),
            CallbackData::Generation => f.write_str("menu:gen"),
            CallbackData::Buffer => f.write_str("menu:buf"),
            CallbackData::Settings => f.write_str("menu:set"),
            CallbackData::Subscription => f.write_str("menu:sub"),
            CallbackData::Channel(id) => write!(f, "ch:{}", id),
            CallbackData::CreateFlow(id) => write!(f, "flow:new:{}", id),
            CallbackData::ShowFlow(id) => write!(f, "flow:show:{}", id),
            CallbackData::GenerateNow(id) => write!(f, "flow:gen:{}", id),
            CallbackData::GeneratePartial(id) => write!(f, "flow:genp:{}", id),
            CallbackData::BufferChannel(id) => write!(f, "buf:ch:{}", id),
            CallbackData::BufferPost { flow_id, index } => write!(f, "buf:{}:{}", flow_id, index),
            CallbackData::PublishPost { post_id, index } => write!(f, "post:pub:{}:{}", post_id, index),
            CallbackData::SchedulePost { post_id, index } => write!(f, "post:sched:{}:{}", post_id, index),
            CallbackData::DeletePost { post_id, index } => write!(f, "post:del:{}:{}", post_id, index),
            CallbackData::EditPost { post_id, index } => write!(f, "post:edit:{}:{}", post_id, index),
            CallbackData::FlowSettings { channel_id, setting } => write!(f, "fs:{}{}", channel_id, setting),
            CallbackData::ChannelSettings(id) => write!(f, "set:{}", id),
            CallbackData::Timezone { channel_id, index } => write!(f, "tz:{}:{}", channel_id, index),
            CallbackData::ToggleNotifications(id) => write!(f, "notif:{}", id),
            CallbackData::Tariff(id) => write!(f, "sub:tariff:{}", id),
            CallbackData::Period(id) => write!(f, "sub:period:{}", id),
            CallbackData::Pay { period_id, method } => write!(f, "sub:pay:{}:{}", period_id, method),
            CallbackData::PromoCode => f.write_str("sub:promo"),
            CallbackData::Wizard(action) => action.fmt(f),
        }
    }
}

impl FromStr for CallbackData {
    type Err = CallbackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || CallbackParseError(s.to_string());
        let id = |raw: &str| raw.parse::<i64>().map_err(|_| err());
        let index = |raw: &str| raw.parse::<usize>().map_err(|_| err());

        let parts: Vec<&str> = s.split(':').collect();
        let data = match parts.as_slice() {
            ["menu", "main"] => CallbackData::MainMenu,
            ["menu", "gen"] => CallbackData::Generation,
            ["menu", "buf"] => CallbackData::Buffer,
            ["menu", "set"] => CallbackData::Settings,
            ["menu", "sub"] => CallbackData::Subscription,
            ["ch", channel] => CallbackData::Channel(id(channel)?),
            ["flow", "new", channel] => CallbackData::CreateFlow(id(channel)?),
            ["flow", "show", channel] => CallbackData::ShowFlow(id(channel)?),
            ["flow", "gen", channel] => CallbackData::GenerateNow(id(channel)?),
            ["flow", "genp", channel] => CallbackData::GeneratePartial(id(channel)?),
            ["buf", "ch", channel] => CallbackData::BufferChannel(id(channel)?),
            ["buf", flow, i] => CallbackData::BufferPost {
                flow_id: id(flow)?,
                index: index(i)?,
            },
            ["post", action, post, i] => {
                let (post_id, index) = (id(post)?, index(i)?);
                match *action {
                    "pub" => CallbackData::PublishPost { post_id, index },
                    "sched" => CallbackData::SchedulePost { post_id, index },
                    "del" => CallbackData::DeletePost { post_id, index },
                    "edit" => CallbackData::EditPost { post_id, index },
                    _ => return Err(err()),
                }
            }
            ["fs", channel, rest @ ..] => CallbackData::FlowSettings {
                channel_id: id(channel)?,
                setting: parse_flow_setting(rest).ok_or_else(err)?,
            },
            ["set", channel] => CallbackData::ChannelSettings(id(channel)?),
            ["tz", channel, i] => CallbackData::Timezone {
                channel_id: id(channel)?,
                index: index(i)?,
            },
            ["notif", channel] => CallbackData::ToggleNotifications(id(channel)?),
            ["sub", "tariff", tariff] => CallbackData::Tariff(id(tariff)?),
            ["sub", "period", period] => CallbackData::Period(id(period)?),
            ["sub", "pay", period, method] => CallbackData::Pay {
                period_id: id(period)?,
                method: method.parse().map_err(|_| err())?,
            },
            ["sub", "promo"] => CallbackData::PromoCode,
            ["wz", rest @ ..] => CallbackData::Wizard(parse_wizard(rest).ok_or_else(err)?),
            _ => return Err(err()),
        };
        Ok(data)
    }
}

fn parse_flow_setting(parts: &[&str]) -> Option<FlowSetting> {
    let setting = match parts {
        [] => FlowSetting::Open,
        ["theme"] => FlowSetting::Theme,
        ["freq"] => FlowSetting::FrequencyMenu,
        ["freq", frequency] => FlowSetting::Frequency(frequency.parse().ok()?),
        ["len"] => FlowSetting::LengthMenu,
        ["len", length] => FlowSetting::Length(length.parse().ok()?),
        ["title"] => FlowSetting::TitleHighlight,
        ["vol"] => FlowSetting::Volume,
        ["sig"] => FlowSetting::Signature,
        ["sig_del"] => FlowSetting::ClearSignature,
        ["cta"] => FlowSetting::Cta,
        ["cta_del"] => FlowSetting::ClearCta,
        ["src"] => FlowSetting::Sources,
        ["src_add", source_type] => FlowSetting::AddSource(source_type.parse().ok()?),
        ["src_del", i] => FlowSetting::DeleteSource(i.parse().ok()?),
        _ => return None,
    };
    Some(setting)
}

fn parse_wizard(parts: &[&str]) -> Option<WizardAction> {
    let action = match parts {
        ["theme", i] => WizardAction::Theme(i.parse().ok()?),
        ["theme_custom"] => WizardAction::CustomTheme,
        ["src", source_type] => WizardAction::Source(source_type.parse().ok()?),
        ["next"] => WizardAction::Next,
        ["freq", frequency] => WizardAction::Frequency(frequency.parse().ok()?),
        ["len", length] => WizardAction::Length(length.parse().ok()?),
        ["title", "1"] => WizardAction::TitleHighlight(true),
        ["title", "0"] => WizardAction::TitleHighlight(false),
        ["vol", volume] => WizardAction::Volume(volume.parse().ok()?),
        ["vol_custom"] => WizardAction::CustomVolume,
        ["sig_skip"] => WizardAction::SkipSignature,
        ["back"] => WizardAction::Back,
        ["cancel"] => WizardAction::Cancel,
        _ => return None,
    };
    Some(action)
}
