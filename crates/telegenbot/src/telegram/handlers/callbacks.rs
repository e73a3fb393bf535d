//! Inline button routing
//!
//! Every callback is answered exactly once, after the action ran: silently,
//! with a toast, or with an alert for refusals.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::utils::html::escape;

use telegencore::billing::limits::{can_add_channel, can_add_source, remaining_generations};
use telegencore::models::{Channel, Flow, Post, PostStatus, User as AppUser, SUPPORTED_TIMEZONES};
use telegencore::storage::channels::{get_channel, list_user_channels, set_channel_notifications, set_channel_timezone};
use telegencore::storage::flows::{create_flow, get_flow, get_flow_by_channel, update_flow};
use telegencore::storage::posts::{count_posts, delete_post, get_post};
use telegencore::{get_connection, AppError, AppResult};

use super::types::{ensure_user_exists, HandlerDeps, HandlerError, WizardDialogue};
use crate::telegram::callback::{FlowSetting, WizardAction};
use crate::telegram::dialogue::{
    confirmation_window, stage_window, FlowWizard, Input, Stage, State, WizardError, THEMES,
};
use crate::telegram::menu::{
    back_button, channel_menu, channel_settings_window, channels_window, flow_window, format_local, main_menu,
    show_window, Section, Window,
};
use crate::telegram::flow_settings::{
    apply_setting, frequency_window, length_window, prompt_window, settings_window, sources_window, FlowField,
};
use crate::telegram::posts::{edit_prompt_window, show_buffer_post};
use crate::telegram::publisher::publish_post;
use crate::telegram::subscriptions::{
    promo_prompt_window, show_payment_methods, show_subscription, show_tariff, start_payment,
};
use crate::telegram::{cb, Bot, CallbackData};

/// How a callback query is answered
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Ack,
    Toast(String),
    Alert(String),
}

impl Reply {
    fn alert(text: impl Into<String>) -> Self {
        Reply::Alert(text.into())
    }
}

const CHANNEL_NOT_FOUND: &str = "⚠️ Канал не знайдено";
const POST_NOT_FOUND: &str = "⚠️ Пост не знайдено";

/// Everything a callback route needs
struct Ctx<'a> {
    bot: &'a Bot,
    deps: &'a HandlerDeps,
    dialogue: &'a WizardDialogue,
    chat_id: ChatId,
    message_id: MessageId,
    user: AppUser,
}

pub async fn handle_callback(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
) -> Result<(), HandlerError> {
    let data = q.data.as_deref().unwrap_or_default();
    let reply = match (q.message.as_ref(), data.parse::<CallbackData>()) {
        (Some(message), Ok(callback)) => {
            log::debug!("Callback {} from {}", data, q.from.id.0);
            let ctx = Ctx {
                bot,
                deps,
                dialogue,
                chat_id: message.chat().id,
                message_id: message.id(),
                user: ensure_user_exists(deps, bot, &q.from)?,
            };
            match route(&ctx, callback).await {
                Ok(reply) => reply,
                Err(e) => {
                    log::error!("❌ Callback {} failed for {}: {}", data, q.from.id.0, e);
                    Reply::alert("❌ Сталася помилка, спробуйте ще раз")
                }
            }
        }
        (_, Err(e)) => {
            log::warn!("{}", e);
            Reply::Ack
        }
        (None, Ok(_)) => Reply::Ack,
    };

    let answer = bot.answer_callback_query(q.id.clone());
    match reply {
        Reply::Ack => answer.await?,
        Reply::Toast(text) => answer.text(text).await?,
        Reply::Alert(text) => answer.text(text).show_alert(true).await?,
    };
    Ok(())
}

async fn route(ctx: &Ctx<'_>, data: CallbackData) -> Result<Reply, HandlerError> {
    match data {
        CallbackData::MainMenu => {
            ctx.dialogue.exit().await?;
            show(ctx, main_menu(&ctx.user.display_name())).await
        }
        CallbackData::Generation => show_channels(ctx, Section::Generation).await,
        CallbackData::Buffer => show_channels(ctx, Section::Buffer).await,
        CallbackData::Settings => show_channels(ctx, Section::Settings).await,
        CallbackData::Subscription => {
            ctx.dialogue.exit().await?;
            show_subscription(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, ctx.user.telegram_id).await?;
            Ok(Reply::Ack)
        }
        CallbackData::Channel(channel_id) => {
            let window = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                match owned_channel(&conn, &ctx.user, channel_id)? {
                    Some(channel) => channel_menu_window(&conn, &channel)?,
                    None => return Ok(Reply::alert(CHANNEL_NOT_FOUND)),
                }
            };
            ctx.dialogue.exit().await?;
            show(ctx, window).await
        }
        CallbackData::CreateFlow(channel_id) => create_flow_start(ctx, channel_id).await,
        CallbackData::ShowFlow(channel_id) => {
            let window = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
                    return Ok(Reply::alert(CHANNEL_NOT_FOUND));
                };
                match get_flow_by_channel(&conn, channel.id)? {
                    Some(flow) => flow_window(&channel, &flow),
                    None => return Ok(no_flow(&channel)),
                }
            };
            show(ctx, window).await
        }
        CallbackData::GenerateNow(channel_id) => start_generation(ctx, channel_id, false).await,
        CallbackData::GeneratePartial(channel_id) => start_generation(ctx, channel_id, true).await,
        CallbackData::BufferChannel(channel_id) => {
            let flow = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
                    return Ok(Reply::alert(CHANNEL_NOT_FOUND));
                };
                match get_flow_by_channel(&conn, channel.id)? {
                    Some(flow) => flow,
                    None => return Ok(no_flow(&channel)),
                }
            };
            show_buffer_post(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, flow.id, 0).await?;
            Ok(Reply::Ack)
        }
        CallbackData::BufferPost { flow_id, index } => {
            let owned = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                owned_flow(&conn, &ctx.user, flow_id)?.is_some()
            };
            if !owned {
                return Ok(Reply::alert(CHANNEL_NOT_FOUND));
            }
            ctx.dialogue.exit().await?;
            show_buffer_post(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, flow_id, index).await?;
            Ok(Reply::Ack)
        }
        CallbackData::PublishPost { post_id, index } => {
            let Some((_, flow, _)) = owned_post(ctx, post_id)? else {
                return Ok(Reply::alert(POST_NOT_FOUND));
            };
            if let Err(e) = publish_post(ctx.bot, &ctx.deps.db_pool, post_id).await {
                log::warn!("Publishing post {} failed: {}", post_id, e);
                return Ok(Reply::Alert(format!("❌ Не вдалося опублікувати: {}", e)));
            }
            show_buffer_post(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, flow.id, index).await?;
            Ok(Reply::Toast("✅ Пост опубліковано".to_string()))
        }
        CallbackData::SchedulePost { post_id, index } => {
            let Some((post, flow, channel)) = owned_post(ctx, post_id)? else {
                return Ok(Reply::alert(POST_NOT_FOUND));
            };
            ctx.dialogue
                .update(State::AwaitingSchedule {
                    flow_id: flow.id,
                    post_id: post.id,
                    index,
                })
                .await?;
            show(ctx, schedule_prompt_window(&channel, flow.id, index)).await
        }
        CallbackData::DeletePost { post_id, index } => {
            let Some((_, flow, _)) = owned_post(ctx, post_id)? else {
                return Ok(Reply::alert(POST_NOT_FOUND));
            };
            {
                let conn = get_connection(&ctx.deps.db_pool)?;
                delete_post(&conn, post_id)?;
            }
            log::info!("🗑 Post {} deleted by {}", post_id, ctx.user.telegram_id);
            show_buffer_post(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, flow.id, index).await?;
            Ok(Reply::Toast("🗑 Пост видалено".to_string()))
        }
        CallbackData::EditPost { post_id, index } => {
            let Some((post, flow, _)) = owned_post(ctx, post_id)? else {
                return Ok(Reply::alert(POST_NOT_FOUND));
            };
            if post.status == PostStatus::Published {
                return Ok(Reply::alert("⚠️ Опублікований пост не можна редагувати"));
            }
            ctx.dialogue
                .update(State::AwaitingPostEdit {
                    flow_id: flow.id,
                    post_id: post.id,
                    index,
                })
                .await?;
            show(ctx, edit_prompt_window(flow.id, index)).await
        }
        CallbackData::FlowSettings { channel_id, setting } => flow_setting(ctx, channel_id, setting).await,
        CallbackData::ChannelSettings(channel_id) => {
            let window = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                match owned_channel(&conn, &ctx.user, channel_id)? {
                    Some(channel) => channel_settings_window(&channel),
                    None => return Ok(Reply::alert(CHANNEL_NOT_FOUND)),
                }
            };
            show(ctx, window).await
        }
        CallbackData::Timezone { channel_id, index } => {
            let Some(timezone) = SUPPORTED_TIMEZONES.get(index) else {
                return Ok(Reply::Ack);
            };
            let channel = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
                    return Ok(Reply::alert(CHANNEL_NOT_FOUND));
                };
                set_channel_timezone(&conn, channel.id, timezone)?;
                Channel {
                    timezone: timezone.to_string(),
                    ..channel
                }
            };
            show(ctx, channel_settings_window(&channel)).await?;
            Ok(Reply::Toast(format!("🌍 Часовий пояс: {}", timezone)))
        }
        CallbackData::ToggleNotifications(channel_id) => {
            let channel = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
                    return Ok(Reply::alert(CHANNEL_NOT_FOUND));
                };
                set_channel_notifications(&conn, channel.id, !channel.notifications)?;
                Channel {
                    notifications: !channel.notifications,
                    ..channel
                }
            };
            show(ctx, channel_settings_window(&channel)).await
        }
        CallbackData::Tariff(tariff_id) => {
            show_tariff(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, tariff_id).await?;
            Ok(Reply::Ack)
        }
        CallbackData::Period(period_id) => {
            show_payment_methods(ctx.bot, ctx.chat_id, Some(ctx.message_id), ctx.deps, period_id).await?;
            Ok(Reply::Ack)
        }
        CallbackData::Pay { period_id, method } => {
            let started = start_payment(
                ctx.bot,
                ctx.chat_id,
                Some(ctx.message_id),
                ctx.deps,
                ctx.user.telegram_id,
                period_id,
                method,
            )
            .await;
            match started {
                Ok(()) => Ok(Reply::Ack),
                Err(e) => {
                    log::error!("❌ Payment for period {} failed: {}", period_id, e);
                    Ok(Reply::alert("❌ Не вдалося створити платіж, спробуйте пізніше"))
                }
            }
        }
        CallbackData::PromoCode => {
            ctx.dialogue.update(State::AwaitingPromo).await?;
            show(ctx, promo_prompt_window()).await
        }
        CallbackData::Wizard(action) => wizard_action(ctx, action).await,
    }
}

async fn flow_setting(ctx: &Ctx<'_>, channel_id: i64, setting: FlowSetting) -> Result<Reply, HandlerError> {
    let conn = get_connection(&ctx.deps.db_pool)?;
    let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
        return Ok(Reply::alert(CHANNEL_NOT_FOUND));
    };
    let Some(mut flow) = get_flow_by_channel(&conn, channel.id)? else {
        return Ok(no_flow(&channel));
    };

    if let Some(field) = FlowField::of(setting) {
        if matches!(field, FlowField::Source(_)) && !can_add_source(&conn, ctx.user.id, flow.sources.len())? {
            return Ok(Reply::alert("❌ Ліміт джерел вашого тарифу вичерпано"));
        }
        drop(conn);
        ctx.dialogue.update(State::EditingFlow { channel_id, field }).await?;
        return show(ctx, prompt_window(channel.id, field)).await;
    }

    let window = match setting {
        FlowSetting::FrequencyMenu => frequency_window(&channel, &flow),
        FlowSetting::LengthMenu => length_window(&channel, &flow),
        FlowSetting::Sources => sources_window(&channel, &flow),
        _ => match apply_setting(&mut flow, setting) {
            Ok(true) => {
                update_flow(&conn, &flow)?;
                log::info!("⚙️ Flow {} updated by {}: {:?}", flow.id, ctx.user.telegram_id, setting);
                match setting {
                    FlowSetting::DeleteSource(_) => sources_window(&channel, &flow),
                    _ => settings_window(&channel, &flow),
                }
            }
            Ok(false) => settings_window(&channel, &flow),
            Err(e) => return Ok(Reply::Alert(e.to_string())),
        },
    };
    drop(conn);
    ctx.dialogue.exit().await?;
    show(ctx, window).await
}

async fn show(ctx: &Ctx<'_>, window: Window) -> Result<Reply, HandlerError> {
    show_window(ctx.bot, ctx.chat_id, Some(ctx.message_id), window).await?;
    Ok(Reply::Ack)
}

async fn show_channels(ctx: &Ctx<'_>, section: Section) -> Result<Reply, HandlerError> {
    let channels = {
        let conn = get_connection(&ctx.deps.db_pool)?;
        list_user_channels(&conn, ctx.user.id)?
    };
    ctx.dialogue.exit().await?;
    show(ctx, channels_window(&channels, section)).await
}

fn no_flow(channel: &Channel) -> Reply {
    Reply::Alert(format!("У каналу {} поки немає Флоу", channel.name))
}

/// Active channel owned by `user`
pub(super) fn owned_channel(conn: &Connection, user: &AppUser, channel_id: i64) -> AppResult<Option<Channel>> {
    Ok(get_channel(conn, channel_id)?.filter(|c| c.user_id == user.id && c.is_active))
}

fn owned_flow(conn: &Connection, user: &AppUser, flow_id: i64) -> AppResult<Option<(Flow, Channel)>> {
    let Some(flow) = get_flow(conn, flow_id)? else {
        return Ok(None);
    };
    Ok(owned_channel(conn, user, flow.channel_id)?.map(|channel| (flow, channel)))
}

fn owned_post(ctx: &Ctx<'_>, post_id: i64) -> AppResult<Option<(Post, Flow, Channel)>> {
    let conn = get_connection(&ctx.deps.db_pool)?;
    let Some(post) = get_post(&conn, post_id)? else {
        return Ok(None);
    };
    Ok(owned_flow(&conn, &ctx.user, post.flow_id)?.map(|(flow, channel)| (post, flow, channel)))
}

/// Channel menu with the flow and its draft count
pub(super) fn channel_menu_window(conn: &Connection, channel: &Channel) -> AppResult<Window> {
    let flow = get_flow_by_channel(conn, channel.id)?;
    let drafts = match &flow {
        Some(flow) => count_posts(conn, flow.id, PostStatus::Draft)?,
        None => 0,
    };
    Ok(channel_menu(channel, flow.as_ref(), drafts))
}

fn schedule_prompt_window(channel: &Channel, flow_id: i64, index: usize) -> Window {
    let example = format_local(Utc::now() + Duration::hours(1), channel.tz());
    Window::new(
        format!(
            "🗓 Надішліть дату та час публікації у форматі <code>ДД.ММ.РРРР ГГ:ХХ</code>\n\nЧасовий пояс каналу: {}\nНаприклад: <code>{}</code>",
            escape(&channel.timezone),
            example
        ),
        vec![vec![back_button(CallbackData::BufferPost { flow_id, index })]],
    )
}

async fn create_flow_start(ctx: &Ctx<'_>, channel_id: i64) -> Result<Reply, HandlerError> {
    let channel = {
        let conn = get_connection(&ctx.deps.db_pool)?;
        let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
            return Ok(Reply::alert(CHANNEL_NOT_FOUND));
        };
        if get_flow_by_channel(&conn, channel.id)?.is_some() {
            return Ok(Reply::Alert(format!("У каналу {} вже є Флоу", channel.name)));
        }
        if !can_add_channel(&conn, ctx.user.id)? {
            return Ok(Reply::alert("❌ Ліміт каналів вашого тарифу вичерпано"));
        }
        channel
    };

    let wizard = FlowWizard::new(channel.id, &channel.name);
    let window = stage_window(&wizard);
    ctx.dialogue.update(State::Wizard(wizard)).await?;
    log::info!("⚡ Flow wizard started for channel {} by {}", channel.id, ctx.user.telegram_id);
    show(ctx, window).await
}

async fn wizard_action(ctx: &Ctx<'_>, action: WizardAction) -> Result<Reply, HandlerError> {
    let State::Wizard(mut wizard) = ctx.dialogue.get_or_default().await? else {
        return Ok(Reply::alert("⚠️ Сесія застаріла, почніть створення флоу знову"));
    };

    let step: Result<(), WizardError> = match action {
        WizardAction::Theme(index) => match THEMES.get(index) {
            Some((_, theme)) => wizard.choose_theme(theme),
            None => Err(WizardError::UnexpectedInput),
        },
        WizardAction::CustomTheme => wizard.ask(Input::CustomTheme),
        WizardAction::Source(_) if wizard.stage != Stage::Sources => Err(WizardError::StaleStep),
        WizardAction::Source(source_type) => {
            let allowed = {
                let conn = get_connection(&ctx.deps.db_pool)?;
                can_add_source(&conn, ctx.user.id, wizard.draft.sources.len())?
            };
            if !allowed {
                return Ok(Reply::alert("❌ Ліміт джерел вашого тарифу вичерпано"));
            }
            wizard.ask(Input::SourceLink(source_type))
        }
        WizardAction::Next => wizard.next_from_sources(),
        WizardAction::Frequency(frequency) => wizard.choose_frequency(frequency),
        WizardAction::Length(length) => wizard.choose_length(length),
        WizardAction::TitleHighlight(on) => wizard.choose_title_highlight(on),
        WizardAction::Volume(volume) => wizard.choose_volume(volume),
        WizardAction::CustomVolume => wizard.ask(Input::CustomVolume),
        WizardAction::SkipSignature => wizard.set_signature(None),
        WizardAction::Back => {
            if !wizard.back() {
                return leave_wizard(ctx, wizard.channel_id, None).await;
            }
            Ok(())
        }
        WizardAction::Cancel => {
            return leave_wizard(ctx, wizard.channel_id, Some("❌ Створення флоу скасовано")).await;
        }
    };

    if let Err(e) = step {
        return Ok(Reply::Alert(e.to_string()));
    }
    advance_wizard(ctx.bot, ctx.deps, ctx.dialogue, ctx.chat_id, Some(ctx.message_id), wizard).await?;
    Ok(Reply::Ack)
}

async fn leave_wizard(ctx: &Ctx<'_>, channel_id: i64, toast: Option<&str>) -> Result<Reply, HandlerError> {
    ctx.dialogue.exit().await?;
    let window = {
        let conn = get_connection(&ctx.deps.db_pool)?;
        match owned_channel(&conn, &ctx.user, channel_id)? {
            Some(channel) => channel_menu_window(&conn, &channel)?,
            None => main_menu(&ctx.user.display_name()),
        }
    };
    show(ctx, window).await?;
    Ok(toast.map_or(Reply::Ack, |t| Reply::Toast(t.to_string())))
}

/// Saves the flow once the wizard is complete, otherwise stores the wizard
/// and shows its next window
pub(super) async fn advance_wizard(
    bot: &Bot,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    wizard: FlowWizard,
) -> Result<(), HandlerError> {
    if !wizard.is_complete() {
        let window = stage_window(&wizard);
        dialogue.update(State::Wizard(wizard)).await?;
        show_window(bot, chat_id, message_id, window).await?;
        return Ok(());
    }

    let channel_id = wizard.channel_id;
    let created = {
        let conn = get_connection(&deps.db_pool)?;
        create_flow(&conn, &wizard.into_new_flow())
    };
    dialogue.exit().await?;

    match created {
        Ok(flow) => {
            log::info!("✅ Flow {} ({}) created for channel {}", flow.id, flow.name, channel_id);
            show_window(bot, chat_id, message_id, confirmation_window(channel_id, &flow)).await?;
        }
        Err(AppError::InvalidOperation(reason)) => {
            log::warn!("Flow not created for channel {}: {}", channel_id, reason);
            bot.send_message(chat_id, "⚠️ У цього каналу вже є Флоу").await?;
        }
        Err(AppError::Validation(reason)) => {
            log::warn!("Flow draft for channel {} rejected: {}", channel_id, reason);
            bot.send_message(chat_id, "❌ Флоу не створено: потрібні тема і хоча б одне джерело")
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn start_generation(ctx: &Ctx<'_>, channel_id: i64, allow_partial: bool) -> Result<Reply, HandlerError> {
    let (channel, flow) = {
        let conn = get_connection(&ctx.deps.db_pool)?;
        let Some(channel) = owned_channel(&conn, &ctx.user, channel_id)? else {
            return Ok(Reply::alert(CHANNEL_NOT_FOUND));
        };
        match get_flow_by_channel(&conn, channel.id)? {
            Some(flow) => (channel, flow),
            None => return Ok(Reply::alert("⚠️ Не обрано флоу для генерації")),
        }
    };

    if !ctx.deps.generating.insert(ctx.chat_id) {
        return Ok(Reply::alert("⚠️ Генерація вже запущена, зачекайте..."));
    }

    let status = ctx
        .bot
        .send_message(
            ctx.chat_id,
            format!("⚡ Генерація для флоу <b>{}</b>...", escape(&flow.name)),
        )
        .parse_mode(ParseMode::Html)
        .await;
    let status = match status {
        Ok(message) => message.id,
        Err(e) => {
            ctx.deps.generating.remove(&ctx.chat_id);
            return Err(e.into());
        }
    };

    let bot = ctx.bot.clone();
    let deps = ctx.deps.clone();
    let chat_id = ctx.chat_id;
    let user_id = ctx.user.id;
    tokio::spawn(async move {
        let result = deps.generator.generate_for_flow(flow.id, allow_partial).await;
        deps.generating.remove(&chat_id);
        if let Err(e) = report_generation(&bot, &deps, chat_id, status, &channel, &flow, user_id, result).await {
            log::error!("Failed to report generation for flow {}: {}", flow.id, e);
        }
    });

    Ok(Reply::Toast("🔄 Запускаю генерацію...".to_string()))
}

/// Replaces the status message with the generation outcome
async fn report_generation(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    status: MessageId,
    channel: &Channel,
    flow: &Flow,
    user_id: i64,
    result: AppResult<Vec<Post>>,
) -> AppResult<()> {
    let window = match result {
        Ok(posts) if posts.is_empty() => Window::new(
            "ℹ️ Не знайдено згенерованих постів",
            vec![vec![back_button(CallbackData::Channel(channel.id))]],
        ),
        Ok(_) => {
            if let Err(e) = bot.delete_message(chat_id, status).await {
                log::debug!("Cannot delete status message: {}", e);
            }
            let window = Window::new(
                format!("✅ Генерація для флоу <b>{}</b> завершена успішно!", escape(&flow.name)),
                vec![vec![cb(
                    "Переглянути згенеровані пости",
                    CallbackData::BufferPost {
                        flow_id: flow.id,
                        index: 0,
                    },
                )]],
            );
            show_window(bot, chat_id, None, window).await?;
            return Ok(());
        }
        Err(AppError::GenerationLimitExceeded(message)) => {
            let remaining = {
                let conn = get_connection(&deps.db_pool)?;
                remaining_generations(&conn, user_id)?.unwrap_or(0)
            };
            let mut rows = Vec::new();
            let mut text = message;
            if remaining > 0 {
                text.push_str(&format!("\n\nДоступно генерацій: {}", remaining));
                rows.push(vec![cb("Згенерувати доступні", CallbackData::GeneratePartial(channel.id))]);
            }
            rows.push(vec![back_button(CallbackData::Channel(channel.id))]);
            Window::new(text, rows)
        }
        Err(e) => Window::new(
            format!("❌ Помилка генерації: {}", escape(&e.to_string())),
            vec![vec![back_button(CallbackData::Channel(channel.id))]],
        ),
    };
    show_window(bot, chat_id, Some(status), window).await?;
    Ok(())
}
