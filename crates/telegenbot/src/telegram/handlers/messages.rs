//! Free-text messages: wizard answers, schedule dates, post edits, flow
//! settings and promo codes

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::render::RenderMessageTextHelper;

use telegencore::billing::limits::can_add_source;
use telegencore::billing::{redeem_promo_code, PromoOutcome};
use telegencore::models::User as AppUser;
use telegencore::scheduling::{parse_schedule_input, post_timezone, schedule_post, ScheduleAt};
use telegencore::storage::flows::{get_flow_by_channel, update_flow};
use telegencore::storage::posts::update_content;
use telegencore::{get_connection, AppError};

use super::callbacks::{advance_wizard, owned_channel};
use super::types::{ensure_user_exists, HandlerDeps, HandlerError, WizardDialogue};
use crate::telegram::dialogue::{stage_window, FlowWizard, Input, State};
use crate::telegram::flow_settings::{apply_text, settings_window, sources_window, FlowField};
use crate::telegram::menu::{format_local, show_window};
use crate::telegram::posts::show_buffer_post;
use crate::telegram::subscriptions::show_subscription;
use crate::telegram::Bot;

pub async fn handle_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
) -> Result<(), HandlerError> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };

    match dialogue.get_or_default().await? {
        State::Wizard(wizard) => {
            let user = ensure_user_exists(deps, bot, from)?;
            wizard_text(bot, msg, deps, dialogue, user.id, wizard, text).await
        }
        State::AwaitingSchedule { flow_id, post_id, index } => {
            schedule_text(bot, msg, deps, dialogue, flow_id, post_id, index, text).await
        }
        State::AwaitingPostEdit { flow_id, post_id, index } => {
            post_edit_text(bot, msg, deps, dialogue, flow_id, post_id, index).await
        }
        State::EditingFlow { channel_id, field } => {
            let user = ensure_user_exists(deps, bot, from)?;
            flow_edit_text(bot, msg, deps, dialogue, &user, channel_id, field, text).await
        }
        State::AwaitingPromo => {
            let user = ensure_user_exists(deps, bot, from)?;
            promo_text(bot, msg, deps, dialogue, &user, text).await
        }
        State::Idle => {
            bot.send_message(msg.chat.id, "Скористайтеся меню: /start").await?;
            Ok(())
        }
    }
}

async fn wizard_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
    user_id: i64,
    mut wizard: FlowWizard,
    text: &str,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    match wizard.awaiting {
        None => {
            bot.send_message(chat_id, "⚠️ Оберіть варіант кнопкою").await?;
            show_window(bot, chat_id, None, stage_window(&wizard)).await?;
            return Ok(());
        }
        Some(Input::SourceLink(_)) => {
            let allowed = {
                let conn = get_connection(&deps.db_pool)?;
                can_add_source(&conn, user_id, wizard.draft.sources.len())?
            };
            if !allowed {
                wizard.back();
                bot.send_message(chat_id, "❌ Ліміт джерел вашого тарифу вичерпано").await?;
                return advance_wizard(bot, deps, dialogue, chat_id, None, wizard).await;
            }
        }
        Some(_) => {}
    }

    match wizard.accept_text(text) {
        Ok(input) => {
            log::debug!("Wizard for channel {} accepted {:?}", wizard.channel_id, input);
            advance_wizard(bot, deps, dialogue, chat_id, None, wizard).await
        }
        Err(e) => {
            bot.send_message(chat_id, e.to_string()).await?;
            Ok(())
        }
    }
}

async fn schedule_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
    flow_id: i64,
    post_id: i64,
    index: usize,
    text: &str,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let Ok(naive) = parse_schedule_input(text) else {
        bot.send_message(
            chat_id,
            "❌ Невірний формат. Використовуйте ДД.ММ.РРРР ГГ:ХХ, наприклад 25.12.2025 18:30",
        )
        .await?;
        return Ok(());
    };

    let scheduled = {
        let conn = get_connection(&deps.db_pool)?;
        schedule_post(&conn, post_id, ScheduleAt::Local(naive), Utc::now())
            .and_then(|at| Ok((at, post_timezone(&conn, post_id)?)))
    };

    match scheduled {
        Ok((at, tz)) => {
            dialogue.exit().await?;
            bot.send_message(
                chat_id,
                format!("✅ Пост заплановано на <b>{}</b> ({})", format_local(at, tz), tz),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            show_buffer_post(bot, chat_id, None, deps, flow_id, index).await?;
        }
        Err(AppError::InvalidOperation(reason)) => {
            log::debug!("Schedule refused for post {}: {}", post_id, reason);
            bot.send_message(chat_id, "❌ Час публікації має бути в майбутньому").await?;
        }
        Err(AppError::Validation(reason)) => {
            log::debug!("Schedule refused for post {}: {}", post_id, reason);
            bot.send_message(chat_id, "❌ Такого часу не існує у часовому поясі каналу").await?;
        }
        Err(AppError::NotFound(_)) => {
            dialogue.exit().await?;
            bot.send_message(chat_id, "⚠️ Пост не знайдено").await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Replaces a buffer post's text; the message's formatting is kept as HTML
async fn post_edit_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
    flow_id: i64,
    post_id: i64,
    index: usize,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let html = msg.html_text().unwrap_or_default();
    let updated = {
        let conn = get_connection(&deps.db_pool)?;
        update_content(&conn, post_id, &html)
    };

    match updated {
        Ok(post) => {
            log::info!("✏️ Post {} edited in chat {}", post.id, chat_id);
            dialogue.exit().await?;
            bot.send_message(chat_id, "✅ Текст поста оновлено").await?;
            show_buffer_post(bot, chat_id, None, deps, flow_id, index).await?;
        }
        Err(AppError::Validation(_)) => {
            bot.send_message(chat_id, "❌ Текст не може бути порожнім").await?;
        }
        Err(AppError::InvalidOperation(_)) => {
            dialogue.exit().await?;
            bot.send_message(chat_id, "⚠️ Пост уже опубліковано").await?;
        }
        Err(AppError::NotFound(_)) => {
            dialogue.exit().await?;
            bot.send_message(chat_id, "⚠️ Пост не знайдено").await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn flow_edit_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
    user: &AppUser,
    channel_id: i64,
    field: FlowField,
    text: &str,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let conn = get_connection(&deps.db_pool)?;
    let channel = owned_channel(&conn, user, channel_id)?;
    let flow = match &channel {
        Some(channel) => get_flow_by_channel(&conn, channel.id)?,
        None => None,
    };
    let (Some(channel), Some(mut flow)) = (channel, flow) else {
        drop(conn);
        dialogue.exit().await?;
        bot.send_message(chat_id, "⚠️ Флоу не знайдено").await?;
        return Ok(());
    };

    let window = if matches!(field, FlowField::Source(_)) && !can_add_source(&conn, user.id, flow.sources.len())? {
        Err("❌ Ліміт джерел вашого тарифу вичерпано".to_string())
    } else {
        match apply_text(&mut flow, field, text) {
            Ok(()) => {
                update_flow(&conn, &flow)?;
                log::info!("⚙️ Flow {} updated by {}: {:?}", flow.id, user.telegram_id, field);
                Ok(match field {
                    FlowField::Source(_) => sources_window(&channel, &flow),
                    _ => settings_window(&channel, &flow),
                })
            }
            Err(e) => Err(e.to_string()),
        }
    };
    drop(conn);

    match window {
        Ok(window) => {
            dialogue.exit().await?;
            bot.send_message(chat_id, "✅ Збережено").await?;
            show_window(bot, chat_id, None, window).await?;
        }
        Err(reason) => {
            bot.send_message(chat_id, reason).await?;
        }
    }
    Ok(())
}

/// Redeems a promo code; an invalid code can be retyped
async fn promo_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
    user: &AppUser,
    text: &str,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let outcome = {
        let conn = get_connection(&deps.db_pool)?;
        redeem_promo_code(&conn, user.id, text)?
    };

    bot.send_message(chat_id, outcome.message())
        .parse_mode(ParseMode::Html)
        .await?;
    if outcome != PromoOutcome::Invalid {
        dialogue.exit().await?;
        show_subscription(bot, chat_id, None, deps, user.telegram_id).await?;
    }
    Ok(())
}
