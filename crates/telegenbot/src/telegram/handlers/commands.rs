use teloxide::prelude::*;
use teloxide::types::ParseMode;

use super::types::{ensure_user_exists, HandlerDeps, HandlerError, WizardDialogue};
use crate::telegram::bot::Command;
use crate::telegram::dialogue::State;
use crate::telegram::menu::{help_text, main_menu, show_window};
use crate::telegram::subscriptions::show_subscription;
use crate::telegram::Bot;

pub async fn handle_command(
    bot: &Bot,
    msg: &Message,
    cmd: Command,
    deps: &HandlerDeps,
    dialogue: &WizardDialogue,
) -> Result<(), HandlerError> {
    log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    match cmd {
        Command::Start => {
            let user = ensure_user_exists(deps, bot, from)?;
            dialogue.exit().await?;
            show_window(bot, msg.chat.id, None, main_menu(&user.display_name())).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, help_text())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Subscription => {
            let user = ensure_user_exists(deps, bot, from)?;
            show_subscription(bot, msg.chat.id, None, deps, user.telegram_id).await?;
        }
        Command::Cancel => {
            let user = ensure_user_exists(deps, bot, from)?;
            if dialogue.get_or_default().await? != State::Idle {
                bot.send_message(msg.chat.id, "❌ Дію скасовано").await?;
            }
            dialogue.exit().await?;
            show_window(bot, msg.chat.id, None, main_menu(&user.display_name())).await?;
        }
    }
    Ok(())
}
