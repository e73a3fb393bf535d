//! Dispatcher schema and handler chain builders

use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChatMemberUpdated, Message};

use super::callbacks::handle_callback;
use super::channels::handle_my_chat_member;
use super::commands::handle_command;
use super::messages::handle_text;
use super::types::{HandlerDeps, HandlerError, WizardDialogue};
use crate::telegram::bot::Command;
use crate::telegram::dialogue::State;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Channel membership updates are handled first; everything else runs inside
/// the per-chat dialogue so the wizard and the schedule prompt can see their
/// state. The dispatcher must provide `InMemStorage<State>`.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry().branch(my_chat_member_handler(deps.clone())).branch(
        dptree::entry()
            .enter_dialogue::<Update, InMemStorage<State>, State>()
            .branch(command_handler(deps.clone()))
            .branch(callback_handler(deps.clone()))
            .branch(text_handler(deps)),
    )
}

/// Bot added to or removed from a channel
fn my_chat_member_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_my_chat_member().endpoint(move |bot: Bot, upd: ChatMemberUpdated| {
        let deps = deps.clone();
        async move { handle_my_chat_member(&bot, &upd, &deps).await }
    })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command, dialogue: WizardDialogue| {
            let deps = deps.clone();
            async move { handle_command(&bot, &msg, cmd, &deps, &dialogue).await }
        },
    ))
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery, dialogue: WizardDialogue| {
        let deps = deps.clone();
        async move { handle_callback(&bot, &q, &deps, &dialogue).await }
    })
}

/// Free text: wizard answers, schedule dates, or a hint
fn text_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private() && msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message, dialogue: WizardDialogue| {
            let deps = deps.clone();
            async move { handle_text(&bot, &msg, &deps, &dialogue).await }
        })
}
