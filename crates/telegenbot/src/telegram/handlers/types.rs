//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::prelude::*;
use teloxide::types::MessageId;

use telegencore::billing::{ensure_user, PaymentGateway};
use telegencore::generation::Generator;
use telegencore::models::User as AppUser;
use telegencore::storage::users::NewUser;
use telegencore::{get_connection, AppResult, DbPool};

use crate::telegram::dialogue::State;
use crate::telegram::notifications::notify_admins_new_user;
use crate::telegram::Bot;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dialogue handle injected by `enter_dialogue`
pub type WizardDialogue = Dialogue<State, InMemStorage<State>>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub generator: Generator,
    pub gateway: Arc<PaymentGateway>,
    /// Chats with a manual generation in progress
    pub generating: Arc<DashSet<ChatId>>,
    /// Album messages of the buffer post currently on screen, per chat
    pub albums: Arc<DashMap<ChatId, Vec<MessageId>>>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, generator: Generator, gateway: Arc<PaymentGateway>) -> Self {
        Self {
            db_pool,
            generator,
            gateway,
            generating: Arc::new(DashSet::new()),
            albums: Arc::new(DashMap::new()),
        }
    }
}

/// Returns the stored user for a Telegram account, creating it (with the
/// trial subscription) on first contact. Admins hear about new users.
pub fn ensure_user_exists(deps: &HandlerDeps, bot: &Bot, from: &teloxide::types::User) -> AppResult<AppUser> {
    let telegram_id = i64::try_from(from.id.0).unwrap_or(i64::MAX);
    let conn = get_connection(&deps.db_pool)?;
    let (user, created) = ensure_user(
        &conn,
        &NewUser {
            telegram_id,
            username: from.username.as_deref(),
            first_name: Some(from.first_name.as_str()),
            last_name: from.last_name.as_deref(),
        },
    )?;

    if created {
        let bot = bot.clone();
        let username = from.username.clone();
        let first_name = from.first_name.clone();
        tokio::spawn(async move {
            notify_admins_new_user(&bot, telegram_id, username.as_deref(), Some(&first_name)).await;
        });
    }
    Ok(user)
}
