//! Role-specific menus behind the router.

/// Administrator menu
pub mod admin;
/// Group chat menu
pub mod chat;
/// Regular user menu
pub mod user;
/// Keyboards, payloads and texts
pub mod views;

use crate::bot::events::{CallbackEvent, MessageEvent};
use crate::config::RuntimeConfig;
use crate::storage::GroupStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::Bot;

pub use admin::AdminMenu;
pub use chat::ChatMenu;
pub use user::UserMenu;

/// A menu the router can dispatch to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MenuHandler: Send + Sync {
    /// Render the menu in reply to a message.
    async fn main_menu(&self, event: &MessageEvent) -> Result<()>;

    /// Handle a button press. `path` is the callback data routed to this menu.
    async fn callback_menu(&self, event: &CallbackEvent, path: &str) -> Result<()>;
}

/// The three menus owned by the router.
#[derive(Clone)]
pub struct Menus {
    /// Administrator menu
    pub admin: Arc<dyn MenuHandler>,
    /// Regular user menu
    pub user: Arc<dyn MenuHandler>,
    /// Group chat menu
    pub chat: Arc<dyn MenuHandler>,
}

impl Menus {
    /// Build the Telegram menus. All three share the same bot and storage.
    #[must_use]
    pub fn telegram(
        bot: Bot,
        storage: Arc<dyn GroupStorage>,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            admin: Arc::new(AdminMenu::new(
                bot.clone(),
                Arc::clone(&storage),
                Arc::clone(&config),
            )),
            user: Arc::new(UserMenu::new(bot.clone(), Arc::clone(&storage))),
            chat: Arc::new(ChatMenu::new(bot, storage, config)),
        }
    }
}
