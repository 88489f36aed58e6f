use super::views::{self, AdminAction};
use super::MenuHandler;
use crate::bot::events::{CallbackEvent, MessageEvent};
use crate::config::RuntimeConfig;
use crate::storage::GroupStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{debug, info};

/// Menu for configured administrators: group mode and active chat control.
pub struct AdminMenu {
    bot: Bot,
    storage: Arc<dyn GroupStorage>,
    config: Arc<RuntimeConfig>,
}

impl AdminMenu {
    /// Create the admin menu.
    #[must_use]
    pub fn new(bot: Bot, storage: Arc<dyn GroupStorage>, config: Arc<RuntimeConfig>) -> Self {
        Self {
            bot,
            storage,
            config,
        }
    }

    async fn send_status(&self, chat_id: ChatId) -> Result<()> {
        let active = self.config.is_active();
        let text = views::admin_status(
            active,
            self.config.active_chat().await,
            self.config.my_id(),
        );
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(views::admin_keyboard(active))
            .await?;
        Ok(())
    }

    async fn send_groups(&self, chat_id: ChatId) -> Result<()> {
        let groups = self.storage.list_groups().await?;
        let text = views::groups_list(&groups, self.config.active_chat().await);
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(views::groups_keyboard(&groups))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MenuHandler for AdminMenu {
    async fn main_menu(&self, event: &MessageEvent) -> Result<()> {
        self.send_status(event.chat()).await
    }

    async fn callback_menu(&self, event: &CallbackEvent, path: &str) -> Result<()> {
        let _ = self
            .bot
            .answer_callback_query(event.query().id.clone())
            .await;
        let chat_id = event.reply_chat();

        match AdminAction::parse(path) {
            Some(AdminAction::Groups) => self.send_groups(chat_id).await,
            Some(AdminAction::ToggleActive) => {
                let active = !self.config.is_active();
                self.config.set_active(active);
                info!(admin = event.sender_id(), active, "Group mode toggled");
                self.send_status(chat_id).await
            }
            Some(AdminAction::Select(group_id)) => {
                self.config.set_active_chat(Some(group_id)).await;
                info!(admin = event.sender_id(), group_id, "Active chat changed");
                self.send_status(chat_id).await
            }
            None => {
                debug!(path = %path, "Unknown admin callback");
                Ok(())
            }
        }
    }
}
