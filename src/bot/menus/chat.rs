use super::views;
use super::MenuHandler;
use crate::bot::events::{CallbackEvent, MessageEvent};
use crate::config::RuntimeConfig;
use crate::storage::GroupStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::debug;

/// Menu for the active group chat.
pub struct ChatMenu {
    bot: Bot,
    storage: Arc<dyn GroupStorage>,
    config: Arc<RuntimeConfig>,
}

impl ChatMenu {
    /// Create the chat menu.
    #[must_use]
    pub fn new(bot: Bot, storage: Arc<dyn GroupStorage>, config: Arc<RuntimeConfig>) -> Self {
        Self {
            bot,
            storage,
            config,
        }
    }
}

#[async_trait]
impl MenuHandler for ChatMenu {
    async fn main_menu(&self, event: &MessageEvent) -> Result<()> {
        // Ordinary group chatter is routed here too; only commands get a reply.
        if !event.text.as_deref().is_some_and(views::is_menu_command) {
            return Ok(());
        }

        // Keep the stored title fresh for the admin group list.
        if let Some(title) = event.chat_title.as_deref() {
            self.storage.add_group(event.chat_id, title).await?;
        }

        self.bot
            .send_message(event.chat(), views::chat_info(event.chat_id, self.config.my_id()))
            .parse_mode(ParseMode::Html)
            .reply_markup(views::chat_keyboard())
            .await?;
        Ok(())
    }

    async fn callback_menu(&self, event: &CallbackEvent, path: &str) -> Result<()> {
        let _ = self
            .bot
            .answer_callback_query(event.query().id.clone())
            .await;

        if path != views::CHAT_INFO {
            debug!(path = %path, "Unknown chat callback");
            return Ok(());
        }

        let chat_id = event.reply_chat();
        self.bot
            .send_message(chat_id, views::chat_info(chat_id.0, self.config.my_id()))
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}
