use super::views;
use super::MenuHandler;
use crate::bot::events::{CallbackEvent, MessageEvent};
use crate::storage::GroupStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

/// Menu for everyone else writing to the bot in private.
pub struct UserMenu {
    bot: Bot,
    storage: Arc<dyn GroupStorage>,
}

impl UserMenu {
    /// Create the user menu.
    #[must_use]
    pub fn new(bot: Bot, storage: Arc<dyn GroupStorage>) -> Self {
        Self { bot, storage }
    }
}

#[async_trait]
impl MenuHandler for UserMenu {
    async fn main_menu(&self, event: &MessageEvent) -> Result<()> {
        self.bot
            .send_message(event.chat(), views::user_greeting())
            .reply_markup(views::user_keyboard())
            .await?;
        Ok(())
    }

    async fn callback_menu(&self, event: &CallbackEvent, path: &str) -> Result<()> {
        let _ = self
            .bot
            .answer_callback_query(event.query().id.clone())
            .await;

        if path == views::USER_PROFILE {
            let groups = self.storage.list_groups().await?.len();
            self.bot
                .send_message(
                    event.reply_chat(),
                    views::user_profile(event.sender_id(), groups),
                )
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }
}
