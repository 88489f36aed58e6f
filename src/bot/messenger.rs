//! Outbound Telegram operations used outside the menus.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;

/// Minimal platform client: plain text sends and identity lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain text message to a chat or user.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Resolve the bot's own user id.
    async fn own_id(&self) -> Result<i64>;
}

/// [`Messenger`] backed by a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    /// Wrap a bot handle.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))?;
        Ok(())
    }

    async fn own_id(&self) -> Result<i64> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| anyhow::anyhow!("Telegram getMe error: {e}"))?;
        Ok(me.id.0.cast_signed())
    }
}
