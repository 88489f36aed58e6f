//! Router-facing views of Telegram updates.

use teloxide::types::{CallbackQuery, ChatId, Message, MessageId};

/// A message update as seen by the router and the menus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Id of the message inside its chat
    pub message_id: MessageId,
    /// Telegram id of the sender
    pub sender_id: i64,
    /// Chat the message was posted in
    pub chat_id: i64,
    /// Message text, if it is a text message
    pub text: Option<String>,
    /// Chat title, for groups and channels
    pub chat_title: Option<String>,
}

impl MessageEvent {
    /// Build an event from a Telegram message.
    ///
    /// Returns `None` for messages without a sender (channel posts).
    #[must_use]
    pub fn from_message(msg: &Message) -> Option<Self> {
        let sender = msg.from.as_ref()?;
        Some(Self {
            message_id: msg.id,
            sender_id: sender.id.0.cast_signed(),
            chat_id: msg.chat.id.0,
            text: msg.text().map(str::to_string),
            chat_title: msg.chat.title().map(str::to_string),
        })
    }

    /// Whether the message was sent in a private chat with the bot.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.sender_id == self.chat_id
    }

    /// Chat id in teloxide form.
    #[must_use]
    pub const fn chat(&self) -> ChatId {
        ChatId(self.chat_id)
    }
}

/// A callback query update.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    query: CallbackQuery,
}

impl CallbackEvent {
    /// Wrap a callback query.
    #[must_use]
    pub const fn new(query: CallbackQuery) -> Self {
        Self { query }
    }

    /// Telegram id of the user who pressed the button.
    #[must_use]
    pub fn sender_id(&self) -> i64 {
        self.query.from.id.0.cast_signed()
    }

    /// Chat of the message carrying the button, if still accessible.
    #[must_use]
    pub fn chat_id(&self) -> Option<ChatId> {
        self.query.message.as_ref().map(|msg| msg.chat().id)
    }

    /// Chat to reply into: the button's chat, or the sender's private chat.
    #[must_use]
    pub fn reply_chat(&self) -> ChatId {
        self.chat_id().unwrap_or(ChatId(self.sender_id()))
    }

    /// Raw callback data.
    #[must_use]
    pub fn data(&self) -> Option<&str> {
        self.query.data.as_deref()
    }

    /// The underlying query, for answering it.
    #[must_use]
    pub const fn query(&self) -> &CallbackQuery {
        &self.query
    }
}

impl From<CallbackQuery> for CallbackEvent {
    fn from(query: CallbackQuery) -> Self {
        Self::new(query)
    }
}
