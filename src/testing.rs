//! Testing helpers and mock utilities.
//!
//! Fixture builders for Telegram updates and permissive mocks for the
//! router's collaborators.

use crate::bot::admission::MockTokenSource;
use crate::bot::events::MessageEvent;
use crate::bot::messenger::MockMessenger;
use crate::config::{Settings, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_PER_SECOND};
use serde_json::{json, Value};
use teloxide::types::{CallbackQuery, MessageId};

/// Bot id reported by [`mock_messenger_quiet`].
pub const MOCK_BOT_ID: i64 = 999;

/// A token source that grants every request immediately.
#[must_use]
pub fn mock_token_source_unlimited() -> MockTokenSource {
    let mut mock = MockTokenSource::new();
    mock.expect_acquire_token().returning(|| Ok(()));
    mock
}

/// A messenger that accepts every send and reports [`MOCK_BOT_ID`].
#[must_use]
pub fn mock_messenger_quiet() -> MockMessenger {
    let mut mock = MockMessenger::new();
    mock.expect_send_text().returning(|_, _| Ok(()));
    mock.expect_own_id().returning(|| Ok(MOCK_BOT_ID));
    mock
}

/// Settings with a token and no storage credentials.
#[must_use]
pub fn settings_without_storage() -> Settings {
    Settings {
        telegram_token: "dummy".to_string(),
        admin_ids_str: None,
        group_mode_active: false,
        active_chat_id: None,
        rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
        rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
        r2_access_key_id: None,
        r2_secret_access_key: None,
        r2_endpoint_url: None,
        r2_bucket_name: None,
    }
}

/// A router-level message event built without going through Telegram types.
#[must_use]
pub fn message_event(
    sender: i64,
    chat: i64,
    text: Option<&str>,
    title: Option<&str>,
) -> MessageEvent {
    MessageEvent {
        message_id: MessageId(1),
        sender_id: sender,
        chat_id: chat,
        text: text.map(str::to_string),
        chat_title: title.map(str::to_string),
    }
}

fn user_json(id: i64) -> Value {
    json!({ "id": id, "is_bot": false, "first_name": "A" })
}

/// A callback query from `sender` without an attached message.
///
/// # Panics
///
/// Panics if teloxide rejects the fixture.
#[must_use]
pub fn callback_query(sender: i64, data: Option<&str>) -> CallbackQuery {
    let mut query = json!({
        "id": "1",
        "from": user_json(sender),
        "chat_instance": "1",
    });
    if let Some(data) = data {
        query["data"] = Value::from(data);
    }
    match serde_json::from_value(query) {
        Ok(query) => query,
        Err(e) => panic!("invalid callback query fixture: {e}"),
    }
}

/// Raw JSON of a text message "hello" posted in a group.
///
/// Without a title the chat is a basic group, otherwise a supergroup.
#[must_use]
pub fn group_message_json(sender: i64, chat: i64, title: Option<&str>) -> Value {
    let chat = match title {
        Some(title) => json!({ "id": chat, "type": "supergroup", "title": title }),
        None => json!({ "id": chat, "type": "group" }),
    };
    json!({
        "message_id": 1,
        "date": 1_700_000_000,
        "chat": chat,
        "from": user_json(sender),
        "text": "hello",
    })
}

/// Raw JSON of a private text message from user `id`.
#[must_use]
pub fn private_message_json(id: i64, text: &str) -> Value {
    json!({
        "message_id": 1,
        "date": 1_700_000_000,
        "chat": { "id": id, "type": "private", "first_name": "A" },
        "from": user_json(id),
        "text": text,
    })
}
