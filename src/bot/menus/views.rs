//! Menu UI components
//!
//! Callback payloads, keyboards and message texts shared by the menus.

use crate::storage::GroupRecord;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback payloads
// ─────────────────────────────────────────────────────────────────────────────

/// List registered groups
pub const ADMIN_GROUPS: &str = "admin|groups";
/// Flip group mode on or off
pub const ADMIN_TOGGLE_ACTIVE: &str = "admin|toggle_active";
/// Prefix of the "make this the active chat" buttons
pub const ADMIN_SELECT_PREFIX: &str = "admin|select:";
/// Show the caller's profile
pub const USER_PROFILE: &str = "user|profile";
/// Show chat details
pub const CHAT_INFO: &str = "chat|info";

/// Admin callback paths, as received after the `admin|` prefix is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    /// Show registered groups
    Groups,
    /// Flip group mode
    ToggleActive,
    /// Make a group the active chat
    Select(i64),
}

impl AdminAction {
    /// Parse a stripped admin path such as `groups` or `select:-100123`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        match path {
            "groups" => Some(Self::Groups),
            "toggle_active" => Some(Self::ToggleActive),
            _ => path
                .strip_prefix("select:")
                .and_then(|id| id.parse().ok())
                .map(Self::Select),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Admin main menu keyboard
#[must_use]
pub fn admin_keyboard(active: bool) -> InlineKeyboardMarkup {
    let toggle = if active {
        "Disable group mode"
    } else {
        "Enable group mode"
    };
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("Groups", ADMIN_GROUPS)],
        vec![InlineKeyboardButton::callback(toggle, ADMIN_TOGGLE_ACTIVE)],
    ])
}

/// One button per registered group
#[must_use]
pub fn groups_keyboard(groups: &[GroupRecord]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(groups.iter().map(|group| {
        vec![InlineKeyboardButton::callback(
            group.title.clone(),
            format!("{ADMIN_SELECT_PREFIX}{}", group.chat_id),
        )]
    }))
}

/// User main menu keyboard
#[must_use]
pub fn user_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Profile",
        USER_PROFILE,
    )]])
}

/// Group chat menu keyboard
#[must_use]
pub fn chat_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Chat info",
        CHAT_INFO,
    )]])
}

// ─────────────────────────────────────────────────────────────────────────────
// Texts
// ─────────────────────────────────────────────────────────────────────────────

fn optional_id(id: Option<i64>) -> String {
    id.map_or_else(|| "not set".to_string(), |id| id.to_string())
}

/// Admin status block (HTML)
#[must_use]
pub fn admin_status(active: bool, active_chat: Option<i64>, my_id: Option<i64>) -> String {
    format!(
        "🛠 <b>Admin menu</b>\n\nGroup mode: <b>{}</b>\nActive chat: <code>{}</code>\nBot id: <code>{}</code>",
        if active { "on" } else { "off" },
        optional_id(active_chat),
        optional_id(my_id),
    )
}

/// Registered groups listing (HTML)
#[must_use]
pub fn groups_list(groups: &[GroupRecord], active_chat: Option<i64>) -> String {
    if groups.is_empty() {
        return "No groups registered yet.".to_string();
    }
    let mut text = String::from("<b>Registered groups</b>\n");
    for group in groups {
        let marker = if Some(group.chat_id) == active_chat {
            "✅"
        } else {
            "•"
        };
        text.push_str(&format!(
            "\n{marker} {} <code>{}</code>",
            html_escape::encode_text(&group.title),
            group.chat_id
        ));
    }
    text
}

/// Greeting for regular users
#[must_use]
pub const fn user_greeting() -> &'static str {
    "👋 Hi! Use the buttons below."
}

/// Profile details for a user (HTML)
#[must_use]
pub fn user_profile(user_id: i64, known_groups: usize) -> String {
    format!("👤 Your id: <code>{user_id}</code>\nGroups served by this bot: {known_groups}")
}

/// Chat details (HTML)
#[must_use]
pub fn chat_info(chat_id: i64, my_id: Option<i64>) -> String {
    format!(
        "💬 Chat id: <code>{chat_id}</code>\nBot id: <code>{}</code>",
        optional_id(my_id)
    )
}

/// Whether `text` asks for the chat menu (`/menu`, `/start`, optionally `@bot`).
#[must_use]
pub fn is_menu_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    matches!(command, "/menu" | "/start")
}
