//! Configuration and settings management
//!
//! Loads settings from files and environment variables and holds the
//! process-wide runtime configuration shared by the router and the menus.

use crate::bot::admission::TokenSource;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;

/// Delay after startup during which every inbound update is dropped.
pub const STARTUP_GRACE_PERIOD: Duration = Duration::from_millis(3000);

/// Default sustained rate for menu dispatches (Telegram allows ~30 msg/s).
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 25;
/// Default burst size for menu dispatches.
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 5;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of administrator Telegram IDs
    #[serde(rename = "admin_ids")]
    pub admin_ids_str: Option<String>,

    /// Whether group mode is enabled at startup
    #[serde(default)]
    pub group_mode_active: bool,
    /// Group chat allowed to use the chat menu
    pub active_chat_id: Option<i64>,

    /// Sustained menu dispatches per second
    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: u32,
    /// Maximum burst of menu dispatches
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,
}

const fn default_rate_limit_per_second() -> u32 {
    DEFAULT_RATE_LIMIT_PER_SECOND
}

const fn default_rate_limit_burst() -> u32 {
    DEFAULT_RATE_LIMIT_BURST
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_menu_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__ADMIN_IDS=1 ./target/app` would set the `admin_ids` key
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables; empty values count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the set of administrator Telegram IDs
    #[must_use]
    pub fn admins(&self) -> HashSet<i64> {
        parse_id_list(self.admin_ids_str.as_deref())
    }
}

fn parse_id_list(raw: Option<&str>) -> HashSet<i64> {
    raw.map(|s| {
        s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .filter_map(|id| id.parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

/// Process-wide configuration consulted on every update.
///
/// The admin set is fixed at startup. Group mode and the active chat can be
/// changed at runtime from the admin menu. The bot's own id is written once,
/// after `getMe` resolves.
pub struct RuntimeConfig {
    admins: HashSet<i64>,
    active: AtomicBool,
    active_chat: RwLock<Option<i64>>,
    my_id: OnceLock<i64>,
    limiter: Arc<dyn TokenSource>,
}

impl RuntimeConfig {
    /// Create a runtime configuration.
    #[must_use]
    pub fn new(
        admins: HashSet<i64>,
        active: bool,
        active_chat: Option<i64>,
        limiter: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            admins,
            active: AtomicBool::new(active),
            active_chat: RwLock::new(active_chat),
            my_id: OnceLock::new(),
            limiter,
        }
    }

    /// Build the runtime configuration from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &Settings, limiter: Arc<dyn TokenSource>) -> Self {
        Self::new(
            settings.admins(),
            settings.group_mode_active,
            settings.active_chat_id,
            limiter,
        )
    }

    /// Configured administrator ids.
    #[must_use]
    pub const fn admins(&self) -> &HashSet<i64> {
        &self.admins
    }

    /// Whether `user_id` belongs to an administrator.
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Whether group mode is enabled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Enable or disable group mode.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// The group chat currently allowed to use the chat menu.
    pub async fn active_chat(&self) -> Option<i64> {
        *self.active_chat.read().await
    }

    /// Replace the active group chat.
    pub async fn set_active_chat(&self, chat_id: Option<i64>) {
        *self.active_chat.write().await = chat_id;
    }

    /// The bot's own user id, once resolved.
    #[must_use]
    pub fn my_id(&self) -> Option<i64> {
        self.my_id.get().copied()
    }

    /// Record the bot's own user id. Returns `false` if it was already set.
    pub fn set_my_id(&self, id: i64) -> bool {
        self.my_id.set(id).is_ok()
    }

    /// Rate limiter shared by every menu dispatch.
    #[must_use]
    pub fn limiter(&self) -> Arc<dyn TokenSource> {
        Arc::clone(&self.limiter)
    }
}
