//! Entry point for every message and callback update.
//!
//! The router drops all updates during a short grace period after startup so
//! a reconnect does not replay the backlog Telegram queued while the bot was
//! down. After that it classifies each update by sender and chat and hands
//! it to exactly one menu, or registers a group it has not seen before.
//!
//! Messages pay one admission token before a menu renders; callbacks never
//! do. Admin callbacks lose their `admin|` prefix, user and chat callbacks
//! keep the full payload. Menus depend on both rules.

use crate::bot::admission::AdmissionGate;
use crate::bot::callback_path::{match_callback, RootNamespace};
use crate::bot::events::{CallbackEvent, MessageEvent};
use crate::bot::menus::Menus;
use crate::bot::messenger::Messenger;
use crate::bot::notifier::{spawn_detached, AdminNotifier};
use crate::config::{RuntimeConfig, STARTUP_GRACE_PERIOD};
use crate::storage::GroupStorage;
use anyhow::{anyhow, Result};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Title stored for groups that report none.
pub const UNTITLED_GROUP: &str = "null";

/// Collaborators handed to [`EventRouter::start`].
pub struct RouterDeps {
    /// Admin, user and chat menus
    pub menus: Menus,
    /// Group registry
    pub storage: Arc<dyn GroupStorage>,
    /// Process-wide configuration
    pub config: Arc<RuntimeConfig>,
    /// Platform client for notices and identity lookup
    pub messenger: Arc<dyn Messenger>,
}

/// Classifies inbound updates and dispatches them to the menus.
pub struct EventRouter {
    menus: Menus,
    storage: Arc<dyn GroupStorage>,
    config: Arc<RuntimeConfig>,
    gate: AdmissionGate,
    notifier: AdminNotifier,
    // Written once, by the grace timer.
    suppressing: Arc<AtomicBool>,
}

impl EventRouter {
    /// Create the router and run its startup side effects.
    ///
    /// Resolves the bot's own id in the background, sends a "started" notice
    /// to every administrator and arms the grace timer. None of these report
    /// failure. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(deps: RouterDeps) -> Arc<Self> {
        let RouterDeps {
            menus,
            storage,
            config,
            messenger,
        } = deps;

        let router = Arc::new(Self {
            menus,
            storage,
            gate: AdmissionGate::new(config.limiter()),
            notifier: AdminNotifier::new(Arc::clone(&messenger), config.admins().iter().copied()),
            config,
            suppressing: Arc::new(AtomicBool::new(true)),
        });

        router.resolve_identity(messenger);
        router.notifier.announce_started();
        router.arm_grace_timer(STARTUP_GRACE_PERIOD);

        router
    }

    /// Whether updates are still being dropped.
    #[must_use]
    pub fn is_suppressing(&self) -> bool {
        self.suppressing.load(Ordering::Acquire)
    }

    /// Notifier for the configured administrators.
    #[must_use]
    pub fn notifier(&self) -> AdminNotifier {
        self.notifier.clone()
    }

    fn resolve_identity(&self, messenger: Arc<dyn Messenger>) {
        let config = Arc::clone(&self.config);
        spawn_detached("resolve_identity", async move {
            let id = messenger.own_id().await?;
            config.set_my_id(id);
            info!(bot_id = id, "Bot identity resolved");
            Ok(())
        });
    }

    fn arm_grace_timer(&self, grace: Duration) {
        let suppressing = Arc::clone(&self.suppressing);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            suppressing.store(false, Ordering::Release);
            info!("Startup grace period over, accepting updates");
        });
    }

    /// Handle a message update. Never fails; errors are logged.
    pub async fn handle_message(&self, event: &MessageEvent) {
        if self.is_suppressing() {
            return;
        }

        if let Err(e) = catch_dispatch(self.route_message(event)).await {
            error!(
                location = "newMessage",
                chat_id = event.chat_id,
                sender = event.sender_id,
                error = %e,
                "Message dispatch failed"
            );
        }
    }

    /// Handle a callback query update. Never fails; errors are logged.
    pub async fn handle_callback(&self, event: &CallbackEvent) {
        if self.is_suppressing() {
            return;
        }

        if let Err(e) = catch_dispatch(self.route_callback(event)).await {
            error!(
                location = "newCallback",
                sender = event.sender_id(),
                error = %e,
                "Callback dispatch failed"
            );
        }
    }

    async fn route_message(&self, event: &MessageEvent) -> Result<()> {
        if let Some(text) = event.text.as_deref() {
            info!(chat_id = event.chat_id, text = %text, "Message");
        }

        if event.is_private() {
            let menu = if self.config.is_admin(event.sender_id) {
                &self.menus.admin
            } else {
                &self.menus.user
            };
            return self.gate.admit(|| menu.main_menu(event)).await;
        }

        if !self.config.is_active() {
            return Ok(());
        }

        if self.config.active_chat().await == Some(event.chat_id) {
            return self.gate.admit(|| self.menus.chat.main_menu(event)).await;
        }

        // First message from a group we do not serve yet: remember it so an
        // admin can pick it later. Registration is free of admission cost.
        let title = event.chat_title.as_deref().unwrap_or(UNTITLED_GROUP);
        self.storage.add_group(event.chat_id, title).await?;
        Ok(())
    }

    async fn route_callback(&self, event: &CallbackEvent) -> Result<()> {
        let Some(data) = event.data() else {
            return Ok(());
        };

        info!(sender = event.sender_id(), callback = %data, "Callback");

        let Some(route) = match_callback(data) else {
            return Ok(());
        };

        match route.namespace {
            RootNamespace::Admin => {
                // Non-admins pressing admin buttons get no answer at all.
                if !self.config.is_admin(event.sender_id()) {
                    return Ok(());
                }
                self.menus.admin.callback_menu(event, &route.path).await
            }
            RootNamespace::User => self.menus.user.callback_menu(event, &route.path).await,
            RootNamespace::Chat => self.menus.chat.callback_menu(event, &route.path).await,
        }
    }
}

/// Await a dispatch, turning a panic into an error.
async fn catch_dispatch<F>(dispatch: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(dispatch).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("dispatch panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::admission::MockTokenSource;
    use crate::bot::menus::{MenuHandler, MockMenuHandler};
    use crate::bot::messenger::MockMessenger;
    use crate::storage::MockGroupStorage;
    use crate::testing::{callback_query, message_event, mock_messenger_quiet};
    use async_trait::async_trait;
    use crate::bot::alerts::{AdminAlert, AdminAlertLayer};
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::prelude::*;

    type Journal = Arc<Mutex<Vec<String>>>;

    const ADMIN: i64 = 1;
    const USER: i64 = 5;
    const ACTIVE_GROUP: i64 = -100;
    const OTHER_GROUP: i64 = -200;

    fn record(journal: &Journal, entry: String) {
        if let Ok(mut entries) = journal.lock() {
            entries.push(entry);
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn journal_menu(name: &'static str, journal: &Journal, fail: bool) -> MockMenuHandler {
        let mut menu = MockMenuHandler::new();
        let j = Arc::clone(journal);
        menu.expect_main_menu().returning(move |_| {
            record(&j, format!("{name}.main"));
            if fail {
                Err(anyhow!("{name} menu failed"))
            } else {
                Ok(())
            }
        });
        let j = Arc::clone(journal);
        menu.expect_callback_menu().returning(move |_, path| {
            record(&j, format!("{name}.callback:{path}"));
            if fail {
                Err(anyhow!("{name} menu failed"))
            } else {
                Ok(())
            }
        });
        menu
    }

    fn journal_tokens(journal: &Journal) -> MockTokenSource {
        let mut tokens = MockTokenSource::new();
        let j = Arc::clone(journal);
        tokens.expect_acquire_token().returning(move || {
            record(&j, "token".to_string());
            Ok(())
        });
        tokens
    }

    fn journal_storage(journal: &Journal) -> MockGroupStorage {
        let mut storage = MockGroupStorage::new();
        let j = Arc::clone(journal);
        storage.expect_add_group().returning(move |chat_id, title| {
            record(&j, format!("add_group:{chat_id}:{title}"));
            Ok(())
        });
        storage
    }

    fn journal_menus(journal: &Journal) -> Menus {
        Menus {
            admin: Arc::new(journal_menu("admin", journal, false)),
            user: Arc::new(journal_menu("user", journal, false)),
            chat: Arc::new(journal_menu("chat", journal, false)),
        }
    }

    fn start_router(
        journal: &Journal,
        menus: Menus,
        active: bool,
        active_chat: Option<i64>,
        messenger: MockMessenger,
    ) -> Arc<EventRouter> {
        let config = Arc::new(RuntimeConfig::new(
            HashSet::from([ADMIN]),
            active,
            active_chat,
            Arc::new(journal_tokens(journal)),
        ));
        EventRouter::start(RouterDeps {
            menus,
            storage: Arc::new(journal_storage(journal)),
            config,
            messenger: Arc::new(messenger),
        })
    }

    fn journaled_router(
        journal: &Journal,
        active: bool,
        active_chat: Option<i64>,
    ) -> Arc<EventRouter> {
        start_router(
            journal,
            journal_menus(journal),
            active,
            active_chat,
            mock_messenger_quiet(),
        )
    }

    async fn pass_grace_period() {
        tokio::time::sleep(STARTUP_GRACE_PERIOD + Duration::from_millis(1)).await;
    }

    fn callback(sender: i64, data: &str) -> CallbackEvent {
        CallbackEvent::new(callback_query(sender, Some(data)))
    }

    fn capture_alerts() -> (DefaultGuard, UnboundedReceiver<AdminAlert>) {
        let (layer, rx) = AdminAlertLayer::channel();
        let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
        (guard, rx)
    }

    // `location` field of every ERROR record logged so far.
    fn alert_locations(rx: &mut UnboundedReceiver<AdminAlert>) -> Vec<String> {
        let mut locations = Vec::new();
        while let Ok(alert) = rx.try_recv() {
            let location = alert.fields.get("location").and_then(Value::as_str);
            locations.push(location.unwrap_or_default().to_string());
        }
        locations
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_dropped_during_grace_period() {
        let journal = Journal::default();
        let router = journaled_router(&journal, true, Some(ACTIVE_GROUP));

        assert!(router.is_suppressing());
        router
            .handle_message(&message_event(ADMIN, ADMIN, Some("/start"), None))
            .await;
        router
            .handle_message(&message_event(USER, OTHER_GROUP, Some("hi"), Some("G")))
            .await;
        router.handle_callback(&callback(ADMIN, "admin|groups")).await;

        tokio::time::sleep(STARTUP_GRACE_PERIOD - Duration::from_millis(1)).await;
        assert!(router.is_suppressing());
        router
            .handle_message(&message_event(USER, USER, Some("/start"), None))
            .await;

        assert!(entries(&journal).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppression_lifts_once_and_stays_lifted() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);

        pass_grace_period().await;
        assert!(!router.is_suppressing());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!router.is_suppressing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_message_from_admin_goes_to_admin_menu() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        router
            .handle_message(&message_event(ADMIN, ADMIN, Some("/start"), None))
            .await;

        assert_eq!(entries(&journal), vec!["token", "admin.main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_message_from_user_goes_to_user_menu() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, USER, Some("/start"), None))
            .await;

        assert_eq!(entries(&journal), vec!["token", "user.main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_message_without_text_is_still_dispatched() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, USER, None, None))
            .await;

        assert_eq!(entries(&journal), vec!["token", "user.main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_message_ignored_when_group_mode_off() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, Some(ACTIVE_GROUP));
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, ACTIVE_GROUP, Some("/menu"), Some("A")))
            .await;
        router
            .handle_message(&message_event(ADMIN, OTHER_GROUP, Some("hi"), Some("B")))
            .await;

        assert!(entries(&journal).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_chat_goes_to_chat_menu() {
        let journal = Journal::default();
        let router = journaled_router(&journal, true, Some(ACTIVE_GROUP));
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, ACTIVE_GROUP, Some("/menu"), Some("A")))
            .await;

        assert_eq!(entries(&journal), vec!["token", "chat.main"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_group_is_registered_without_token() {
        let journal = Journal::default();
        let router = journaled_router(&journal, true, Some(ACTIVE_GROUP));
        pass_grace_period().await;

        router
            .handle_message(&message_event(ADMIN, OTHER_GROUP, Some("hi"), Some("Team")))
            .await;
        router
            .handle_message(&message_event(USER, -300, None, None))
            .await;

        assert_eq!(
            entries(&journal),
            vec!["add_group:-200:Team", "add_group:-300:null"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_registered_when_no_active_chat_configured() {
        let journal = Journal::default();
        let router = journaled_router(&journal, true, None);
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, OTHER_GROUP, Some("hi"), Some("Team")))
            .await;

        assert_eq!(entries(&journal), vec!["add_group:-200:Team"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_callback_from_non_admin_is_dropped() {
        let journal = Journal::default();
        let router = journaled_router(&journal, true, Some(ACTIVE_GROUP));
        pass_grace_period().await;

        router.handle_callback(&callback(USER, "admin|settings")).await;

        assert!(entries(&journal).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_callback_is_stripped() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        router.handle_callback(&callback(ADMIN, "admin|settings")).await;

        assert_eq!(entries(&journal), vec!["admin.callback:settings"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_and_chat_callbacks_keep_full_payload() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        router.handle_callback(&callback(USER, "user|profile")).await;
        router.handle_callback(&callback(ADMIN, "user|profile")).await;
        router.handle_callback(&callback(USER, "chat|info")).await;

        assert_eq!(
            entries(&journal),
            vec![
                "user.callback:user|profile",
                "user.callback:user|profile",
                "chat.callback:chat|info"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_or_empty_callbacks_are_ignored() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        router.handle_callback(&callback(ADMIN, "settings")).await;
        router.handle_callback(&callback(ADMIN, "")).await;
        router
            .handle_callback(&CallbackEvent::new(callback_query(ADMIN, None)))
            .await;

        assert!(entries(&journal).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_errors_are_contained() {
        let (_guard, mut alerts) = capture_alerts();
        let journal = Journal::default();
        let menus = Menus {
            admin: Arc::new(journal_menu("admin", &journal, true)),
            user: Arc::new(journal_menu("user", &journal, true)),
            chat: Arc::new(journal_menu("chat", &journal, false)),
        };
        let router = start_router(&journal, menus, false, None, mock_messenger_quiet());
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, USER, Some("/start"), None))
            .await;
        router.handle_callback(&callback(ADMIN, "admin|groups")).await;
        router
            .handle_message(&message_event(USER, USER, Some("/start"), None))
            .await;

        assert_eq!(
            entries(&journal),
            vec![
                "token",
                "user.main",
                "admin.callback:groups",
                "token",
                "user.main"
            ]
        );
        assert_eq!(
            alert_locations(&mut alerts),
            vec!["newMessage", "newCallback", "newMessage"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_failure_skips_menu() {
        let (_guard, mut alerts) = capture_alerts();
        let journal = Journal::default();
        let mut tokens = MockTokenSource::new();
        tokens
            .expect_acquire_token()
            .returning(|| Err(anyhow!("limiter unavailable")));
        let config = Arc::new(RuntimeConfig::new(
            HashSet::from([ADMIN]),
            false,
            None,
            Arc::new(tokens),
        ));
        let router = EventRouter::start(RouterDeps {
            menus: journal_menus(&journal),
            storage: Arc::new(journal_storage(&journal)),
            config,
            messenger: Arc::new(mock_messenger_quiet()),
        });
        pass_grace_period().await;

        router
            .handle_message(&message_event(ADMIN, ADMIN, Some("/start"), None))
            .await;

        assert!(entries(&journal).is_empty());
        assert_eq!(alert_locations(&mut alerts), vec!["newMessage"]);
    }

    struct PanickingMenu;

    #[async_trait]
    impl MenuHandler for PanickingMenu {
        async fn main_menu(&self, _event: &MessageEvent) -> Result<()> {
            panic!("menu exploded");
        }

        async fn callback_menu(&self, _event: &CallbackEvent, _path: &str) -> Result<()> {
            panic!("menu exploded");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_panics_are_contained() {
        let (_guard, mut alerts) = capture_alerts();
        let journal = Journal::default();
        let menus = Menus {
            admin: Arc::new(PanickingMenu),
            user: Arc::new(journal_menu("user", &journal, false)),
            chat: Arc::new(journal_menu("chat", &journal, false)),
        };
        let router = start_router(&journal, menus, false, None, mock_messenger_quiet());
        pass_grace_period().await;

        router
            .handle_message(&message_event(ADMIN, ADMIN, Some("/start"), None))
            .await;
        router.handle_callback(&callback(ADMIN, "admin|groups")).await;
        router
            .handle_message(&message_event(USER, USER, Some("/start"), None))
            .await;

        assert_eq!(entries(&journal), vec!["token", "token", "user.main"]);
        assert_eq!(
            alert_locations(&mut alerts),
            vec!["newMessage", "newCallback"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_dispatch_logs_no_error() {
        let (_guard, mut alerts) = capture_alerts();
        let journal = Journal::default();
        let router = journaled_router(&journal, true, Some(ACTIVE_GROUP));
        pass_grace_period().await;

        router
            .handle_message(&message_event(USER, USER, Some("/start"), None))
            .await;
        router.handle_callback(&callback(USER, "user|profile")).await;

        assert!(alert_locations(&mut alerts).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_messages_are_not_deduplicated() {
        let journal = Journal::default();
        let router = journaled_router(&journal, false, None);
        pass_grace_period().await;

        let event = message_event(ADMIN, ADMIN, Some("/start"), None);
        for _ in 0..3 {
            router.handle_message(&event).await;
        }

        assert_eq!(
            entries(&journal),
            vec!["token", "admin.main", "token", "admin.main", "token", "admin.main"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_resolves_identity_and_notifies_admins() {
        let journal = Journal::default();
        let (tx, mut notices) = tokio::sync::mpsc::unbounded_channel();

        let mut messenger = MockMessenger::new();
        messenger.expect_own_id().times(1).returning(|| Ok(777));
        messenger
            .expect_send_text()
            .times(1)
            .returning(move |chat_id, text| {
                let _ = tx.send((chat_id, text.to_string()));
                Ok(())
            });

        let router = start_router(&journal, journal_menus(&journal), false, None, messenger);
        pass_grace_period().await;

        assert_eq!(router.config.my_id(), Some(777));
        assert_eq!(
            notices.recv().await,
            Some((ADMIN, crate::bot::notifier::STARTED_NOTICE.to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_failure_is_silent() {
        let journal = Journal::default();
        let mut messenger = MockMessenger::new();
        messenger
            .expect_own_id()
            .returning(|| Err(anyhow!("network down")));
        messenger
            .expect_send_text()
            .returning(|_, _| Err(anyhow!("network down")));

        let router = start_router(&journal, journal_menus(&journal), false, None, messenger);
        pass_grace_period().await;

        assert_eq!(router.config.my_id(), None);
        router
            .handle_message(&message_event(ADMIN, ADMIN, Some("/start"), None))
            .await;
        assert_eq!(entries(&journal), vec!["token", "admin.main"]);
    }
}
