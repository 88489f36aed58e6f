//! Wires storage, configuration, menus and the router into a teloxide
//! dispatcher.

use crate::bot::admission::{GovernorTokenSource, TokenSource};
use crate::bot::alerts::{spawn_alert_forwarder, AdminAlert};
use crate::bot::menus::Menus;
use crate::bot::messenger::TelegramMessenger;
use crate::bot::{CallbackEvent, EventRouter, MessageEvent, RouterDeps};
use crate::config::{RuntimeConfig, Settings};
use crate::storage::{GroupStorage, R2Storage};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

/// Run the bot until Ctrl-C.
///
/// `alerts` carries error records captured by the logging layer; they are
/// forwarded to the administrators once the router is up.
pub async fn run_bot(settings: Arc<Settings>, alerts: UnboundedReceiver<AdminAlert>) {
    let storage = init_storage(&settings).await;

    let limiter: Arc<dyn TokenSource> = Arc::new(GovernorTokenSource::new(
        settings.rate_limit_per_second,
        settings.rate_limit_burst,
    ));
    let config = Arc::new(RuntimeConfig::from_settings(&settings, limiter));
    info!(
        admins = config.admins().len(),
        group_mode = config.is_active(),
        per_second = settings.rate_limit_per_second,
        burst = settings.rate_limit_burst,
        "Runtime configuration ready."
    );

    let bot = Bot::new(settings.telegram_token.clone());
    let menus = Menus::telegram(bot.clone(), Arc::clone(&storage), Arc::clone(&config));

    let router = EventRouter::start(RouterDeps {
        menus,
        storage,
        config,
        messenger: Arc::new(TelegramMessenger::new(bot.clone())),
    });
    let _forwarder = spawn_alert_forwarder(alerts, router.notifier());

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![router])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &Settings) -> Arc<dyn GroupStorage> {
    match R2Storage::new(settings).await {
        Ok(s) => {
            info!("R2 Storage initialized.");
            if s.check_connection().await.is_err() {
                error!("R2 Storage connection check returned error.");
            }
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize R2 Storage: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

async fn handle_message(
    msg: Message,
    router: Arc<EventRouter>,
) -> Result<(), teloxide::RequestError> {
    // Channel posts carry no sender and have no menu.
    if let Some(event) = MessageEvent::from_message(&msg) {
        router.handle_message(&event).await;
    }
    respond(())
}

async fn handle_callback(
    q: CallbackQuery,
    router: Arc<EventRouter>,
) -> Result<(), teloxide::RequestError> {
    router.handle_callback(&CallbackEvent::from(q)).await;
    respond(())
}
