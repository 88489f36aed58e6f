//! Best-effort notifications to bot administrators.
//!
//! Nothing in here reports failure to the caller. A send that fails for one
//! administrator never prevents the sends to the others.

use crate::bot::messenger::Messenger;
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tracing target of this module. Records with this target never reach the
/// admin alert sink, so a failing notifier cannot feed itself.
pub const NOTIFIER_TARGET: &str = "oxide_menu_bot::bot::notifier";

/// Text sent to every administrator once the router is up.
pub const STARTED_NOTICE: &str = "started";

/// Run `task` in the background and discard its outcome.
///
/// Used for sends whose result nobody waits for: startup notices and
/// per-admin alerts. A failure is noted at debug level and dropped.
pub fn spawn_detached<F>(label: &'static str, task: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            debug!(target: NOTIFIER_TARGET, task = label, error = %e, "Detached task failed");
        }
    });
}

/// Sends log lines to every configured administrator.
#[derive(Clone)]
pub struct AdminNotifier {
    messenger: Arc<dyn Messenger>,
    admins: Arc<[i64]>,
}

impl AdminNotifier {
    /// Create a notifier for the given administrator ids.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, admins: impl IntoIterator<Item = i64>) -> Self {
        let mut admins: Vec<i64> = admins.into_iter().collect();
        admins.sort_unstable();
        Self {
            messenger,
            admins: admins.into(),
        }
    }

    /// Administrator ids receiving notifications.
    #[must_use]
    pub fn admins(&self) -> &[i64] {
        &self.admins
    }

    /// Fire one detached "started" message per administrator.
    pub fn announce_started(&self) {
        for &admin in self.admins.iter() {
            let messenger = Arc::clone(&self.messenger);
            spawn_detached("started_notice", async move {
                messenger.send_text(admin, STARTED_NOTICE).await
            });
        }
    }

    /// Send a formatted log line to every administrator.
    ///
    /// `extra` is rendered as JSON. If it cannot be serialized the line is
    /// dropped and the problem only logged locally.
    pub async fn log_to_admin<E>(
        &self,
        location: &str,
        message: &str,
        timestamp: DateTime<Utc>,
        extra: &E,
    ) where
        E: Serialize + ?Sized,
    {
        let extra = match serde_json::to_string(extra) {
            Ok(json) => json,
            Err(e) => {
                warn!(target: NOTIFIER_TARGET, error = %e, "Failed to serialize admin log payload");
                return;
            }
        };
        let text = format_admin_log(location, message, &extra, timestamp);

        let sends = self.admins.iter().map(|&admin| {
            let text = text.as_str();
            async move {
                if let Err(e) = self.messenger.send_text(admin, text).await {
                    debug!(target: NOTIFIER_TARGET, admin, error = %e, "Admin log delivery failed");
                }
            }
        });
        join_all(sends).await;
    }
}

/// Render an admin log line.
#[must_use]
pub fn format_admin_log(
    location: &str,
    message: &str,
    extra_json: &str,
    timestamp: DateTime<Utc>,
) -> String {
    format!("location:{location}\nMessage:{message}\nError:{extra_json}\ndate:{timestamp}")
}
