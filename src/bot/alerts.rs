//! Forwarding of error-level log records to administrators.
//!
//! [`AdminAlertLayer`] sits in the `tracing_subscriber` registry next to the
//! fmt layer. It cannot send anything itself (the bot does not exist yet when
//! logging is initialised), so it queues alerts on a channel that
//! [`spawn_alert_forwarder`] drains once the notifier is available.

use crate::bot::notifier::{AdminNotifier, NOTIFIER_TARGET};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// An error record captured for administrators.
#[derive(Debug, Clone)]
pub struct AdminAlert {
    /// `module:line` of the log call
    pub location: String,
    /// Formatted log message
    pub message: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Remaining structured fields of the record
    pub fields: Map<String, Value>,
}

/// Layer queueing every ERROR record as an [`AdminAlert`].
pub struct AdminAlertLayer {
    tx: UnboundedSender<AdminAlert>,
}

impl AdminAlertLayer {
    /// Create the layer and the receiving end of its queue.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<AdminAlert>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<S: Subscriber> Layer<S> for AdminAlertLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() != Level::ERROR || meta.target().starts_with(NOTIFIER_TARGET) {
            return;
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let module = meta.module_path().unwrap_or_else(|| meta.target());
        let location = match meta.line() {
            Some(line) => format!("{module}:{line}"),
            None => module.to_string(),
        };

        // Receiver gone means the bot is shutting down.
        let _ = self.tx.send(AdminAlert {
            location,
            message: collector.message.unwrap_or_default(),
            timestamp: Utc::now(),
            fields: collector.fields,
        });
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.message = Some(text);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

/// Deliver queued alerts through `notifier` until the queue closes.
pub fn spawn_alert_forwarder(
    mut rx: UnboundedReceiver<AdminAlert>,
    notifier: AdminNotifier,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(alert) = rx.recv().await {
            notifier
                .log_to_admin(&alert.location, &alert.message, alert.timestamp, &alert.fields)
                .await;
        }
    })
}
