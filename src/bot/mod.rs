/// Token-bucket admission in front of menu dispatch
pub mod admission;
/// Forwarding of error logs to administrators
pub mod alerts;
/// Callback data namespaces
pub mod callback_path;
/// Normalized inbound updates
pub mod events;
/// Admin, user and chat menus
pub mod menus;
/// Outbound platform client
pub mod messenger;
/// Best-effort administrator notices
pub mod notifier;
/// Update classification and dispatch
pub mod router;

pub use events::{CallbackEvent, MessageEvent};
pub use router::{EventRouter, RouterDeps};
