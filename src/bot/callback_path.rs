//! Callback data routing by root namespace.
//!
//! Callback payloads look like `admin|groups` or `user|profile`. The first
//! segment picks the menu that owns the button.

use std::borrow::Cow;

/// Separator removed from admin payloads before they reach the admin menu.
pub const ADMIN_SEPARATOR: &str = "admin|";

/// First path segment of a callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootNamespace {
    /// Administrator menu
    Admin,
    /// Private user menu
    User,
    /// Group chat menu
    Chat,
}

impl RootNamespace {
    /// Match order. A payload matching several prefixes goes to the first.
    pub const PRECEDENCE: [Self; 3] = [Self::Admin, Self::User, Self::Chat];

    /// Literal prefix of the namespace.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Chat => "chat",
        }
    }
}

/// A classified callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRoute<'a> {
    /// Namespace the payload belongs to
    pub namespace: RootNamespace,
    /// Path handed to the menu: stripped for admin, the full payload otherwise
    pub path: Cow<'a, str>,
}

/// Classify `data` by its root namespace.
///
/// # Examples
///
/// ```
/// use oxide_menu_bot::bot::callback_path::{match_callback, RootNamespace};
///
/// let route = match_callback("admin|groups").unwrap();
/// assert_eq!(route.namespace, RootNamespace::Admin);
/// assert_eq!(route.path, "groups");
///
/// let route = match_callback("user|profile").unwrap();
/// assert_eq!(route.path, "user|profile");
///
/// assert!(match_callback("settings").is_none());
/// ```
#[must_use]
pub fn match_callback(data: &str) -> Option<CallbackRoute<'_>> {
    let namespace = RootNamespace::PRECEDENCE
        .into_iter()
        .find(|ns| data.starts_with(ns.as_str()))?;

    let path = match namespace {
        RootNamespace::Admin => strip_admin_separator(data),
        RootNamespace::User | RootNamespace::Chat => Cow::Borrowed(data),
    };

    Some(CallbackRoute { namespace, path })
}

// Removes the first `admin|`, wherever it is. A payload such as `adminX`
// has none and is passed through untouched.
fn strip_admin_separator(data: &str) -> Cow<'_, str> {
    if let Some(rest) = data.strip_prefix(ADMIN_SEPARATOR) {
        Cow::Borrowed(rest)
    } else if data.contains(ADMIN_SEPARATOR) {
        Cow::Owned(data.replacen(ADMIN_SEPARATOR, "", 1))
    } else {
        Cow::Borrowed(data)
    }
}
