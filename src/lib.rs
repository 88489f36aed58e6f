#![deny(missing_docs)]
//! Oxide menu bot library.
//!
//! Routes Telegram messages and button presses to admin, user and group
//! menus, with admission control and a registry of known groups.

/// Telegram-facing logic: routing, menus and notices.
pub mod bot;
/// Configuration management.
pub mod config;
/// Dispatcher wiring.
pub mod runner;
/// Storage layer (R2/S3).
pub mod storage;

#[cfg(test)]
pub mod testing;
