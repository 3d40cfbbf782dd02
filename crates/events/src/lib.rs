//! Notifications surfaced to the hosting UI shell.
//!
//! - [`NotificationBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`Notification`]: success, warning, error and info messages emitted
//!   by the planning engine.

pub mod bus;

pub use bus::{Notification, NotificationBus, NotificationLevel};
