//! Domain models for the price monitoring engine.
//!
//! This module contains the watched item, its bounded price history,
//! contact details and the alert payload handed to notification channels.

pub mod alert;
pub mod contact;
pub mod history;
pub mod watched_item;

// Re-export all models for convenient access
pub use alert::AlertPayload;
pub use contact::{NotificationChannel, UserContact};
pub use history::{HistoryLedger, HistoryRecord, DEFAULT_HISTORY_CAPACITY};
pub use watched_item::{item_id_for_url, ItemStatus, ItemUpdate, WatchedItem};
