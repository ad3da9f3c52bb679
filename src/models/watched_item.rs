use super::history::HistoryLedger;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monitoring status of a watched item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Added but not sampled yet
    #[default]
    Pending,
    Tracking,
    TargetReached,
    /// The latest sample failed; retried on the next tick
    Error,
}

impl ItemStatus {
    /// Convert to the persisted string form
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Tracking => "tracking",
            ItemStatus::TargetReached => "target_reached",
            ItemStatus::Error => "error",
        }
    }

    /// Human-readable label for list views
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::Tracking => "Tracking",
            ItemStatus::TargetReached => "Target Reached!",
            ItemStatus::Error => "Error",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the stable item id from its source URL
pub fn item_id_for_url(source_url: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, source_url.as_bytes())
}

/// A product whose price is being watched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedItem {
    pub id: Uuid,
    pub name: String,
    pub source_url: String,
    pub target_price: Decimal,
    pub current_price: Option<Decimal>, // None until first successful sample
    pub lowest_observed_price: Option<Decimal>,
    pub status: ItemStatus,
    /// Last status that was not `Error`; drives edge-triggering across failed ticks
    #[serde(default)]
    pub settled_status: ItemStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_drop_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub history: HistoryLedger,
}

impl WatchedItem {
    /// Create a new item in `Pending` state with an empty ledger
    pub fn new(
        name: String,
        source_url: String,
        target_price: Decimal,
        history_capacity: usize,
    ) -> Self {
        Self {
            id: item_id_for_url(&source_url),
            name,
            source_url,
            target_price,
            current_price: None,
            lowest_observed_price: None,
            status: ItemStatus::Pending,
            settled_status: ItemStatus::Pending,
            last_checked_at: None,
            last_drop_at: None,
            last_error: None,
            added_at: Utc::now(),
            history: HistoryLedger::with_capacity(history_capacity),
        }
    }

    /// Replace every field the scheduler owns
    pub fn apply(&mut self, update: ItemUpdate) {
        self.current_price = update.current_price;
        self.lowest_observed_price = update.lowest_observed_price;
        self.status = update.status;
        self.settled_status = update.settled_status;
        self.last_checked_at = update.last_checked_at;
        self.last_drop_at = update.last_drop_at;
        self.last_error = update.last_error;
        self.history = update.history;
    }

    /// Copy of this item with `update` applied
    pub fn updated(&self, update: &ItemUpdate) -> Self {
        let mut next = self.clone();
        next.apply(update.clone());
        next
    }
}

/// The scheduler-owned fields of a [`WatchedItem`], committed atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub current_price: Option<Decimal>,
    pub lowest_observed_price: Option<Decimal>,
    pub status: ItemStatus,
    pub settled_status: ItemStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_drop_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub history: HistoryLedger,
}

impl ItemUpdate {
    /// Start from the item's current values
    pub fn from_item(item: &WatchedItem) -> Self {
        Self {
            current_price: item.current_price,
            lowest_observed_price: item.lowest_observed_price,
            status: item.status,
            settled_status: item.settled_status,
            last_checked_at: item.last_checked_at,
            last_drop_at: item.last_drop_at,
            last_error: item.last_error.clone(),
            history: item.history.clone(),
        }
    }
}
