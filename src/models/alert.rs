use super::watched_item::WatchedItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured alert content, handed to every channel unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub item_id: Uuid,
    pub name: String,
    pub source_url: String,
    pub current_price: Decimal,
    pub target_price: Decimal,
    pub last_drop_at: Option<DateTime<Utc>>,
    pub raised_at: DateTime<Utc>,
}

impl AlertPayload {
    /// Build a payload from an item that has just crossed its target.
    ///
    /// Returns `None` if the item has never been priced.
    pub fn for_item(item: &WatchedItem, raised_at: DateTime<Utc>) -> Option<Self> {
        let current_price = item.current_price?;
        Some(Self {
            item_id: item.id,
            name: item.name.clone(),
            source_url: item.source_url.clone(),
            current_price,
            target_price: item.target_price,
            last_drop_at: item.last_drop_at,
            raised_at,
        })
    }

    /// One-line subject for email/SMS
    pub fn subject(&self) -> String {
        format!("Price alert for {}!", self.name)
    }

    /// Full human-readable alert text
    pub fn message(&self) -> String {
        let last_drop = self
            .last_drop_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "{}\nCurrent Price: ${:.2}\nTarget Price: ${:.2}\nLast Price Drop: {}\n{}",
            self.subject(),
            self.current_price.round_dp(2),
            self.target_price.round_dp(2),
            last_drop,
            self.source_url,
        )
    }
}
