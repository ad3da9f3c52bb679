use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of observations kept per item unless configured otherwise
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// A single price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub observed_at: DateTime<Utc>,
    pub price: Decimal,
    /// True if the price is lower than the immediately preceding record
    pub was_drop: bool,
}

/// Fixed-capacity ring of price observations, oldest first.
///
/// The ledger computes `was_drop` itself when a record is appended; callers
/// only supply the timestamp and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLedger")]
pub struct HistoryLedger {
    capacity: usize,
    records: VecDeque<HistoryRecord>,
}

/// Persisted form, validated on the way in
#[derive(Deserialize)]
struct RawLedger {
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    records: Vec<HistoryRecord>,
}

fn default_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl TryFrom<RawLedger> for HistoryLedger {
    type Error = String;

    fn try_from(raw: RawLedger) -> Result<Self, Self::Error> {
        if raw.capacity == 0 {
            return Err("history capacity must be at least 1".to_string());
        }
        Ok(Self::from_records(raw.records, raw.capacity))
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryLedger {
    /// Create an empty ledger. A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild a ledger from stored records, keeping only the newest `capacity`
    pub fn from_records(records: Vec<HistoryRecord>, capacity: usize) -> Self {
        let mut ledger = Self::with_capacity(capacity);
        let skip = records.len().saturating_sub(ledger.capacity);
        ledger.records.extend(records.into_iter().skip(skip));
        ledger
    }

    /// Append an observation, evicting the oldest record when full.
    ///
    /// Returns the stored record.
    pub fn append(&mut self, observed_at: DateTime<Utc>, price: Decimal) -> HistoryRecord {
        let was_drop = self
            .records
            .back()
            .map(|last| price < last.price)
            .unwrap_or(false);

        let record = HistoryRecord {
            observed_at,
            price,
            was_drop,
        };

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());
        record
    }

    /// Records in chronological order, oldest first
    pub fn snapshot(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&HistoryRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, dropping the oldest records if it shrinks
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }
}
