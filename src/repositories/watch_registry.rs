use crate::error::{option_to_result, RegistryError};
use crate::models::{item_id_for_url, ItemUpdate, UserContact, WatchedItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Point-in-time copy of everything the registry owns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub contact: Option<UserContact>,
    #[serde(default)]
    pub items: Vec<WatchedItem>,
}

#[derive(Default)]
struct RegistryInner {
    /// Insertion order
    order: Vec<Uuid>,
    items: HashMap<Uuid, Arc<RwLock<WatchedItem>>>,
}

/// Authoritative, concurrency-safe set of watched items.
///
/// The outer lock guards membership and order; each item sits behind its own
/// lock so an update to one item never blocks readers of another.
pub struct WatchRegistry {
    inner: RwLock<RegistryInner>,
    contact: RwLock<Option<UserContact>>,
    revision: AtomicU64,
    history_capacity: usize,
}

impl WatchRegistry {
    /// Create an empty registry whose new items keep `history_capacity` records
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            contact: RwLock::new(None),
            revision: AtomicU64::new(0),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Start tracking a new item
    pub async fn add(&self, name: &str, source_url: &str, target_price: Decimal) -> RegistryResult<Uuid> {
        let name = name.trim();
        let source_url = source_url.trim();

        if name.is_empty() {
            return Err(RegistryError::InvalidInput("name must not be empty".to_string()));
        }
        if source_url.is_empty() {
            return Err(RegistryError::InvalidInput("URL must not be empty".to_string()));
        }
        if target_price <= Decimal::ZERO {
            return Err(RegistryError::InvalidTargetPrice(target_price));
        }

        let item = WatchedItem::new(
            name.to_string(),
            source_url.to_string(),
            target_price,
            self.history_capacity,
        );
        let id = item.id;

        let mut inner = self.inner.write().await;
        if inner.items.contains_key(&id) {
            return Err(RegistryError::DuplicateUrl(source_url.to_string()));
        }
        inner.order.push(id);
        inner.items.insert(id, Arc::new(RwLock::new(item)));
        self.bump();

        info!(item_id = %id, "Added item: {} ({})", name, source_url);
        Ok(id)
    }

    /// Stop tracking the given items; unknown ids are ignored
    pub async fn remove(&self, ids: &[Uuid]) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.items.len();

        for id in ids {
            inner.items.remove(id);
        }
        let RegistryInner { order, items } = &mut *inner;
        order.retain(|id| items.contains_key(id));

        let removed = before - inner.items.len();
        if removed > 0 {
            self.bump();
            info!("Removed {} item(s)", removed);
        }
        removed
    }

    /// Copy of every item, in insertion order
    pub async fn list(&self) -> Vec<WatchedItem> {
        let inner = self.inner.read().await;
        let mut items = Vec::with_capacity(inner.order.len());
        for id in &inner.order {
            if let Some(slot) = inner.items.get(id) {
                items.push(slot.read().await.clone());
            }
        }
        items
    }

    /// Copy of a single item
    pub async fn get(&self, id: Uuid) -> RegistryResult<WatchedItem> {
        let inner = self.inner.read().await;
        let slot = option_to_result(inner.items.get(&id), id)?;
        let item = slot.read().await.clone();
        Ok(item)
    }

    /// Find an item by its exact source URL
    pub async fn find_by_url(&self, source_url: &str) -> Option<WatchedItem> {
        self.get(item_id_for_url(source_url))
            .await
            .ok()
            .filter(|item| item.source_url == source_url)
    }

    /// Atomically replace the scheduler-owned fields of one item.
    ///
    /// Returns the committed item.
    pub async fn apply_update(&self, id: Uuid, update: ItemUpdate) -> RegistryResult<WatchedItem> {
        let inner = self.inner.read().await;
        let slot = option_to_result(inner.items.get(&id), id)?;

        let mut item = slot.write().await;
        let status_changed = item.status != update.status;
        item.apply(update);
        self.bump();

        if status_changed {
            debug!(item_id = %id, status = %item.status, "Item status changed");
        }
        Ok(item.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contact(&self) -> Option<UserContact> {
        self.contact.read().await.clone()
    }

    pub async fn set_contact(&self, contact: Option<UserContact>) {
        *self.contact.write().await = contact;
        self.bump();
    }

    /// Everything needed to persist the registry
    pub async fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            contact: self.contact().await,
            items: self.list().await,
        }
    }

    /// Replace the registry contents with previously persisted state.
    ///
    /// Ids are re-derived from the source URL, items that `add` would reject
    /// are dropped, ledgers are resized to this registry's history capacity,
    /// and duplicate URLs keep their first occurrence.
    pub async fn restore(&self, snapshot: RegistrySnapshot) {
        let mut restored = RegistryInner::default();

        for mut item in snapshot.items {
            if item.name.trim().is_empty() || item.source_url.trim().is_empty() {
                warn!(item_id = %item.id, "Dropping snapshot item with blank name or URL");
                continue;
            }
            if item.target_price <= Decimal::ZERO {
                warn!(
                    item_id = %item.id,
                    "Dropping snapshot item with non-positive target price {}",
                    item.target_price
                );
                continue;
            }

            let id = item_id_for_url(&item.source_url);
            if item.id != id {
                warn!(stored_id = %item.id, item_id = %id, "Snapshot id does not match URL, re-deriving");
                item.id = id;
            }

            if restored.items.contains_key(&item.id) {
                debug!(item_id = %item.id, "Skipping duplicate item in snapshot");
                continue;
            }
            item.history.resize(self.history_capacity);
            restored.order.push(item.id);
            restored.items.insert(item.id, Arc::new(RwLock::new(item)));
        }

        let count = restored.order.len();
        *self.inner.write().await = restored;
        *self.contact.write().await = snapshot.contact;
        self.bump();

        info!("Restored {} item(s) into registry", count);
    }

    /// Monotonic counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_HISTORY_CAPACITY)
    }
}
