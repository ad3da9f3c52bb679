//! Pricewatch Engine Library
//!
//! Monitoring and alert engine for watched product prices: a bounded price
//! history per item, an edge-triggered threshold state machine, alert
//! fan-out, and a periodic scheduler that runs alongside concurrent readers
//! of the shared item registry.

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repositories::WatchRegistry;
use services::{AlertDispatcher, MonitorScheduler, Sampler, SnapshotStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared between the scheduler and its readers
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<WatchRegistry>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub store: Arc<SnapshotStore>,
}

impl AppState {
    /// Build the state and restore the registry from the snapshot file.
    ///
    /// An unreadable snapshot is logged and replaced by an empty registry.
    pub async fn initialize(config: AppConfig) -> AppResult<Self> {
        let registry = Arc::new(WatchRegistry::new(config.monitor.history_capacity));
        let dispatcher = Arc::new(AlertDispatcher::from_config(&config.notifications));
        let store = Arc::new(SnapshotStore::new(config.snapshot.path.clone()));

        let snapshot = store.load_or_default().await;
        registry.restore(snapshot).await;

        if registry.contact().await.is_none() {
            if let Some(contact) = config.notifications.seed_contact()? {
                info!("Using contact from configuration");
                registry.set_contact(Some(contact)).await;
            }
        }
        if registry.contact().await.is_none() {
            warn!("No contact configured; alerts are in-process only");
        }

        Ok(Self {
            config,
            registry,
            dispatcher,
            store,
        })
    }

    /// Scheduler wired to this state's registry, dispatcher and store
    pub fn scheduler(&self, sampler: Arc<dyn Sampler>) -> MonitorScheduler {
        MonitorScheduler::new(
            self.registry.clone(),
            sampler,
            self.dispatcher.clone(),
            self.config.monitor.clone(),
        )
        .with_store(self.store.clone())
    }

    /// Persist the registry now
    pub async fn save(&self) -> AppResult<()> {
        let snapshot = self.registry.snapshot().await;
        self.store.save(&snapshot).await?;
        Ok(())
    }
}
