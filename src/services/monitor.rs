use crate::config::{FirstTick, MonitorConfig};
use crate::error::SampleError;
use crate::models::{AlertPayload, ItemUpdate, UserContact, WatchedItem};
use crate::repositories::WatchRegistry;
use crate::services::alert_dispatcher::{AlertDispatcher, DispatchReport};
use crate::services::sampler::Sampler;
use crate::services::snapshot_store::SnapshotStore;
use crate::services::threshold::{self, Evaluation};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Lifecycle state of the monitoring loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Summary of one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub items: usize,
    pub sampled: usize,
    pub failed: usize,
    /// Items removed from the registry while the tick was running
    pub skipped: usize,
    pub alerts: Vec<DispatchReport>,
    pub saved: bool,
    pub duration: Duration,
}

enum ItemOutcome {
    Sampled(Option<DispatchReport>),
    Failed,
    Removed,
}

/// Compute the committed state for a successful sample.
///
/// Appends to a copy of the item's ledger, updates the running minimum and
/// last-drop time, and evaluates the threshold against the item's last
/// non-error status.
pub fn next_state(item: &WatchedItem, price: Decimal, observed_at: DateTime<Utc>) -> (ItemUpdate, Evaluation) {
    let mut history = item.history.clone();
    let record = history.append(observed_at, price);
    let evaluation = threshold::evaluate(item.settled_status, price, item.target_price);

    let lowest = item
        .lowest_observed_price
        .map_or(price, |lowest| lowest.min(price));

    let update = ItemUpdate {
        current_price: Some(price),
        lowest_observed_price: Some(lowest),
        status: evaluation.status,
        settled_status: evaluation.status,
        last_checked_at: Some(observed_at),
        last_drop_at: if record.was_drop {
            Some(observed_at)
        } else {
            item.last_drop_at
        },
        last_error: None,
        history,
    };
    (update, evaluation)
}

/// Compute the committed state for a failed sample.
///
/// Status becomes `Error`; price data, history and `settled_status` are kept.
pub fn failed_state(item: &WatchedItem, reason: String, checked_at: DateTime<Utc>) -> (ItemUpdate, Evaluation) {
    let evaluation = threshold::evaluate_failure();
    let update = ItemUpdate {
        status: evaluation.status,
        last_checked_at: Some(checked_at),
        last_error: Some(reason),
        ..ItemUpdate::from_item(item)
    };
    (update, evaluation)
}

/// Drives the periodic sample-evaluate-dispatch-commit cycle
pub struct MonitorScheduler {
    registry: Arc<WatchRegistry>,
    sampler: Arc<dyn Sampler>,
    dispatcher: Arc<AlertDispatcher>,
    store: Option<Arc<SnapshotStore>>,
    config: MonitorConfig,
    /// Registry revision covered by the last successful save
    saved_revision: Mutex<Option<u64>>,
}

impl MonitorScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    /// * `registry` - Shared item registry
    /// * `sampler` - Price source
    /// * `dispatcher` - Alert fan-out
    /// * `config` - Interval, timeouts and concurrency
    pub fn new(
        registry: Arc<WatchRegistry>,
        sampler: Arc<dyn Sampler>,
        dispatcher: Arc<AlertDispatcher>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            sampler,
            dispatcher,
            store: None,
            config,
            saved_revision: Mutex::new(None),
        }
    }

    /// Persist state through this store after changes and on stop
    pub fn with_store(mut self, store: Arc<SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start the loop on a background task
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let refresh = Arc::new(Notify::new());
        let running = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(
            self.clone()
                .run(shutdown_rx, refresh.clone(), running.clone()),
        );

        MonitorHandle {
            shutdown: shutdown_tx,
            refresh,
            running,
            task,
        }
    }

    async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        refresh: Arc<Notify>,
        running: Arc<AtomicBool>,
    ) {
        let period = self.config.tick_interval();
        let start = match self.config.first_tick {
            FirstTick::Immediate => Instant::now(),
            FirstTick::AfterInterval => Instant::now() + period,
        };
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Monitor scheduler started, ticking every {:?} (first tick: {:?})",
            period, self.config.first_tick
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
                _ = refresh.notified() => {
                    info!("Manual refresh requested");
                    interval.reset();
                }
            }

            if *shutdown.borrow() {
                break;
            }

            let tick = self.run_tick();
            tokio::pin!(tick);

            tokio::select! {
                report = &mut tick => self.log_report(&report),
                _ = shutdown.changed() => {
                    let grace = self.config.shutdown_grace();
                    info!("Stop requested mid-tick, allowing up to {:?} to finish", grace);
                    match time::timeout(grace, &mut tick).await {
                        Ok(report) => self.log_report(&report),
                        Err(_) => warn!("In-flight tick abandoned after grace period"),
                    }
                    break;
                }
            }
        }

        running.store(false, Ordering::SeqCst);
        self.persist(true).await;
        info!("Monitor scheduler stopped");
    }

    /// Run one full tick over every item in the registry
    pub async fn run_tick(&self) -> TickReport {
        let started = std::time::Instant::now();
        let items = self.registry.list().await;
        let contact = self.registry.contact().await;

        let mut report = TickReport {
            items: items.len(),
            ..TickReport::default()
        };

        let pending: Vec<_> = items
            .into_iter()
            .map(|item| self.process_item(item, contact.as_ref()))
            .collect();

        let outcomes: Vec<ItemOutcome> = stream::iter(pending)
            .buffer_unordered(self.config.max_concurrent_samples.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Sampled(alert) => {
                    report.sampled += 1;
                    report.alerts.extend(alert);
                }
                ItemOutcome::Failed => report.failed += 1,
                ItemOutcome::Removed => report.skipped += 1,
            }
        }

        report.saved = self.persist(false).await;
        report.duration = started.elapsed();
        report
    }

    async fn process_item(&self, item: WatchedItem, contact: Option<&UserContact>) -> ItemOutcome {
        let checked_at = Utc::now();

        match self.sample(&item).await {
            Ok(price) => {
                let (update, evaluation) = next_state(&item, price, checked_at);
                debug!(item_id = %item.id, %price, status = %evaluation.status, "Sampled");

                let alert = if evaluation.is_new_crossing {
                    let next = item.updated(&update);
                    match AlertPayload::for_item(&next, checked_at) {
                        Some(payload) => Some(self.dispatcher.notify(payload, contact).await),
                        None => None,
                    }
                } else {
                    None
                };

                match self.registry.apply_update(item.id, update).await {
                    Ok(_) => ItemOutcome::Sampled(alert),
                    Err(e) => {
                        debug!(item_id = %item.id, "Dropping sample: {}", e);
                        ItemOutcome::Removed
                    }
                }
            }
            Err(e) => {
                warn!(item_id = %item.id, "Failed to sample {}: {}", item.name, e);
                let (update, _) = failed_state(&item, e.to_string(), checked_at);

                match self.registry.apply_update(item.id, update).await {
                    Ok(_) => ItemOutcome::Failed,
                    Err(e) => {
                        debug!(item_id = %item.id, "Dropping failure: {}", e);
                        ItemOutcome::Removed
                    }
                }
            }
        }
    }

    /// Call the sampler with the configured timeout
    async fn sample(&self, item: &WatchedItem) -> Result<Decimal, SampleError> {
        match time::timeout(self.config.sampler_timeout(), self.sampler.sample(item)).await {
            Ok(Ok(price)) if price > Decimal::ZERO => Ok(price),
            Ok(Ok(price)) => Err(SampleError::Transient(format!("non-positive price {}", price))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SampleError::Timeout(self.config.sampler_timeout_ms)),
        }
    }

    /// Save the registry if it changed since the last save (or always, if `force`).
    ///
    /// Returns whether a save happened. Failures are logged; in-memory state
    /// is never touched.
    pub async fn persist(&self, force: bool) -> bool {
        let store = match &self.store {
            Some(store) => store,
            None => return false,
        };

        let mut saved_revision = self.saved_revision.lock().await;
        let revision = self.registry.revision();
        if !force && *saved_revision == Some(revision) {
            return false;
        }

        let snapshot = self.registry.snapshot().await;
        match store.save(&snapshot).await {
            Ok(()) => {
                *saved_revision = Some(revision);
                true
            }
            Err(e) => {
                error!(path = %store.path().display(), "Failed to save snapshot: {}", e);
                false
            }
        }
    }

    fn log_report(&self, report: &TickReport) {
        info!(
            items = report.items,
            sampled = report.sampled,
            failed = report.failed,
            alerts = report.alerts.len(),
            "Tick complete in {:?}",
            report.duration
        );
    }
}

/// Control handle for a running scheduler
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    refresh: Arc<Notify>,
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Run a tick now instead of waiting for the interval
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// No new tick starts after this is called; an in-flight tick gets the
    /// configured grace period, then a final save runs.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Monitor task ended abnormally: {}", e);
        }
    }
}
