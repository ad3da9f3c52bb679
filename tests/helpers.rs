#![allow(dead_code)]

use async_trait::async_trait;
use pricewatch_engine::config::{FirstTick, MonitorConfig};
use pricewatch_engine::error::{NotificationError, SampleError};
use pricewatch_engine::models::*;
use pricewatch_engine::repositories::WatchRegistry;
use pricewatch_engine::services::*;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted sampler response
#[derive(Debug, Clone)]
pub enum Step {
    Price(Decimal),
    Fail(String),
    /// Sleep far longer than any test timeout
    Hang,
}

/// Sampler that replays queued responses per source URL
pub struct ScriptedSampler {
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    delay: Duration,
    calls: Mutex<usize>,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(0),
        }
    }

    /// Wait this long before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, url: &str, step: Step) {
        self.steps
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(step);
    }

    /// Queue prices given in cents
    pub fn push_prices(&self, url: &str, cents: &[i64]) {
        for c in cents {
            self.push(url, Step::Price(price(*c)));
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Sampler for ScriptedSampler {
    async fn sample(&self, item: &WatchedItem) -> Result<Decimal, SampleError> {
        *self.calls.lock().unwrap() += 1;
        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(&item.source_url)
            .and_then(|queue| queue.pop_front());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Some(Step::Price(p)) => Ok(p),
            Some(Step::Fail(reason)) => Err(SampleError::Transient(reason)),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Err(SampleError::Transient("woke from hang".to_string()))
            }
            None => Err(SampleError::Transient("script exhausted".to_string())),
        }
    }
}

/// Transport that records deliveries, optionally failing or stalling every send
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, AlertPayload)>>,
    fail: bool,
    delay: Duration,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
            delay: Duration::ZERO,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
            delay: Duration::ZERO,
        })
    }

    /// Sleep this long before every send
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
            delay,
        })
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, address: &str, payload: &AlertPayload) -> Result<(), NotificationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(NotificationError::DeliveryFailed {
                address: address.to_string(),
                reason: "gateway unavailable".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), payload.clone()));
        Ok(())
    }
}

/// Dollar amount from cents
pub fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Short timings so tests run fast
pub fn test_monitor_config() -> MonitorConfig {
    MonitorConfig {
        tick_interval_secs: 3600,
        history_capacity: 5,
        sampler_timeout_ms: 200,
        max_concurrent_samples: 4,
        first_tick: FirstTick::Immediate,
        shutdown_grace_ms: 500,
    }
}

/// Registry, sampler and recording channels wired into one scheduler
pub struct TestEngine {
    pub registry: Arc<WatchRegistry>,
    pub sampler: Arc<ScriptedSampler>,
    pub email: Arc<RecordingTransport>,
    pub sms: Arc<RecordingTransport>,
    pub dispatcher: Arc<AlertDispatcher>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_parts(ScriptedSampler::new(), RecordingTransport::new(), RecordingTransport::new())
    }

    pub fn with_parts(
        sampler: ScriptedSampler,
        email: Arc<RecordingTransport>,
        sms: Arc<RecordingTransport>,
    ) -> Self {
        let dispatcher = AlertDispatcher::new()
            .with_transport(NotificationChannel::Email, email.clone())
            .with_transport(NotificationChannel::Sms, sms.clone());

        Self {
            registry: Arc::new(WatchRegistry::new(5)),
            sampler: Arc::new(sampler),
            email,
            sms,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Rebuild the dispatcher with a per-delivery time limit
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        let dispatcher = AlertDispatcher::new()
            .with_transport(NotificationChannel::Email, self.email.clone())
            .with_transport(NotificationChannel::Sms, self.sms.clone())
            .with_send_timeout(timeout);
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    pub fn scheduler(&self, config: MonitorConfig) -> MonitorScheduler {
        let sampler: Arc<dyn Sampler> = self.sampler.clone();
        MonitorScheduler::new(self.registry.clone(), sampler, self.dispatcher.clone(), config)
    }

    pub async fn with_email_contact(self) -> Self {
        let contact = UserContact::new(Some("me@example.com".to_string()), None).unwrap();
        self.registry.set_contact(Some(contact)).await;
        self
    }
}

/// Poll until `check` passes or the deadline runs out
pub async fn wait_until<F, Fut>(deadline: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let started = tokio::time::Instant::now();
    while started.elapsed() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
