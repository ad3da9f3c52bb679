use crate::config::NotificationConfig;
use crate::error::NotificationError;
use crate::models::{AlertPayload, NotificationChannel, UserContact};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{info, warn};

/// Channels in the order they are attempted
const CHANNELS: [NotificationChannel; 2] = [NotificationChannel::Email, NotificationChannel::Sms];

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers an alert to one external address
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, address: &str, payload: &AlertPayload) -> Result<(), NotificationError>;
}

/// Transport that only writes the alert to the log.
///
/// Stands in for real email/SMS delivery.
pub struct LogTransport {
    channel: NotificationChannel,
}

impl LogTransport {
    pub fn new(channel: NotificationChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, address: &str, payload: &AlertPayload) -> Result<(), NotificationError> {
        info!(
            channel = %self.channel,
            item_id = %payload.item_id,
            "Alert for {} -> {}: {}",
            payload.name,
            address,
            payload.message().replace('\n', " | ")
        );
        Ok(())
    }
}

/// What happened when an alert was dispatched
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub payload: AlertPayload,
    /// Channels a delivery was attempted on
    pub attempted: Vec<NotificationChannel>,
    pub delivered: Vec<NotificationChannel>,
    pub failures: Vec<(NotificationChannel, NotificationError)>,
    /// In-process subscribers that received the alert
    pub local_receivers: usize,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fans an alert out to in-process subscribers and configured channels
pub struct AlertDispatcher {
    transports: HashMap<NotificationChannel, Arc<dyn NotificationTransport>>,
    enabled: HashSet<NotificationChannel>,
    tx: broadcast::Sender<AlertPayload>,
    send_timeout: Duration,
}

impl AlertDispatcher {
    /// Create a dispatcher with no external channels enabled
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);

        Self {
            transports: HashMap::new(),
            enabled: HashSet::new(),
            tx,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Create a dispatcher with the configured channels backed by [`LogTransport`]
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut dispatcher = Self::new().with_send_timeout(config.send_timeout());
        if config.email_enabled {
            dispatcher = dispatcher.with_transport(
                NotificationChannel::Email,
                Arc::new(LogTransport::new(NotificationChannel::Email)),
            );
        }
        if config.sms_enabled {
            dispatcher = dispatcher.with_transport(
                NotificationChannel::Sms,
                Arc::new(LogTransport::new(NotificationChannel::Sms)),
            );
        }
        dispatcher
    }

    /// Enable a channel and register its transport
    pub fn with_transport(
        mut self,
        channel: NotificationChannel,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        self.transports.insert(channel, transport);
        self.enabled.insert(channel);
        self
    }

    /// Give up on a single delivery after `timeout`
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Enable a channel without a transport; attempts on it are reported as failures
    pub fn with_enabled_channel(mut self, channel: NotificationChannel) -> Self {
        self.enabled.insert(channel);
        self
    }

    /// Receive every alert raised in this process
    pub fn subscribe(&self) -> broadcast::Receiver<AlertPayload> {
        self.tx.subscribe()
    }

    pub fn is_enabled(&self, channel: NotificationChannel) -> bool {
        self.enabled.contains(&channel)
    }

    /// Dispatch one alert.
    ///
    /// The in-process alert always fires. Each enabled channel with an
    /// address in `contact` is attempted independently; failures are logged
    /// and reported, never returned as an error.
    pub async fn notify(&self, payload: AlertPayload, contact: Option<&UserContact>) -> DispatchReport {
        // send only fails when nobody is subscribed
        let local_receivers = self.tx.send(payload.clone()).unwrap_or(0);

        let targets: Vec<(NotificationChannel, String)> = CHANNELS
            .iter()
            .filter(|channel| self.enabled.contains(*channel))
            .filter_map(|channel| {
                contact
                    .and_then(|c| c.address_for(*channel))
                    .map(|address| (*channel, address.to_string()))
            })
            .collect();

        let send_timeout = self.send_timeout;
        let attempts = targets.iter().map(|(channel, address)| {
            let transport = self.transports.get(channel).cloned();
            let payload = &payload;
            async move {
                let result = match transport {
                    Some(transport) => time::timeout(send_timeout, transport.send(address, payload))
                        .await
                        .unwrap_or_else(|_| {
                            Err(NotificationError::Timeout(send_timeout.as_millis() as u64))
                        }),
                    None => Err(NotificationError::NoTransport(channel.to_string())),
                };
                (*channel, result)
            }
        });

        let mut report = DispatchReport {
            payload: payload.clone(),
            attempted: targets.iter().map(|(channel, _)| *channel).collect(),
            delivered: Vec::new(),
            failures: Vec::new(),
            local_receivers,
        };

        for (channel, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.delivered.push(channel),
                Err(e) => {
                    warn!(
                        channel = %channel,
                        item_id = %payload.item_id,
                        "Alert delivery failed: {}",
                        e
                    );
                    report.failures.push((channel, e));
                }
            }
        }

        info!(
            item_id = %payload.item_id,
            attempted = report.attempted.len(),
            delivered = report.delivered.len(),
            "Price alert raised for {}",
            payload.name
        );
        report
    }
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
