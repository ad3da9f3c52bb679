use crate::error::{AppError, AppResult};
use crate::models::{UserContact, DEFAULT_HISTORY_CAPACITY};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted tick interval (31 days)
pub const MAX_TICK_INTERVAL_SECS: u64 = 31 * 24 * 60 * 60;

/// When the first tick fires after the scheduler starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstTick {
    /// Sample as soon as the scheduler starts
    #[default]
    Immediate,
    /// Wait one full interval first
    AfterInterval,
}

/// Monitoring loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tick_interval_secs: u64,
    pub history_capacity: usize,
    pub sampler_timeout_ms: u64,
    pub max_concurrent_samples: usize,
    pub first_tick: FirstTick,
    pub shutdown_grace_ms: u64,
}

impl MonitorConfig {
    /// Get tick interval as Duration, capped at [`MAX_TICK_INTERVAL_SECS`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.min(MAX_TICK_INTERVAL_SECS))
    }

    /// Get per-item sampler timeout as Duration
    pub fn sampler_timeout(&self) -> Duration {
        Duration::from_millis(self.sampler_timeout_ms)
    }

    /// Get shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 1800, // 30 minutes
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            sampler_timeout_ms: 10_000,
            max_concurrent_samples: 4,
            first_tick: FirstTick::Immediate,
            shutdown_grace_ms: 5_000,
        }
    }
}

/// External alert channels and the contact they deliver to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub email_enabled: bool,
    pub sms_enabled: bool,
    /// Upper bound on a single channel delivery
    pub send_timeout_ms: u64,
    /// Seeds the contact when the snapshot has none
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NotificationConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Contact built from the configured addresses, if any
    pub fn seed_contact(&self) -> AppResult<Option<UserContact>> {
        if self.email.is_none() && self.phone.is_none() {
            return Ok(None);
        }
        UserContact::new(self.email.clone(), self.phone.clone())
            .map(Some)
            .map_err(AppError::Config)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            email_enabled: true,
            sms_enabled: true,
            send_timeout_ms: 10_000,
            email: None,
            phone: None,
        }
    }
}

/// Snapshot file location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tracked_products.json"),
        }
    }
}

/// Which price source to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Simulated,
    Http,
}

/// Price source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub kind: SamplerKind,
    /// Seed for the simulated sampler; random when absent
    pub seed: Option<u64>,
    /// Fraction of simulated samples that fail
    pub failure_rate: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            kind: SamplerKind::Simulated,
            seed: None,
            failure_rate: 0.0,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub monitor: MonitorConfig,
    pub notifications: NotificationConfig,
    pub snapshot: SnapshotConfig,
    pub sampler: SamplerConfig,
}

impl AppConfig {
    /// Parse a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration: the file if given, then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `LOG_LEVEL` and `PRICEWATCH_SNAPSHOT` override the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Ok(path) = env::var("PRICEWATCH_SNAPSHOT") {
            self.snapshot.path = PathBuf::from(path);
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> AppResult<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log_level: {}. Must be one of: {:?}",
                self.log_level, valid_log_levels
            )));
        }

        if self.monitor.tick_interval_secs == 0 {
            return Err(AppError::Config("monitor.tick_interval_secs must be greater than 0".to_string()));
        }
        if self.monitor.tick_interval_secs > MAX_TICK_INTERVAL_SECS {
            return Err(AppError::Config(format!(
                "monitor.tick_interval_secs must be at most {}",
                MAX_TICK_INTERVAL_SECS
            )));
        }
        if self.monitor.history_capacity == 0 {
            return Err(AppError::Config("monitor.history_capacity must be greater than 0".to_string()));
        }
        if self.monitor.sampler_timeout_ms == 0 {
            return Err(AppError::Config("monitor.sampler_timeout_ms must be greater than 0".to_string()));
        }
        if self.monitor.max_concurrent_samples == 0 {
            return Err(AppError::Config(
                "monitor.max_concurrent_samples must be greater than 0".to_string(),
            ));
        }
        if self.notifications.send_timeout_ms == 0 {
            return Err(AppError::Config("notifications.send_timeout_ms must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.sampler.failure_rate) {
            return Err(AppError::Config("sampler.failure_rate must be between 0 and 1".to_string()));
        }

        self.notifications.seed_contact()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            monitor: MonitorConfig::default(),
            notifications: NotificationConfig::default(),
            snapshot: SnapshotConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}
