use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Watch registry errors (caller errors, never retried)
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Snapshot persistence errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if the error was caused by bad caller input
    pub fn is_caller_error(&self) -> bool {
        matches!(self, AppError::Registry(_) | AppError::Validation(_))
    }
}

/// Watch registry error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The source URL is already tracked (exact, case-sensitive match)
    #[error("URL is already being tracked: {0}")]
    DuplicateUrl(String),

    /// Target price must be strictly positive
    #[error("Target price must be a positive number, got {0}")]
    InvalidTargetPrice(Decimal),

    /// No item with this id
    #[error("Watched item not found: {0}")]
    NotFound(Uuid),

    /// Invalid input (empty name, empty URL, empty contact)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Price sampling errors. Every variant is transient: the item is marked
/// `Error` for the tick and sampled again on the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("Transient fetch error: {0}")]
    Transient(String),

    #[error("Sampler timed out after {0}ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for SampleError {
    fn from(err: reqwest::Error) -> Self {
        SampleError::Transient(err.to_string())
    }
}

/// Notification delivery errors (per channel, never fatal to a tick)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Delivery to {address} failed: {reason}")]
    DeliveryFailed { address: String, reason: String },

    #[error("No transport registered for channel {0}")]
    NoTransport(String),

    #[error("Delivery timed out after {0}ms")]
    Timeout(u64),
}

/// Snapshot persistence errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt snapshot data: {0}")]
    CorruptData(String),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotError::CorruptData(err.to_string())
    }
}

/// Convenience function to convert Option<T> to Result<T, RegistryError>
pub fn option_to_result<T>(opt: Option<T>, id: Uuid) -> Result<T, RegistryError> {
    opt.ok_or(RegistryError::NotFound(id))
}
