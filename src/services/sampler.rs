use crate::config::{SamplerConfig, SamplerKind};
use crate::error::{AppError, AppResult, SampleError};
use crate::models::WatchedItem;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Source of the current price for a watched item
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Fetch the item's current price. Every error is treated as transient.
    async fn sample(&self, item: &WatchedItem) -> Result<Decimal, SampleError>;
}

/// Random-walk price simulator.
///
/// Walks from the item's committed `current_price`; an unpriced item gets a
/// first price drawn from 10 000..25 000. Each step moves by up to ±5%, with
/// a 10% chance of a 10-30% drop instead. Holds no per-item state.
pub struct SimulatedSampler {
    rng: Mutex<StdRng>,
    failure_rate: f64,
}

impl SimulatedSampler {
    /// Create a simulator with a fixed seed for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failure_rate: 0.0,
        }
    }

    /// Create a simulator seeded from system entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            failure_rate: 0.0,
        }
    }

    /// Fail this fraction of samples (0.0..=1.0) with a transient error
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    fn next_price(&self, item: &WatchedItem) -> Result<Decimal, SampleError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SampleError::Transient("simulator state poisoned".to_string()))?;

        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return Err(SampleError::Transient(format!(
                "simulated fetch failure for {}",
                item.source_url
            )));
        }

        let next = match item.current_price {
            Some(price) => {
                let factor: f64 = if rng.gen_bool(0.1) {
                    1.0 - rng.gen_range(0.1..0.3)
                } else {
                    1.0 + rng.gen_range(-0.05..0.05)
                };
                let factor = Decimal::from_f64(factor)
                    .ok_or_else(|| SampleError::Transient("invalid simulated factor".to_string()))?;
                price * factor
            }
            None => Decimal::from_f64(rng.gen_range(10_000.0..25_000.0))
                .ok_or_else(|| SampleError::Transient("invalid simulated price".to_string()))?,
        }
        .round_dp(2);

        Ok(next)
    }
}

#[async_trait]
impl Sampler for SimulatedSampler {
    async fn sample(&self, item: &WatchedItem) -> Result<Decimal, SampleError> {
        let price = self.next_price(item)?;
        debug!(item_id = %item.id, %price, "Simulated sample");
        Ok(price)
    }
}

/// JSON body expected from a price endpoint
#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

/// Fetches `{"price": ...}` from the item's source URL
pub struct HttpSampler {
    client: reqwest::Client,
}

impl HttpSampler {
    pub fn new(request_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("pricewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Sampler for HttpSampler {
    async fn sample(&self, item: &WatchedItem) -> Result<Decimal, SampleError> {
        let response = self
            .client
            .get(&item.source_url)
            .send()
            .await?
            .error_for_status()?;

        let body: PriceResponse = response.json().await?;
        debug!(item_id = %item.id, price = %body.price, "Fetched price");
        Ok(body.price)
    }
}

/// Build the sampler selected in configuration
pub fn build_sampler(config: &SamplerConfig, request_timeout: Duration) -> AppResult<Arc<dyn Sampler>> {
    let sampler: Arc<dyn Sampler> = match config.kind {
        SamplerKind::Simulated => {
            let simulated = match config.seed {
                Some(seed) => SimulatedSampler::seeded(seed),
                None => SimulatedSampler::from_entropy(),
            };
            Arc::new(simulated.with_failure_rate(config.failure_rate))
        }
        SamplerKind::Http => Arc::new(HttpSampler::new(request_timeout)?),
    };
    Ok(sampler)
}
