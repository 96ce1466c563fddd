//! Injectable processing-window delay.
//!
//! The admission protocol awaits a `DelayStrategy` between its snapshot
//! check and its locked re-validation. Production wires `NoDelay`; tests
//! and load runs use `FixedDelay` or `RandomDelay` to widen the window
//! races have to land in. Same admission code path either way.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

#[async_trait]
pub trait DelayStrategy: Send + Sync {
    async fn pause(&self);
}

pub struct NoDelay;

#[async_trait]
impl DelayStrategy for NoDelay {
    async fn pause(&self) {}
}

pub struct FixedDelay(pub Duration);

#[async_trait]
impl DelayStrategy for FixedDelay {
    async fn pause(&self) {
        tokio::time::sleep(self.0).await;
    }
}

/// Uniform jitter in `[min_ms, max_ms]`.
pub struct RandomDelay {
    min_ms: u64,
    max_ms: u64,
}

impl RandomDelay {
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        assert!(min_ms <= max_ms, "delay bounds inverted");
        Self { min_ms, max_ms }
    }
}

#[async_trait]
impl DelayStrategy for RandomDelay {
    async fn pause(&self) {
        if self.max_ms == 0 {
            return;
        }
        let wait_ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
    }
}
