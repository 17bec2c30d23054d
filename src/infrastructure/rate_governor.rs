//! Politeness pacing for origin servers
//!
//! Two gates: one acquired before every network operation, a slower one
//! acquired before moving to the next listing page. Both admit one operation
//! per configured period (burst of one), so the first acquisition is immediate
//! and later ones wait out the remainder of the period.

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::time::Duration;

use super::config::PacingConfig;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate-limiting gate shared by every component that touches the network.
pub struct RateGovernor {
    request_gate: Option<DirectLimiter>,
    page_gate: Option<DirectLimiter>,
    request_interval: Duration,
    page_interval: Duration,
}

impl RateGovernor {
    pub fn new(request_interval: Duration, page_interval: Duration) -> Self {
        Self {
            request_gate: Self::gate(request_interval),
            page_gate: Self::gate(page_interval),
            request_interval,
            page_interval,
        }
    }

    pub fn from_config(config: &PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.request_interval_ms),
            Duration::from_millis(config.page_interval_ms),
        )
    }

    /// A governor that never waits.
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    fn gate(period: Duration) -> Option<DirectLimiter> {
        // A zero period means "no pacing"; governor rejects it anyway.
        Quota::with_period(period).map(RateLimiter::direct)
    }

    /// Wait until the next network operation may start.
    pub async fn acquire(&self) {
        if let Some(gate) = &self.request_gate {
            gate.until_ready().await;
        }
    }

    /// Wait until the next listing page may be requested.
    pub async fn acquire_page(&self) {
        if let Some(gate) = &self.page_gate {
            gate.until_ready().await;
        }
    }

    pub fn request_interval(&self) -> Duration {
        self.request_interval
    }

    pub fn page_interval(&self) -> Duration {
        self.page_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_enforces_minimum_spacing() {
        let governor = RateGovernor::new(Duration::from_millis(50), Duration::from_millis(100));
        let start = Instant::now();

        governor.acquire().await;
        governor.acquire().await;
        governor.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let governor = RateGovernor::new(Duration::from_secs(10), Duration::from_secs(10));
        let start = Instant::now();

        governor.acquire().await;
        governor.acquire_page().await;

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unthrottled_never_waits() {
        let governor = RateGovernor::unthrottled();
        let start = Instant::now();
        for _ in 0..100 {
            governor.acquire().await;
            governor.acquire_page().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(governor.request_interval(), Duration::ZERO);
    }
}
