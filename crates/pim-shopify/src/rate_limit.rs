//! Shared admission gate for Admin API calls.
//!
//! Shopify meters REST traffic with a leaky bucket per store (40 requests of
//! burst, refilled at 2 per second on standard plans). Every request issued by
//! a [`crate::ShopifyClient`] first waits on one [`RequestGate`], which is
//! shared by every concurrent product worker.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Direct (unkeyed) rate limiter shared across all callers of one store.
pub struct RequestGate {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate")
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

impl RequestGate {
    /// Admits `burst` requests at once, then one every `1 / refill_per_sec`
    /// seconds.
    ///
    /// A `burst` of zero is treated as one; a non-positive or non-finite
    /// rate disables waiting entirely.
    #[must_use]
    pub fn new(burst: u32, refill_per_sec: f64) -> Self {
        Self {
            limiter: quota(burst, refill_per_sec).map(RateLimiter::direct),
        }
    }

    /// A gate that never delays. Used by tests and one-off admin commands.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    /// Waits until the caller may issue one request.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                tracing::debug!("request gate saturated, delaying call");
                limiter.until_ready().await;
            }
        }
    }

    /// Admits one request if a slot is free right now.
    pub(crate) fn try_admit(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}

fn quota(burst: u32, refill_per_sec: f64) -> Option<Quota> {
    if !refill_per_sec.is_finite() || refill_per_sec <= 0.0 {
        return None;
    }
    let burst = NonZeroU32::new(burst.max(1))?;
    let period = Duration::from_secs_f64(1.0 / refill_per_sec);
    Quota::with_period(period).map(|q| q.allow_burst(burst))
}
