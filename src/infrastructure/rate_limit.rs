//! Cost-weighted request budget
//!
//! Wraps a direct `governor` token bucket behind a cost API matching the
//! platform's published request cost model (Shopify REST: a 40-call bucket
//! leaking 2 calls per second). Callers wait for budget *before* issuing a
//! mutation instead of firing and handling the rejection, which keeps
//! retries for real failures only.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

/// Shared token bucket for outbound platform calls. This is the single
/// synchronized resource between concurrent import tasks.
pub struct RequestBudget {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    burst: u32,
}

impl RequestBudget {
    /// Budget replenishing `per_second` requests with a bucket of `burst`.
    /// Values are clamped to at least 1.
    pub fn new(per_second: u32, burst: u32) -> Self {
        let per_second = NonZeroU32::new(per_second.max(1)).expect("clamped above zero");
        let burst = NonZeroU32::new(burst.max(1)).expect("clamped above zero");
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            limiter: RateLimiter::direct(quota),
            burst: burst.get(),
        }
    }

    /// Wait until `cost` cells of budget are available. Costs above the
    /// bucket size are clamped; they could otherwise never be satisfied.
    pub async fn acquire(&self, cost: u32) {
        let cost = cost.clamp(1, self.burst);
        let cells = NonZeroU32::new(cost).expect("clamped above zero");
        // Cost is clamped to the bucket size, so capacity is sufficient.
        self.limiter
            .until_n_ready(cells)
            .await
            .expect("request cost exceeds bucket size");
    }
}
