//! Client-side rate limiter for Gmail API requests

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

const DEFAULT_REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// Shared limiter for every request the Gmail client makes
#[derive(Clone)]
pub struct GmailRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl GmailRateLimiter {
    /// Zero falls back to the default of 10 requests per second
    pub fn new(requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_REQUESTS_PER_SECOND);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        }
    }

    /// Wait until a request is allowed
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
        debug!("Rate limiter: request allowed");
    }

    /// Check if a request can be made immediately
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for GmailRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_SECOND.get())
    }
}
