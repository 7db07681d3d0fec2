//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Default inbound frames per second accepted from one connection
pub const RELAY_RATE_LIMIT: u32 = 60;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct PeerRateLimiter {
    inbound_limiter: Arc<Limiter>,
}

impl PeerRateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            inbound_limiter: create_limiter(per_second),
        }
    }

    /// Check if an inbound frame is allowed (returns true if allowed)
    pub fn check_inbound(&self) -> bool {
        self.inbound_limiter.check().is_ok()
    }
}

impl Default for PeerRateLimiter {
    fn default() -> Self {
        Self::new(RELAY_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_refused() {
        let limiter = PeerRateLimiter::new(5);
        let allowed = (0..20).filter(|_| limiter.check_inbound()).count();
        assert!(allowed >= 5 && allowed < 20);
    }
}
