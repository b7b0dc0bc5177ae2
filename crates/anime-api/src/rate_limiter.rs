//! Per-client request limiting.
//!
//! Each client IP gets its own GCRA bucket from `governor`: a burst of the
//! configured per-minute budget, refilled evenly over the minute. Requests
//! over the limit are rejected with 429 instead of waiting.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::Quota;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

type KeyedLimiter<C> = governor::RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

/// Keyed limiter, one bucket per client
pub struct RateLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
    clock: C,
}

impl RateLimiter {
    /// Allow `max_per_minute` requests per client per minute
    pub fn new(max_per_minute: u32) -> Self {
        Self::with_clock(max_per_minute, DefaultClock::default())
    }
}

impl<C: Clock + Clone> RateLimiter<C> {
    fn with_clock(max_per_minute: u32, clock: C) -> Self {
        let burst = NonZeroU32::new(max_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: governor::RateLimiter::dashmap_with_clock(
                Quota::per_minute(burst),
                clock.clone(),
            ),
            clock,
        }
    }

    /// Record a request for `key` if it is within the limit
    ///
    /// Returns `Err` with the time until the client may send again.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.limiter
            .check_key(&key.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drop buckets of clients that are back to a full budget
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Middleware rejecting clients over their per-minute budget
pub async fn limit_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_deref() else {
        return next.run(request).await;
    };

    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            debug!(client = %key, retry_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
            AppError::too_many_requests("Too many requests")
                .with_detail(format!("retry in {}s", retry_after.as_secs().max(1)))
                .into_response()
        }
    }
}
