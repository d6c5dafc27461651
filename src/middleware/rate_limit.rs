use super::ip::client_ip;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

/// A thread-safe rate limiter based on the sliding window algorithm.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter`.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - The maximum number of requests allowed within the time window.
    /// * `window_ms` - The length of the sliding window in milliseconds.
    pub fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Records a request from `ip` if it fits in the window.
    ///
    /// Returns the number of requests still allowed, or the time to wait
    /// before the oldest request leaves the window.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<usize, Duration> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let timestamps = requests.entry(ip).or_default();

        // On time skew, keep the timestamp
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            return Err(retry_after);
        }

        timestamps.push(now);
        Ok(self.max_requests - timestamps.len())
    }

    /// Drops timestamps outside the window and forgets idle clients.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }

    pub async fn tracked_clients(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Periodically prunes `limiter` so the IP map does not grow without bound.
pub async fn cleanup_task(limiter: RateLimiter, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        limiter.cleanup_old_entries().await;
    }
}

/// Per-IP limit for the API, answering 429 with `Retry-After` once exhausted.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let ip = client_ip(req.headers(), remote_ip, state.config.rate_limit.trust_proxy);
    let limiter = &state.rate_limiter;

    let (mut res, remaining) = match limiter.check_rate_limit(ip).await {
        Ok(remaining) => (next.run(req).await, remaining),
        Err(wait) => {
            state.metrics.inc_rate_limited();
            tracing::warn!(%ip, "Rate limit exceeded");
            let retry_after_seconds = wait.as_secs_f64().ceil().max(1.0) as u64;
            (AppError::RateLimited { retry_after_seconds }.into_response(), 0)
        }
    };

    let headers = res.headers_mut();
    headers.insert(HeaderName::from_static("ratelimit-limit"), HeaderValue::from(limiter.max_requests()));
    headers.insert(HeaderName::from_static("ratelimit-remaining"), HeaderValue::from(remaining));
    res
}
