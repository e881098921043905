//! Per-client submission rate limiting
//!
//! Limited requests still get HTTP 200: the client only looks at the JSON
//! body, and "limited" is part of the terminal vocabulary it understands.

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::types::SubmitResponse;

/// Token bucket for one client
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    rate: f64,
    capacity: u32,
}

impl TokenBucket {
    fn new(rate: f64, capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
            rate,
            capacity,
        }
    }

    /// Take a token, or return how many whole seconds until one is available
    fn try_consume(&mut self) -> Option<u64> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            Some((((1.0 - self.tokens) / self.rate).ceil() as u64).max(1))
        }
    }
}

/// Rate limiter with per-IP buckets
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Returns the retry delay in seconds if `ip` must wait
    pub async fn check(&self, ip: IpAddr) -> Option<u64> {
        if self.config.exempt_ips.contains(&ip) {
            return None;
        }

        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| {
                // Config::validate rejects zeros; direct construction gets the floor
                TokenBucket::new(
                    self.config.requests_per_second.max(1) as f64,
                    self.config.burst_size.max(1),
                )
            })
            .try_consume()
    }
}

/// Message returned to a limited client
pub fn rate_limited_message(retry_after: u64) -> String {
    format!("Rate limited. Try again in {retry_after} seconds.")
}

/// Rate limiting middleware for the submission routes
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()).await {
        None => next.run(req).await,
        Some(retry_after) => {
            tracing::debug!(client = %addr.ip(), retry_after, "submission rate limited");
            Json(SubmitResponse::rejected(rate_limited_message(retry_after))).into_response()
        }
    }
}
