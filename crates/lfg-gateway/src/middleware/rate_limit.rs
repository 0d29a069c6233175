//! Rate limiting middleware using a token bucket per account.
//!
//! Buckets are created lazily on first use and evicted by a background sweep
//! once idle for the cleanup interval. Runs after authentication: the key is
//! the resolved account name, so a request with no principal is rejected as
//! invalid.

use axum::{
    body::Body,
    http::Request,
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

use lfg_types::ClientInfo;

use crate::domain::config::RateLimitConfig;
use crate::domain::error::RpcError;
use crate::middleware::GatewayMetrics;

/// Token bucket for one account.
struct TokenBucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    /// Last consumption attempt (for eviction).
    last_access: Instant,
}

impl TokenBucket {
    fn new(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
            last_access: Instant::now(),
        }
    }

    /// Non-blocking: true iff a token was consumed.
    fn allow(&mut self) -> bool {
        self.last_access = Instant::now();
        self.limiter.check().is_ok()
    }
}

/// Rate limiter state shared across requests.
pub struct RateLimitState {
    buckets: DashMap<String, TokenBucket>,
    quota: Quota,
}

impl RateLimitState {
    pub fn new(config: &RateLimitConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second)
            .unwrap_or_else(|| NonZeroU32::new(1).unwrap());
        let burst = NonZeroU32::new(config.burst).unwrap_or_else(|| NonZeroU32::new(20).unwrap());
        Self {
            buckets: DashMap::new(),
            quota: Quota::per_second(rate).allow_burst(burst),
        }
    }

    /// Consume a token for `account`, creating a fresh bucket if this
    /// principal is unknown.
    pub fn allow(&self, account: &str) -> bool {
        let mut bucket = self
            .buckets
            .entry(account.to_string())
            .or_insert_with(|| {
                debug!(account, "creating rate limit bucket");
                TokenBucket::new(self.quota)
            });
        bucket.allow()
    }

    /// Evict buckets idle longer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets.retain(|account, bucket| {
            let age = now.duration_since(bucket.last_access);
            if age > max_age {
                debug!(account, age_secs = age.as_secs(), "evicting idle rate limit bucket");
                false
            } else {
                true
            }
        });
    }

    /// Number of tracked accounts.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Rate limit layer.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl RateLimitLayer {
    pub fn new(config: &RateLimitConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            metrics,
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Rate limit service.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let account = req
                .extensions()
                .get::<ClientInfo>()
                .map(|client| client.account.clone());

            let account = match account {
                Some(account) => account,
                None => {
                    return Ok(error_response(RpcError::invalid_params(
                        "missing client identity",
                    )));
                }
            };

            if state.allow(&account) {
                inner.call(req).await
            } else {
                metrics.record_rate_limited();
                warn!(account = %account, "rate limit exceeded");
                Ok(error_response(RpcError::resource_exhausted(format!(
                    "rate limit exceeded for {account}"
                ))))
            }
        })
    }
}

fn error_response(err: RpcError) -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "error": err,
        "id": null
    });

    let mut response = Response::new(Body::from(serde_json::to_vec(&body).unwrap_or_default()));
    *response.status_mut() = err.http_status();
    response
        .headers_mut()
        .insert("Content-Type", "application/json".parse().unwrap());
    response
}

/// Background task evicting idle buckets every `interval`; a bucket counts
/// as idle once untouched for that same interval. Exits when the shutdown
/// signal flips.
pub async fn cleanup_task(
    state: Arc<RateLimitState>,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => state.cleanup(interval),
            _ = shutdown.wait_for(|stop| *stop) => return,
        }
    }
}
