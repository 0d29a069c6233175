//! Middleware stack for the gateway.
//!
//! Request flow: CatchPanic → CORS → Auth → RateLimit → handler. The rate
//! limiter runs after authentication because buckets are keyed by account
//! name, and before any authorization check.

pub mod auth;
pub mod cors;
pub mod metrics;
pub mod rate_limit;

pub use auth::AuthLayer;
pub use cors::create_cors_layer;
pub use metrics::GatewayMetrics;
pub use rate_limit::{cleanup_task, RateLimitLayer, RateLimitState};
