//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// RPC listener.
    pub http: HttpConfig,
    /// Metrics listener.
    pub metrics: MetricsConfig,
    /// Subscription sessions.
    pub websocket: WebSocketConfig,
    /// Per-account throttling.
    pub rate_limit: RateLimitConfig,
    /// Stale-entry collection.
    pub reaper: ReaperConfig,
    /// Expose the supported-method registry at `GET /methods`.
    pub enable_reflection: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            metrics: MetricsConfig::default(),
            websocket: WebSocketConfig::default(),
            rate_limit: RateLimitConfig::default(),
            reaper: ReaperConfig::default(),
            enable_reflection: false,
        }
    }
}

impl GatewayConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_second cannot be 0".into(),
            ));
        }
        if self.rate_limit.burst == 0 {
            return Err(ConfigError::InvalidRateLimit("burst cannot be 0".into()));
        }
        if self.websocket.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "websocket buffer_capacity cannot be 0".into(),
            ));
        }
        if self.reaper.entry_ttl_secs == 0 {
            return Err(ConfigError::Invalid("reaper entry ttl cannot be 0".into()));
        }
        if self.reaper.interval_secs == 0 {
            return Err(ConfigError::Invalid("reaper interval cannot be 0".into()));
        }
        if self.metrics.enabled && self.metrics.port == self.http.port {
            return Err(ConfigError::DuplicatePorts);
        }
        Ok(())
    }

    /// RPC listener bind address.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Metrics listener bind address (same host as the RPC listener).
    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.metrics.port)
    }
}

/// RPC listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address. Loopback by default; hosted deployments bind all
    /// interfaces.
    pub host: IpAddr,
    /// Port (default: 5001).
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5001,
        }
    }
}

/// Metrics listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Port (default: 9100).
    pub port: u16,
    /// Enable the listener.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: 9100,
            enabled: true,
        }
    }
}

/// Subscription session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Maximum concurrent subscription sessions.
    pub max_sessions: usize,
    /// Per-subscriber update buffer capacity.
    pub buffer_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            buffer_capacity: 100,
        }
    }
}

/// Per-account rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens refilled per second per account.
    pub requests_per_second: u32,
    /// Token bucket capacity.
    pub burst: u32,
    /// Eviction cadence for idle buckets, seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            burst: 20,
            cleanup_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Reaper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Rows older than this are collected, seconds.
    pub entry_ttl_secs: u64,
    /// Sweep cadence, seconds.
    pub interval_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            entry_ttl_secs: 2 * 60 * 60,
            interval_secs: 5 * 60,
        }
    }
}

impl ReaperConfig {
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_ttl_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("RPC and metrics listeners share a port")]
    DuplicatePorts,
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
