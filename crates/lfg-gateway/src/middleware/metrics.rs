//! Gateway counters, exported as JSON on the metrics listener.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters. All atomics; cheap to bump from any task.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,
    pub rate_limited_total: AtomicU64,

    /// Live subscription sessions (gauge).
    pub ws_sessions: AtomicU64,
    pub ws_subscriptions_total: AtomicU64,

    pub updates_pushed_total: AtomicU64,
    pub updates_dropped_total: AtomicU64,

    pub reaped_groups_total: AtomicU64,
    pub reaped_applications_total: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_open(&self) {
        self.ws_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_close(&self) {
        self.ws_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_subscription(&self) {
        self.ws_subscriptions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_pushed(&self) {
        self.updates_pushed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_dropped(&self) {
        self.updates_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reaped(&self, groups: u64, applications: u64) {
        self.reaped_groups_total.fetch_add(groups, Ordering::Relaxed);
        self.reaped_applications_total
            .fetch_add(applications, Ordering::Relaxed);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
                "rate_limited": self.rate_limited_total.load(Ordering::Relaxed),
            },
            "subscriptions": {
                "sessions": self.ws_sessions.load(Ordering::Relaxed),
                "total": self.ws_subscriptions_total.load(Ordering::Relaxed),
                "updates_pushed": self.updates_pushed_total.load(Ordering::Relaxed),
                "updates_dropped": self.updates_dropped_total.load(Ordering::Relaxed),
            },
            "reaper": {
                "groups": self.reaped_groups_total.load(Ordering::Relaxed),
                "applications": self.reaped_applications_total.load(Ordering::Relaxed),
            },
        })
    }
}
