//! Upstream HTTP clients.
//!
//! Two slow external APIs feed the board:
//!
//! - the account API turns an opaque bearer token into a stable account name
//!   ([`AccountResolver`]);
//! - the kill-proof API turns an account name into aggregated achievement
//!   counters ([`KillProofClient`]).
//!
//! Both sit behind TTL caches so a burst of calls cannot flood the upstream.
//! The gateway consumes them through the [`TokenResolver`] and
//! [`KillProofProvider`] traits, which keeps the engine testable without
//! network access.

pub mod account;
pub mod cache;
pub mod killproof;

pub use account::AccountResolver;
pub use cache::TtlCache;
pub use killproof::KillProofClient;

use async_trait::async_trait;
use lfg_types::KillProof;

/// Errors from the upstream clients.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Resolves a bearer token to a stable account name.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    /// Resolve `token` to an account name. An empty name means the token is
    /// valid JSON-wise but carries no account; callers treat that as
    /// unauthenticated.
    async fn resolve(&self, token: &str) -> Result<String, UpstreamError>;
}

/// Produces aggregated kill-proof counters for an account.
#[async_trait]
pub trait KillProofProvider: Send + Sync {
    /// Fetch counters for `account`. `Ok(None)` means the account has no
    /// kill-proof record; errors are surfaced so callers can decide to
    /// swallow them.
    async fn kill_proof(&self, account: &str) -> Result<Option<KillProof>, UpstreamError>;
}
