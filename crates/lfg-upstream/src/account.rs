//! Bearer token → account name resolution against the account API.
//!
//! Both successful resolutions and failures are cached for an hour, so a
//! storm of invalid tokens cannot flood the upstream.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{TokenResolver, TtlCache, UpstreamError};

/// Production account API endpoint.
pub const DEFAULT_ACCOUNT_API: &str = "https://api.guildwars2.com/v2/account";

/// Cache lifetime for resolved tokens, hits and misses alike.
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Account document returned by the API. Only `name` is consumed.
#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    name: String,
}

/// Cached outcome of one resolution. Errors are stored as their display
/// string; the original error types are not `Clone`.
type CachedOutcome = Result<String, String>;

/// Resolver for the account API.
pub struct AccountResolver {
    client: reqwest::Client,
    base_url: String,
    cache: TtlCache<String, CachedOutcome>,
}

impl AccountResolver {
    /// Build a resolver against the production endpoint.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_base_url(DEFAULT_ACCOUNT_API)
    }

    /// Build a resolver against a custom endpoint (for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            cache: TtlCache::new(CACHE_TTL),
        })
    }

    async fn fetch(&self, token: &str) -> Result<String, UpstreamError> {
        let account: Account = self
            .client
            .get(&self.base_url)
            .query(&[("access_token", token)])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(account.name)
    }
}

#[async_trait]
impl TokenResolver for AccountResolver {
    async fn resolve(&self, token: &str) -> Result<String, UpstreamError> {
        if let Some(outcome) = self.cache.get(&token.to_string()) {
            debug!(cached = true, "account token resolved");
            return outcome.map_err(UpstreamError::Upstream);
        }

        match self.fetch(token).await {
            Ok(name) => {
                self.cache.insert(token.to_string(), Ok(name.clone()));
                debug!(cached = false, "account token resolved");
                Ok(name)
            }
            Err(err) => {
                self.cache.insert(token.to_string(), Err(err.to_string()));
                Err(err)
            }
        }
    }
}
