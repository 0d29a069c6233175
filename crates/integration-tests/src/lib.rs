//! Test harness for exercising the coordination engine end to end: an
//! in-memory store, stub upstream clients, and the real handlers and
//! fan-out registries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use lfg_gateway::{GatewayMetrics, RpcHandlers, SubscriptionRegistries};
use lfg_store::Store;
use lfg_types::{ClientInfo, KillProof};
use lfg_upstream::{KillProofProvider, TokenResolver, UpstreamError};

/// Subscriber buffer capacity used by the harness; small enough that
/// overflow behavior is cheap to exercise.
pub const TEST_BUFFER_CAPACITY: usize = 8;

/// Token resolver backed by a fixed token → account table. Unknown tokens
/// resolve to an empty name, which the middleware treats as
/// unauthenticated.
pub struct StubResolver {
    accounts: HashMap<String, String>,
}

impl StubResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            accounts: entries
                .iter()
                .map(|(token, account)| (token.to_string(), account.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl TokenResolver for StubResolver {
    async fn resolve(&self, token: &str) -> Result<String, UpstreamError> {
        Ok(self.accounts.get(token).cloned().unwrap_or_default())
    }
}

/// Kill-proof provider backed by a fixed account → counters table.
#[derive(Default)]
pub struct StubKillProof {
    proofs: HashMap<String, KillProof>,
}

impl StubKillProof {
    pub fn new(entries: &[(&str, KillProof)]) -> Self {
        Self {
            proofs: entries
                .iter()
                .map(|(account, kp)| (account.to_string(), *kp))
                .collect(),
        }
    }
}

#[async_trait]
impl KillProofProvider for StubKillProof {
    async fn kill_proof(&self, account: &str) -> Result<Option<KillProof>, UpstreamError> {
        Ok(self.proofs.get(account).copied())
    }
}

/// Kill-proof provider that always fails, for exercising the best-effort
/// enrichment path.
pub struct FailingKillProof;

#[async_trait]
impl KillProofProvider for FailingKillProof {
    async fn kill_proof(&self, _account: &str) -> Result<Option<KillProof>, UpstreamError> {
        Err(UpstreamError::Upstream("kill-proof api unavailable".into()))
    }
}

/// A caller identity for direct handler invocation.
pub fn client(account: &str) -> ClientInfo {
    ClientInfo {
        account: account.to_string(),
        token: format!("token-{account}"),
    }
}

/// The assembled engine over an in-memory store.
pub struct TestHarness {
    pub store: Arc<Store>,
    pub registries: Arc<SubscriptionRegistries>,
    pub handlers: Arc<RpcHandlers>,
    pub metrics: Arc<GatewayMetrics>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_kill_proof(Arc::new(StubKillProof::default()))
    }

    pub fn with_kill_proof(kill_proof: Arc<dyn KillProofProvider>) -> Self {
        let store = Arc::new(Store::open_memory().expect("open in-memory store"));
        let metrics = Arc::new(GatewayMetrics::new());
        let registries = Arc::new(SubscriptionRegistries::new(
            TEST_BUFFER_CAPACITY,
            Arc::clone(&metrics),
        ));
        let handlers = Arc::new(RpcHandlers::new(
            Arc::clone(&store),
            kill_proof,
            Arc::clone(&registries),
        ));
        Self {
            store,
            registries,
            handlers,
            metrics,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
