//! Account name → aggregated kill-proof counters.
//!
//! The kill-proof API reports raw item lists for the account and each linked
//! account. Aggregation sums `amount` over all of them, name-matched into
//! eleven fixed buckets; every other item name is ignored.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use lfg_types::KillProof;

use crate::{KillProofProvider, TtlCache, UpstreamError};

/// Production kill-proof API endpoint.
pub const DEFAULT_KILLPROOF_API: &str = "https://killproof.me/api/kp";

/// Cache lifetime for aggregated counters.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default, Deserialize)]
struct Item {
    #[serde(default)]
    amount: u32,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct LinkedAccount {
    #[serde(default)]
    killproofs: Vec<Item>,
    #[serde(default)]
    tokens: Vec<Item>,
}

/// The subset of the kill-proof document the aggregation consumes.
#[derive(Debug, Default, Deserialize)]
struct KillProofResponse {
    #[serde(default)]
    killproofs: Vec<Item>,
    #[serde(default)]
    tokens: Vec<Item>,
    #[serde(default)]
    linked: Vec<LinkedAccount>,
}

fn add_item(kp: &mut KillProof, name: &str, amount: u32) {
    match name {
        "Legendary Insight" | "Legendary Divination" => kp.li += amount,
        "Boneskinner Ritual Vial" => kp.bskp += amount,
        "Unstable Cosmic Essence" => kp.ufe += amount,
        "Sabetha Flamethrower Fragment Piece" | "Sabetha's Coffer" => kp.w1 += amount,
        "White Mantle Abomination Crystal" | "Matthias's Coffer" => kp.w2 += amount,
        "Ribbon Scrap" | "Xera's Coffer" => kp.w3 += amount,
        "Fragment of Saul's Burden" | "Deimos's Coffer" => kp.w4 += amount,
        "Dhuum's Token" | "Dhuum's Coffer" => kp.w5 += amount,
        "Qadim's Token" | "Qadim's Coffer" => kp.w6 += amount,
        "Ether Djinn's Token" | "Qadim the Peerless's Coffer" => kp.w7 += amount,
        "Ura's Token" | "Ura's Coffer" => kp.w8 += amount,
        _ => {}
    }
}

fn aggregate(response: &KillProofResponse) -> KillProof {
    let mut kp = KillProof::default();
    let own = response.killproofs.iter().chain(response.tokens.iter());
    let linked = response
        .linked
        .iter()
        .flat_map(|acc| acc.killproofs.iter().chain(acc.tokens.iter()));
    for item in own.chain(linked) {
        add_item(&mut kp, &item.name, item.amount);
    }
    kp
}

/// Client for the kill-proof API.
pub struct KillProofClient {
    client: reqwest::Client,
    base_url: String,
    cache: TtlCache<String, Option<KillProof>>,
}

impl KillProofClient {
    /// Build a client against the production endpoint.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_base_url(DEFAULT_KILLPROOF_API)
    }

    /// Build a client against a custom endpoint (for testing).
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

    async fn fetch(&self, account: &str) -> Result<KillProofResponse, UpstreamError> {
        let url = format!("{}/{}", self.base_url, account);
        self.client
            .get(url)
            .query(&[("lang", "en")])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl KillProofProvider for KillProofClient {
    async fn kill_proof(&self, account: &str) -> Result<Option<KillProof>, UpstreamError> {
        if let Some(cached) = self.cache.get(&account.to_string()) {
            debug!(account, cached = true, "kill-proof lookup");
            return Ok(cached);
        }

        let response = self.fetch(account).await?;
        let kp = aggregate(&response);
        self.cache.insert(account.to_string(), Some(kp));
        debug!(account, cached = false, "kill-proof lookup");
        Ok(Some(kp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_own_killproofs_and_tokens() {
        let response: KillProofResponse = serde_json::from_str(
            r#"{
                "killproofs": [
                    {"name": "Legendary Insight", "amount": 120, "id": 1},
                    {"name": "Legendary Divination", "amount": 30, "id": 2},
                    {"name": "Boneskinner Ritual Vial", "amount": 7, "id": 3}
                ],
                "tokens": [
                    {"name": "Dhuum's Token", "amount": 4, "id": 4},
                    {"name": "Dhuum's Coffer", "amount": 6, "id": 5},
                    {"name": "Ura's Coffer", "amount": 2, "id": 6}
                ]
            }"#,
        )
        .unwrap();

        let kp = aggregate(&response);
        assert_eq!(kp.li, 150);
        assert_eq!(kp.bskp, 7);
        assert_eq!(kp.w5, 10);
        assert_eq!(kp.w8, 2);
        assert_eq!(kp.w1, 0);
    }

    #[test]
    fn linked_accounts_are_included() {
        let response: KillProofResponse = serde_json::from_str(
            r#"{
                "killproofs": [{"name": "Legendary Insight", "amount": 100, "id": 1}],
                "linked": [
                    {"killproofs": [{"name": "Legendary Insight", "amount": 50, "id": 1}],
                     "tokens": [{"name": "Xera's Coffer", "amount": 3, "id": 2}]},
                    {"tokens": [{"name": "Ribbon Scrap", "amount": 2, "id": 3}]}
                ]
            }"#,
        )
        .unwrap();

        let kp = aggregate(&response);
        assert_eq!(kp.li, 150);
        assert_eq!(kp.w3, 5);
    }

    #[test]
    fn unknown_names_contribute_nothing() {
        let response: KillProofResponse = serde_json::from_str(
            r#"{
                "killproofs": [{"name": "Mystic Coin", "amount": 9999, "id": 1}],
                "tokens": [{"name": "Some Future Coffer", "amount": 12, "id": 2}]
            }"#,
        )
        .unwrap();

        assert_eq!(aggregate(&response), KillProof::default());
    }

    #[test]
    fn empty_document_aggregates_to_zeroes() {
        let response: KillProofResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(aggregate(&response), KillProof::default());
    }
}
