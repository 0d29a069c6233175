//! Core entities and the tagged update unions pushed to subscribers.

use serde::{Deserialize, Serialize};

/// A party advertisement on the board.
///
/// At most one active group exists per creator account; the engine enforces
/// this before every insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Server-assigned opaque id.
    pub id: String,
    /// Account name of the owner.
    pub creator: String,
    /// Free-text description of the party being formed.
    pub title: String,
    /// Kill-proof requirement id, if the group demands one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_proof_id: Option<String>,
    /// Minimum kill-proof count demanded from applicants.
    #[serde(default)]
    pub kill_proof_minimum: u32,
    /// Creation instant, epoch seconds.
    pub created_at_sec: i64,
    /// Last update or heartbeat instant, epoch seconds. Never earlier than
    /// `created_at_sec`.
    pub updated_at_sec: i64,
}

/// A request by an account to join a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Server-assigned opaque id.
    pub id: String,
    /// The group applied to.
    pub group_id: String,
    /// Account name of the applicant. Distinct from the group creator.
    pub applicant: String,
    /// Creation instant, epoch seconds.
    pub created_at_sec: i64,
    /// Last heartbeat instant, epoch seconds.
    pub updated_at_sec: i64,
    /// Aggregated kill-proof counters, attached best-effort on wire
    /// responses. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_proof: Option<KillProof>,
}

/// Aggregated achievement counters for one account and its linked accounts.
///
/// Derived from the kill-proof API by name-matching items into fixed
/// buckets; see the upstream client for the mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillProof {
    pub li: u32,
    pub bskp: u32,
    pub ufe: u32,
    pub w1: u32,
    pub w2: u32,
    pub w3: u32,
    pub w4: u32,
    pub w5: u32,
    pub w6: u32,
    pub w7: u32,
    pub w8: u32,
}

/// The authenticated principal attached to a call or stream.
///
/// Lives for exactly one RPC call or one subscription session; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Stable account name resolved from the bearer token.
    pub account: String,
    /// The raw bearer token the client presented.
    pub token: String,
}

/// Update pushed to group-board subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupsUpdate {
    NewGroup(Group),
    UpdatedGroup(Group),
    RemovedGroupId(String),
}

/// Update pushed to application subscribers (group creators and applicants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplicationUpdate {
    NewApplication(Application),
    UpdatedApplication(Application),
    RemovedApplicationId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> Group {
        Group {
            id: "g-1".into(),
            creator: "Creator.1234".into(),
            title: "weekly clears".into(),
            kill_proof_id: Some("li".into()),
            kill_proof_minimum: 150,
            created_at_sec: 1_700_000_000,
            updated_at_sec: 1_700_000_000,
        }
    }

    #[test]
    fn group_update_uses_camel_case_tags() {
        let update = GroupsUpdate::NewGroup(sample_group());
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("newGroup").is_some());
        assert_eq!(json["newGroup"]["killProofMinimum"], 150);
    }

    #[test]
    fn removed_group_id_round_trips() {
        let update = GroupsUpdate::RemovedGroupId("g-1".into());
        let json = serde_json::to_string(&update).unwrap();
        let back: GroupsUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn application_omits_absent_kill_proof() {
        let app = Application {
            id: "a-1".into(),
            group_id: "g-1".into(),
            applicant: "Applicant.5678".into(),
            created_at_sec: 1,
            updated_at_sec: 1,
            kill_proof: None,
        };
        let json = serde_json::to_value(&app).unwrap();
        assert!(json.get("killProof").is_none());
    }

    #[test]
    fn group_without_requirement_omits_kp_id() {
        let mut group = sample_group();
        group.kill_proof_id = None;
        let json = serde_json::to_value(&group).unwrap();
        assert!(json.get("killProofId").is_none());
    }
}
