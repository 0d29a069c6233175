//! Wire payloads for the unary operations.

use lfg_types::Group;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupParams {
    pub title: String,
    #[serde(default)]
    pub kill_proof_id: Option<String>,
    #[serde(default)]
    pub kill_proof_minimum: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupParams {
    pub group: Group,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupParams {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationParams {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteApplicationParams {
    pub application_id: String,
}

/// Exactly one of the two filters must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListApplicationsParams {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeApplicationsParams {
    pub group_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_group_params_default_kp_fields() {
        let params: CreateGroupParams =
            serde_json::from_str(r#"{"title": "weekly clears"}"#).unwrap();
        assert_eq!(params.title, "weekly clears");
        assert!(params.kill_proof_id.is_none());
        assert_eq!(params.kill_proof_minimum, 0);
    }

    #[test]
    fn list_params_accept_either_filter() {
        let by_group: ListApplicationsParams =
            serde_json::from_str(r#"{"groupId": "g1"}"#).unwrap();
        assert_eq!(by_group.group_id.as_deref(), Some("g1"));
        assert!(by_group.account_name.is_none());

        let by_account: ListApplicationsParams =
            serde_json::from_str(r#"{"accountName": "Player.1234"}"#).unwrap();
        assert_eq!(by_account.account_name.as_deref(), Some("Player.1234"));
    }
}
