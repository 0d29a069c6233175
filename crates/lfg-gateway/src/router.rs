//! JSON-RPC method dispatch for the unary operations.

use std::sync::Arc;

use lfg_types::ClientInfo;

use crate::domain::error::RpcError;
use crate::domain::requests::{
    CreateApplicationParams, CreateGroupParams, DeleteApplicationParams, DeleteGroupParams,
    ListApplicationsParams, UpdateGroupParams,
};
use crate::middleware::GatewayMetrics;
use crate::rpc::RpcHandlers;

/// Application state shared across request handlers.
#[derive(Clone)]
pub struct AppState {
    pub handlers: Arc<RpcHandlers>,
    pub metrics: Arc<GatewayMetrics>,
}

/// Route a JSON-RPC method to its handler.
pub async fn route_method(
    state: &AppState,
    client: &ClientInfo,
    method: &str,
    params: Option<&serde_json::Value>,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "lfg_createGroup" => {
            let params: CreateGroupParams = parse_params(params)?;
            let group = state.handlers.groups.create_group(client, params).await?;
            Ok(serde_json::json!({ "group": group }))
        }
        "lfg_updateGroup" => {
            let params: UpdateGroupParams = parse_params(params)?;
            let group = state
                .handlers
                .groups
                .update_group(client, params.group)
                .await?;
            Ok(serde_json::json!({ "group": group }))
        }
        "lfg_deleteGroup" => {
            let params: DeleteGroupParams = parse_params(params)?;
            state
                .handlers
                .groups
                .delete_group(client, &params.group_id)
                .await?;
            Ok(serde_json::json!({}))
        }
        "lfg_listGroups" => {
            let groups = state.handlers.groups.list_groups().await?;
            Ok(serde_json::json!({ "groups": groups }))
        }
        "lfg_createGroupApplication" => {
            let params: CreateApplicationParams = parse_params(params)?;
            let application = state
                .handlers
                .applications
                .create_application(client, &params.group_id)
                .await?;
            Ok(serde_json::json!({ "application": application }))
        }
        "lfg_deleteGroupApplication" => {
            let params: DeleteApplicationParams = parse_params(params)?;
            state
                .handlers
                .applications
                .delete_application(client, &params.application_id)
                .await?;
            Ok(serde_json::json!({}))
        }
        "lfg_listGroupApplications" => {
            let params: ListApplicationsParams = parse_params(params)?;
            let applications = state
                .handlers
                .applications
                .list_applications(client, params)
                .await?;
            Ok(serde_json::json!({ "applications": applications }))
        }
        "lfg_heartbeat" => {
            state.handlers.applications.heartbeat(client).await?;
            Ok(serde_json::json!({}))
        }
        "lfg_subscribeGroups" | "lfg_subscribeGroupApplications" => Err(RpcError::invalid_request(
            "subscriptions are served on the websocket endpoint",
        )),
        other => Err(RpcError::method_not_found(other)),
    }
}

/// Deserialize the params object; missing params parse as an empty object.
fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<&serde_json::Value>,
) -> Result<T, RpcError> {
    let value = params.cloned().unwrap_or(serde_json::json!({}));
    serde_json::from_value(value).map_err(|e| RpcError::invalid_params(e.to_string()))
}
