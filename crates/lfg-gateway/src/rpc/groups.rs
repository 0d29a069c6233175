//! Group operations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::error;

use lfg_store::Store;
use lfg_types::{unix_now, ClientInfo, Group, GroupsUpdate};

use crate::domain::error::{RpcError, RpcResult};
use crate::domain::requests::CreateGroupParams;
use crate::ws::{GroupsSubscription, SubscriptionRegistries};

/// Handlers for the group namespace.
pub struct GroupHandlers {
    store: Arc<Store>,
    registries: Arc<SubscriptionRegistries>,
}

impl GroupHandlers {
    pub fn new(store: Arc<Store>, registries: Arc<SubscriptionRegistries>) -> Self {
        Self { store, registries }
    }

    /// Create a group owned by the caller.
    ///
    /// One account owns at most one group at a time; a second create is
    /// rejected before anything is written.
    pub async fn create_group(
        &self,
        client: &ClientInfo,
        params: CreateGroupParams,
    ) -> RpcResult<Group> {
        let existing = self.store.list_groups().await.map_err(|e| {
            error!(error = %e, "store.list_groups");
            RpcError::internal("failed to validate group creation")
        })?;
        if existing.iter().any(|g| g.creator == client.account) {
            return Err(RpcError::permission_denied("already owns a group"));
        }

        let now = unix_now();
        let group = Group {
            id: lfg_types::new_id(),
            creator: client.account.clone(),
            title: params.title,
            kill_proof_id: params.kill_proof_id,
            kill_proof_minimum: params.kill_proof_minimum,
            created_at_sec: now,
            updated_at_sec: now,
        };

        let saved = self.store.save_group(&group).await.map_err(|e| {
            error!(error = %e, "store.save_group");
            RpcError::internal("failed to create group")
        })?;

        self.registries
            .broadcast_groups_update(&GroupsUpdate::NewGroup(saved.clone()));
        Ok(saved)
    }

    /// Update a group's mutable fields.
    pub async fn update_group(&self, client: &ClientInfo, group: Group) -> RpcResult<Group> {
        let stored = self.get_owned_group(client, &group.id).await?;

        let updated = Group {
            title: group.title,
            kill_proof_id: group.kill_proof_id,
            kill_proof_minimum: group.kill_proof_minimum,
            updated_at_sec: unix_now(),
            ..stored
        };

        let saved = self.store.save_group(&updated).await.map_err(|e| {
            error!(error = %e, "store.save_group");
            RpcError::internal("failed to update group")
        })?;

        self.registries
            .broadcast_groups_update(&GroupsUpdate::UpdatedGroup(saved.clone()));
        Ok(saved)
    }

    /// Delete a group. Deleting an absent group succeeds with no broadcast.
    pub async fn delete_group(&self, client: &ClientInfo, group_id: &str) -> RpcResult<()> {
        let group = self.store.get_group(group_id).await.map_err(|e| {
            error!(error = %e, "store.get_group");
            RpcError::internal("failed to look up group")
        })?;

        let group = match group {
            Some(group) => group,
            None => return Ok(()),
        };
        if group.creator != client.account {
            return Err(RpcError::permission_denied("not group owner"));
        }

        // Applications die with the group via the foreign-key cascade.
        self.store.delete_group(&group.id).await.map_err(|e| {
            error!(error = %e, "store.delete_group");
            RpcError::internal("failed to delete group")
        })?;

        self.registries
            .broadcast_groups_update(&GroupsUpdate::RemovedGroupId(group.id));
        Ok(())
    }

    /// List every group, most recently updated first.
    pub async fn list_groups(&self) -> RpcResult<Vec<Group>> {
        self.store.list_groups().await.map_err(|e| {
            error!(error = %e, "store.list_groups");
            RpcError::internal("failed to list groups")
        })
    }

    /// Open a group-board subscription stream for the caller.
    pub fn subscribe_groups(
        &self,
        client: &ClientInfo,
    ) -> (mpsc::Receiver<GroupsUpdate>, GroupsSubscription) {
        self.registries.subscribe_groups(&client.token)
    }

    async fn get_owned_group(&self, client: &ClientInfo, group_id: &str) -> RpcResult<Group> {
        let group = self
            .store
            .get_group(group_id)
            .await
            .map_err(|e| {
                error!(error = %e, "store.get_group");
                RpcError::internal("failed to look up group")
            })?
            .ok_or_else(|| RpcError::not_found("group not found"))?;

        if group.creator != client.account {
            return Err(RpcError::permission_denied("not group owner"));
        }
        Ok(group)
    }
}
