//! Application operations, the heartbeat, and the application subscription
//! stream.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

use lfg_store::Store;
use lfg_types::{unix_now, Application, ApplicationUpdate, ClientInfo, GroupsUpdate};
use lfg_upstream::KillProofProvider;

use crate::domain::error::{RpcError, RpcResult};
use crate::domain::requests::ListApplicationsParams;
use crate::ws::{ApplicationsSubscription, SubscriptionRegistries};

/// Handlers for the application namespace.
pub struct ApplicationHandlers {
    store: Arc<Store>,
    kill_proof: Arc<dyn KillProofProvider>,
    registries: Arc<SubscriptionRegistries>,
}

impl ApplicationHandlers {
    pub fn new(
        store: Arc<Store>,
        kill_proof: Arc<dyn KillProofProvider>,
        registries: Arc<SubscriptionRegistries>,
    ) -> Self {
        Self {
            store,
            kill_proof,
            registries,
        }
    }

    /// Apply to a group.
    ///
    /// The group must exist, the caller must not be its creator, and the
    /// caller must not already have an application there.
    pub async fn create_application(
        &self,
        client: &ClientInfo,
        group_id: &str,
    ) -> RpcResult<Application> {
        let group = self
            .store
            .get_group(group_id)
            .await
            .map_err(|e| {
                error!(error = %e, "store.get_group");
                RpcError::internal("failed to validate application")
            })?
            .ok_or_else(|| RpcError::not_found("group not found"))?;

        if group.creator == client.account {
            return Err(RpcError::permission_denied("cannot apply to own group"));
        }

        let existing = self
            .store
            .list_applications_for_group(group_id)
            .await
            .map_err(|e| {
                error!(error = %e, "store.list_applications_for_group");
                RpcError::internal("failed to check existing applications")
            })?;
        if existing.iter().any(|a| a.applicant == client.account) {
            return Err(RpcError::already_exists("already applied to this group"));
        }

        let now = unix_now();
        let application = Application {
            id: lfg_types::new_id(),
            group_id: group_id.to_string(),
            applicant: client.account.clone(),
            created_at_sec: now,
            updated_at_sec: now,
            kill_proof: None,
        };

        let mut saved = self
            .store
            .save_application(&application, group_id)
            .await
            .map_err(|e| {
                error!(error = %e, "store.save_application");
                RpcError::internal("failed to create application")
            })?;

        self.enrich(&mut saved).await;

        self.registries.broadcast_application_update(
            group_id,
            &saved.applicant,
            &ApplicationUpdate::NewApplication(saved.clone()),
        );
        Ok(saved)
    }

    /// Withdraw an application. Only the applicant may do so.
    pub async fn delete_application(
        &self,
        client: &ClientInfo,
        application_id: &str,
    ) -> RpcResult<()> {
        let application = self
            .store
            .get_application(application_id)
            .await
            .map_err(|e| {
                error!(error = %e, "store.get_application");
                RpcError::internal("failed to look up application")
            })?
            .ok_or_else(|| RpcError::not_found("application not found"))?;

        if application.applicant != client.account {
            return Err(RpcError::permission_denied("not application owner"));
        }

        self.store
            .delete_application(application_id)
            .await
            .map_err(|e| {
                error!(error = %e, "store.delete_application");
                RpcError::internal("failed to delete application")
            })?;

        self.registries.broadcast_application_update(
            &application.group_id,
            &application.applicant,
            &ApplicationUpdate::RemovedApplicationId(application.id),
        );
        Ok(())
    }

    /// List applications, filtered by exactly one of group id (creator only)
    /// or account name (self only). Results are enriched best-effort.
    pub async fn list_applications(
        &self,
        client: &ClientInfo,
        params: ListApplicationsParams,
    ) -> RpcResult<Vec<Application>> {
        let mut applications = match (params.group_id, params.account_name) {
            (None, Some(account)) => {
                if account != client.account {
                    return Err(RpcError::permission_denied("account name mismatch"));
                }
                self.store
                    .list_applications_for_account(&account)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "store.list_applications_for_account");
                        RpcError::internal("failed to list applications")
                    })?
            }
            (Some(group_id), None) => {
                let group = self
                    .store
                    .get_group(&group_id)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "store.get_group");
                        RpcError::internal("failed to look up group")
                    })?
                    .ok_or_else(|| RpcError::not_found("group not found"))?;
                if group.creator != client.account {
                    return Err(RpcError::permission_denied("not group creator"));
                }
                self.store
                    .list_applications_for_group(&group_id)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "store.list_applications_for_group");
                        RpcError::internal("failed to list applications")
                    })?
            }
            _ => {
                return Err(RpcError::invalid_params(
                    "exactly one of group id or account name must be provided",
                ));
            }
        };

        for application in &mut applications {
            self.enrich(application).await;
        }
        Ok(applications)
    }

    /// Reset the staleness clock on every row the caller owns and
    /// re-broadcast the touched rows.
    pub async fn heartbeat(&self, client: &ClientInfo) -> RpcResult<()> {
        let touched = self
            .store
            .touch_account(&client.account, unix_now())
            .await
            .map_err(|e| {
                error!(error = %e, "store.touch_account");
                RpcError::internal("failed to update last seen time")
            })?;

        for group in touched.groups {
            self.registries
                .broadcast_groups_update(&GroupsUpdate::UpdatedGroup(group));
        }
        for application in touched.applications {
            let group_id = application.group_id.clone();
            let applicant = application.applicant.clone();
            self.registries.broadcast_application_update(
                &group_id,
                &applicant,
                &ApplicationUpdate::UpdatedApplication(application),
            );
        }
        Ok(())
    }

    /// Open an application subscription stream.
    ///
    /// The caller is always registered under their own account. If the
    /// referenced group exists they must be its creator, in which case the
    /// same buffer is additionally registered for that group; a missing
    /// group leaves the account-only subscription in place.
    pub async fn subscribe_group_applications(
        &self,
        client: &ClientInfo,
        group_id: &str,
    ) -> RpcResult<(mpsc::Receiver<ApplicationUpdate>, ApplicationsSubscription)> {
        let (rx, mut subscription) = self.registries.subscribe_applications(&client.account);

        let group = self.store.get_group(group_id).await.map_err(|e| {
            error!(error = %e, "store.get_group");
            RpcError::internal("failed to look up group")
        })?;

        if let Some(group) = group {
            if group.creator != client.account {
                // Dropping the handle releases the account slot registered
                // above.
                return Err(RpcError::permission_denied("not group creator"));
            }
            subscription.attach_group(group_id, &client.token);
        }

        Ok((rx, subscription))
    }

    /// Attach kill-proof counters, best-effort: failures log and leave the
    /// application unenriched.
    async fn enrich(&self, application: &mut Application) {
        match self.kill_proof.kill_proof(&application.applicant).await {
            Ok(kill_proof) => application.kill_proof = kill_proof,
            Err(e) => {
                warn!(applicant = %application.applicant, error = %e, "kill-proof enrichment failed");
            }
        }
    }
}
