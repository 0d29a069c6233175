//! Background collection of stale rows.
//!
//! Every tick the reaper deletes applications older than the TTL, then
//! groups, in that order to respect the foreign key. Each removed row yields
//! exactly one removal broadcast. Errors are logged and the loop continues;
//! the task exits when the shutdown signal flips.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use lfg_store::Store;
use lfg_types::{unix_now, ApplicationUpdate, GroupsUpdate};

use crate::middleware::GatewayMetrics;
use crate::ws::SubscriptionRegistries;

pub struct Reaper {
    store: Arc<Store>,
    registries: Arc<SubscriptionRegistries>,
    metrics: Arc<GatewayMetrics>,
    entry_ttl: Duration,
}

impl Reaper {
    pub fn new(
        store: Arc<Store>,
        registries: Arc<SubscriptionRegistries>,
        metrics: Arc<GatewayMetrics>,
        entry_ttl: Duration,
    ) -> Self {
        Self {
            store,
            registries,
            metrics,
            entry_ttl,
        }
    }

    /// One sweep at the given instant.
    pub async fn step(&self, now_sec: i64) {
        let cutoff = now_sec - self.entry_ttl.as_secs() as i64;

        // Applications first, to respect the foreign key on groups.
        let mut reaped_applications = 0u64;
        match self.store.delete_applications_updated_before(cutoff).await {
            Ok(applications) => {
                reaped_applications = applications.len() as u64;
                for application in applications {
                    self.registries.broadcast_application_update(
                        &application.group_id,
                        &application.applicant,
                        &ApplicationUpdate::RemovedApplicationId(application.id),
                    );
                }
            }
            Err(e) => error!(error = %e, "store.delete_applications_updated_before"),
        }

        let mut reaped_groups = 0u64;
        match self.store.delete_groups_updated_before(cutoff).await {
            Ok(groups) => {
                reaped_groups = groups.len() as u64;
                for group in groups {
                    self.registries
                        .broadcast_groups_update(&GroupsUpdate::RemovedGroupId(group.id));
                }
            }
            Err(e) => error!(error = %e, "store.delete_groups_updated_before"),
        }

        self.metrics.record_reaped(reaped_groups, reaped_applications);
        if reaped_groups > 0 || reaped_applications > 0 {
            info!(
                groups = reaped_groups,
                applications = reaped_applications,
                "reaped expired entries"
            );
        }
    }

    /// Sweep every `interval` until shutdown.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.step(unix_now()).await,
                _ = async {
                    while !*shutdown.borrow() {
                        if shutdown.changed().await.is_err() {
                            break;
                        }
                    }
                } => return,
            }
        }
    }
}
