//! Subscription registries and broadcast fan-out.
//!
//! Three independent registries feed the live board:
//!
//! 1. group-board subscribers, keyed by bearer token;
//! 2. per-group application subscribers (group creators), keyed by group id
//!    then bearer token;
//! 3. per-applicant application subscribers, keyed by account name.
//!
//! Each subscriber owns a bounded FIFO buffer. Broadcasting attempts a
//! non-blocking enqueue into every matching buffer; a full buffer drops that
//! update for that subscriber only. A slow consumer can never stall the
//! publisher or starve other subscribers; it resynchronizes through its
//! next list call.
//!
//! Duplicate subscriptions under one key are last-writer-wins: the newer
//! session takes the slot and the older one stops receiving updates. Each
//! session's release handle only clears the slot if it still holds it, so a
//! stale session cannot tear down its replacement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use lfg_types::{ApplicationUpdate, GroupsUpdate, SyncMap};

use crate::middleware::GatewayMetrics;

type GroupsSender = mpsc::Sender<GroupsUpdate>;
type ApplicationsSender = mpsc::Sender<ApplicationUpdate>;

/// The three fan-out registries, bundled into one service-scoped object.
pub struct SubscriptionRegistries {
    /// Bearer token → group-board buffer.
    groups: SyncMap<String, GroupsSender>,
    /// Group id → (bearer token → application buffer).
    group_applications: SyncMap<String, Arc<SyncMap<String, ApplicationsSender>>>,
    /// Account name → application buffer.
    account_applications: SyncMap<String, ApplicationsSender>,
    buffer_capacity: usize,
    id_counter: AtomicU64,
    metrics: Arc<GatewayMetrics>,
}

impl SubscriptionRegistries {
    pub fn new(buffer_capacity: usize, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            groups: SyncMap::new(),
            group_applications: SyncMap::new(),
            account_applications: SyncMap::new(),
            buffer_capacity,
            id_counter: AtomicU64::new(1),
            metrics,
        }
    }

    /// Fresh id for a subscription stream, echoed in every notification.
    pub fn next_subscription_id(&self) -> String {
        format!("0x{:x}", self.id_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a group-board subscriber under the caller's token.
    ///
    /// Returns the receiving end of the buffer and the release handle; drop
    /// the handle to deregister.
    pub fn subscribe_groups(
        self: &Arc<Self>,
        token: &str,
    ) -> (mpsc::Receiver<GroupsUpdate>, GroupsSubscription) {
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        self.groups.insert(token.to_string(), tx.clone());
        self.metrics.record_subscription();
        (
            rx,
            GroupsSubscription {
                registries: Arc::clone(self),
                token: token.to_string(),
                sender: tx,
            },
        )
    }

    /// Register an application subscriber under the caller's account.
    ///
    /// The handle can additionally be attached to one group's registry via
    /// [`ApplicationsSubscription::attach_group`]; both slots are released
    /// together when the handle drops.
    pub fn subscribe_applications(
        self: &Arc<Self>,
        account: &str,
    ) -> (mpsc::Receiver<ApplicationUpdate>, ApplicationsSubscription) {
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        self.account_applications.insert(account.to_string(), tx.clone());
        self.metrics.record_subscription();
        (
            rx,
            ApplicationsSubscription {
                registries: Arc::clone(self),
                account: account.to_string(),
                group_slot: None,
                sender: tx,
            },
        )
    }

    /// Deliver `update` to every group-board subscriber.
    pub fn broadcast_groups_update(&self, update: &GroupsUpdate) {
        for sender in self.groups.values() {
            self.record_send(sender.try_send(update.clone()));
        }
    }

    /// Deliver `update` to every subscriber of `group_id`'s applications and
    /// to the applicant's own subscription, if present.
    pub fn broadcast_application_update(
        &self,
        group_id: &str,
        applicant: &str,
        update: &ApplicationUpdate,
    ) {
        if let Some(subscribers) = self.group_applications.get(&group_id.to_string()) {
            for sender in subscribers.values() {
                self.record_send(sender.try_send(update.clone()));
            }
        }
        if let Some(sender) = self.account_applications.get(&applicant.to_string()) {
            self.record_send(sender.try_send(update.clone()));
        }
    }

    fn record_send<T>(&self, result: Result<(), TrySendError<T>>) {
        match result {
            Ok(()) => self.metrics.record_update_pushed(),
            // Buffer full: the subscriber is slow, skip this update for them.
            Err(TrySendError::Full(_)) => self.metrics.record_update_dropped(),
            // Receiver already torn down; deregistration will catch up.
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Number of registered group-board subscribers.
    pub fn groups_subscriber_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of application subscribers registered for `group_id`.
    pub fn group_subscriber_count(&self, group_id: &str) -> usize {
        self.group_applications
            .get(&group_id.to_string())
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Number of per-applicant subscribers.
    pub fn account_subscriber_count(&self) -> usize {
        self.account_applications.len()
    }
}

/// Release handle for a group-board subscription.
pub struct GroupsSubscription {
    registries: Arc<SubscriptionRegistries>,
    token: String,
    sender: GroupsSender,
}

impl Drop for GroupsSubscription {
    fn drop(&mut self) {
        let sender = self.sender.clone();
        self.registries
            .groups
            .update(self.token.clone(), move |current| match current {
                // Only clear the slot if this session still holds it.
                Some(current) if current.same_channel(&sender) => None,
                other => other,
            });
    }
}

/// Release handle for an application subscription (account slot plus an
/// optional per-group slot).
pub struct ApplicationsSubscription {
    registries: Arc<SubscriptionRegistries>,
    account: String,
    group_slot: Option<(String, String)>,
    sender: ApplicationsSender,
}

impl ApplicationsSubscription {
    /// Additionally register this buffer for `group_id`'s application
    /// updates, keyed by the caller's token.
    pub fn attach_group(&mut self, group_id: &str, token: &str) {
        let sender = self.sender.clone();
        let token_owned = token.to_string();
        self.registries
            .group_applications
            .update(group_id.to_string(), move |existing| {
                let subscribers = existing.unwrap_or_else(|| Arc::new(SyncMap::new()));
                subscribers.insert(token_owned, sender);
                Some(subscribers)
            });
        self.group_slot = Some((group_id.to_string(), token.to_string()));
    }
}

impl Drop for ApplicationsSubscription {
    fn drop(&mut self) {
        if let Some((group_id, token)) = self.group_slot.take() {
            let sender = self.sender.clone();
            self.registries
                .group_applications
                .update(group_id, move |existing| {
                    let subscribers = existing?;
                    subscribers.update(token, |current| match current {
                        Some(current) if current.same_channel(&sender) => None,
                        other => other,
                    });
                    if subscribers.is_empty() {
                        None
                    } else {
                        Some(subscribers)
                    }
                });
        }

        let sender = self.sender.clone();
        self.registries
            .account_applications
            .update(self.account.clone(), move |current| match current {
                Some(current) if current.same_channel(&sender) => None,
                other => other,
            });
    }
}

/// Push notification wrapping one update for the wire.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: SubscriptionParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: serde_json::Value,
}

impl SubscriptionNotification {
    pub fn new(subscription: String, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "lfg_subscription",
            params: SubscriptionParams {
                subscription,
                result,
            },
        }
    }
}
