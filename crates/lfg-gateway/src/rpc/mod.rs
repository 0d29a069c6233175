//! The coordination engine: unary operation handlers grouped by namespace.
//!
//! Every mutation follows the same shape: validate against the caller's
//! identity and the board invariants, persist, then broadcast. The durable
//! write happens-before the broadcast, and a failure before the write leaves
//! no trace.

pub mod applications;
pub mod groups;

use std::sync::Arc;

use lfg_store::Store;
use lfg_upstream::KillProofProvider;

use crate::ws::SubscriptionRegistries;

pub use applications::ApplicationHandlers;
pub use groups::GroupHandlers;

/// All operation handlers, sharing the store and the fan-out registries.
pub struct RpcHandlers {
    pub groups: GroupHandlers,
    pub applications: ApplicationHandlers,
}

impl RpcHandlers {
    pub fn new(
        store: Arc<Store>,
        kill_proof: Arc<dyn KillProofProvider>,
        registries: Arc<SubscriptionRegistries>,
    ) -> Self {
        Self {
            groups: GroupHandlers::new(Arc::clone(&store), Arc::clone(&registries)),
            applications: ApplicationHandlers::new(store, kill_proof, registries),
        }
    }
}
