//! WebSocket subscription streams: registries, fan-out, and the per-session
//! handler.

pub mod handler;
pub mod subscriptions;

pub use handler::{SessionLimits, WsSession};
pub use subscriptions::{
    ApplicationsSubscription, GroupsSubscription, SubscriptionNotification, SubscriptionRegistries,
};
