//! Coordination engine and RPC surface for the looking-for-group board.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        LFG GATEWAY                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  POST /  (JSON-RPC unary ops)      GET /ws  (subscriptions)  │
//! │         │                                  │                 │
//! │  ┌──────┴──────────────────────────────────┴──────┐          │
//! │  │   Middleware: CatchPanic → CORS → Auth → Rate  │          │
//! │  └──────────────────────┬─────────────────────────┘          │
//! │                         │                                    │
//! │  ┌──────────────────────┴─────────────────────────┐          │
//! │  │        RPC handlers (groups, applications)     │          │
//! │  │   validate → mutate store → broadcast update   │          │
//! │  └───────┬─────────────────────────┬──────────────┘          │
//! │          │                         │                         │
//! │     lfg-store               SubscriptionRegistries           │
//! │     (SQLite)               (bounded per-subscriber buffers)  │
//! │                                     ▲                        │
//! │                              Reaper ┘ (TTL sweep)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations persist before they broadcast; any subscriber that receives an
//! update can trust the store reflects it. Broadcasts never block: a full
//! subscriber buffer drops that update for that subscriber only.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod reaper;
pub mod router;
pub mod rpc;
pub mod service;
pub mod ws;

pub use domain::config::GatewayConfig;
pub use domain::error::{GatewayError, RpcError};
pub use middleware::GatewayMetrics;
pub use reaper::Reaper;
pub use rpc::RpcHandlers;
pub use service::GatewayService;
pub use ws::SubscriptionRegistries;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
