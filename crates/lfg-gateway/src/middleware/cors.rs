//! CORS for browser clients.
//!
//! The board is consumed from web clients served on arbitrary origins, so
//! the policy is permissive: any origin, any method, any header.

use tower_http::cors::{Any, CorsLayer};

/// Create the CORS layer.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
