//! Error types: the wire-level [`RpcError`] and the process-level
//! [`GatewayError`].
//!
//! Validation failures surface verbatim to the client. Store and upstream
//! faults are logged at the call site and surfaced as internal errors with a
//! short human message; the raw cause never leaves the process.

use axum::http::StatusCode;
use serde::Serialize;
use std::fmt;

/// JSON-RPC error codes used on the wire.
pub mod codes {
    // JSON-RPC 2.0 standard errors
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server errors (-32000 range)
    pub const NOT_FOUND: i32 = -32001;
    pub const ALREADY_EXISTS: i32 = -32002;
    pub const PERMISSION_DENIED: i32 = -32003;
    pub const UNAUTHENTICATED: i32 = -32004;
    pub const RESOURCE_EXHAUSTED: i32 = -32005;
}

/// A wire-visible error with a JSON-RPC code.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, format!("parse error: {}", details.into()))
    }

    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, details.into())
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, details.into())
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, details.into())
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, details.into())
    }

    pub fn already_exists(details: impl Into<String>) -> Self {
        Self::new(codes::ALREADY_EXISTS, details.into())
    }

    pub fn permission_denied(details: impl Into<String>) -> Self {
        Self::new(codes::PERMISSION_DENIED, details.into())
    }

    pub fn unauthenticated(details: impl Into<String>) -> Self {
        Self::new(codes::UNAUTHENTICATED, details.into())
    }

    pub fn resource_exhausted(details: impl Into<String>) -> Self {
        Self::new(codes::RESOURCE_EXHAUSTED, details.into())
    }

    /// HTTP status for errors produced before a JSON-RPC response exists
    /// (middleware rejections).
    pub fn http_status(&self) -> StatusCode {
        match self.code {
            codes::UNAUTHENTICATED => StatusCode::UNAUTHORIZED,
            codes::RESOURCE_EXHAUSTED => StatusCode::TOO_MANY_REQUESTS,
            codes::PERMISSION_DENIED => StatusCode::FORBIDDEN,
            codes::PARSE_ERROR | codes::INVALID_REQUEST | codes::INVALID_PARAMS => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Process-level errors (startup, bind, wiring).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server bind error: {0}")]
    Bind(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Store(#[from] lfg_store::StoreError),
}
