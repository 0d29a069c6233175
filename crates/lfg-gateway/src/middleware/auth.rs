//! Authentication middleware.
//!
//! Extracts the bearer credential, resolves it to an account name, and
//! attaches [`ClientInfo`] to the request extensions. Applied uniformly to
//! the unary endpoint and the WebSocket upgrade.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::warn;

use lfg_types::ClientInfo;
use lfg_upstream::TokenResolver;

use crate::domain::error::RpcError;

/// Authentication layer.
#[derive(Clone)]
pub struct AuthLayer {
    resolver: Arc<dyn TokenResolver>,
}

impl AuthLayer {
    pub fn new(resolver: Arc<dyn TokenResolver>) -> Self {
        Self { resolver }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            resolver: Arc::clone(&self.resolver),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    resolver: Arc<dyn TokenResolver>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let resolver = Arc::clone(&self.resolver);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let token = match bearer_token(&req) {
                Some(token) => token,
                None => {
                    return Ok(error_response(RpcError::unauthenticated(
                        "missing bearer token",
                    )));
                }
            };

            let account = match resolver.resolve(&token).await {
                Ok(account) => account,
                Err(e) => {
                    warn!(error = %e, "token resolution failed");
                    return Ok(error_response(RpcError::internal(
                        "failed to resolve auth token",
                    )));
                }
            };

            if account.is_empty() {
                return Ok(error_response(RpcError::unauthenticated(
                    "invalid auth token",
                )));
            }

            req.extensions_mut().insert(ClientInfo { account, token });
            inner.call(req).await
        })
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token<B>(req: &Request<B>) -> Option<String> {
    let value = req.headers().get("authorization")?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// JSON-RPC error body for requests rejected before dispatch.
fn error_response(err: RpcError) -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "error": err,
        "id": null
    });

    let mut response = Response::new(Body::from(serde_json::to_vec(&body).unwrap_or_default()));
    *response.status_mut() = err.http_status();
    response
        .headers_mut()
        .insert("Content-Type", "application/json".parse().unwrap());
    if response.status() == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert("WWW-Authenticate", "Bearer".parse().unwrap());
    }
    response
}
