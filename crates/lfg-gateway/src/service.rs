//! Service bootstrap: middleware stack, listeners, background tasks.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

use lfg_store::Store;
use lfg_types::ClientInfo;
use lfg_upstream::{KillProofProvider, TokenResolver};

use crate::domain::config::GatewayConfig;
use crate::domain::error::{GatewayError, RpcError};
use crate::domain::methods::{STREAMING_METHODS, UNARY_METHODS};
use crate::middleware::{cleanup_task, create_cors_layer, AuthLayer, GatewayMetrics, RateLimitLayer};
use crate::reaper::Reaper;
use crate::router::{route_method, AppState};
use crate::rpc::RpcHandlers;
use crate::ws::{handler::SessionLimits, SubscriptionRegistries, WsSession};

/// The assembled gateway: engine state plus listeners.
pub struct GatewayService {
    config: GatewayConfig,
    state: ServiceState,
    store: Arc<Store>,
    resolver: Arc<dyn TokenResolver>,
    rate_limit: RateLimitLayer,
    shutdown: watch::Sender<bool>,
}

/// State shared across request handlers.
#[derive(Clone)]
struct ServiceState {
    app: AppState,
    registries: Arc<SubscriptionRegistries>,
    session_limits: Arc<SessionLimits>,
}

impl GatewayService {
    /// Assemble the service. No sockets are bound until [`start`].
    ///
    /// [`start`]: GatewayService::start
    pub fn new(
        config: GatewayConfig,
        store: Arc<Store>,
        resolver: Arc<dyn TokenResolver>,
        kill_proof: Arc<dyn KillProofProvider>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let metrics = Arc::new(GatewayMetrics::new());
        let registries = Arc::new(SubscriptionRegistries::new(
            config.websocket.buffer_capacity,
            Arc::clone(&metrics),
        ));
        let handlers = Arc::new(RpcHandlers::new(
            Arc::clone(&store),
            kill_proof,
            Arc::clone(&registries),
        ));
        let session_limits = Arc::new(SessionLimits::new(config.websocket.max_sessions));
        let rate_limit = RateLimitLayer::new(&config.rate_limit, Arc::clone(&metrics));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            state: ServiceState {
                app: AppState { handlers, metrics },
                registries,
                session_limits,
            },
            store,
            resolver,
            rate_limit,
            shutdown,
        })
    }

    /// Handle for triggering shutdown from another task.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Gateway metrics.
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.state.app.metrics)
    }

    /// The RPC router with the full middleware stack applied. Health and
    /// reflection routes stay outside the stack.
    pub fn router(&self) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(create_cors_layer())
            .layer(AuthLayer::new(Arc::clone(&self.resolver)))
            .layer(self.rate_limit.clone());

        let mut public = Router::new().route("/health", get(health_check));
        if self.config.enable_reflection {
            public = public.route("/methods", get(list_methods));
        }

        Router::new()
            .route("/", post(handle_json_rpc))
            .route("/ws", get(handle_ws_upgrade))
            .layer(middleware)
            .with_state(self.state.clone())
            .merge(public)
    }

    /// Start background tasks and serve until shutdown.
    pub async fn start(&self) -> Result<(), GatewayError> {
        self.spawn_background_tasks();

        if self.config.metrics.enabled {
            let addr = self.config.metrics_addr();
            let metrics = self.metrics();
            let mut shutdown = self.shutdown.subscribe();
            let router = Router::new()
                .route("/health", get(health_check))
                .route(
                    "/metrics",
                    get(move || {
                        let metrics = Arc::clone(&metrics);
                        async move { Json(metrics.to_json()) }
                    }),
                );
            info!(addr = %addr, "starting metrics listener");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tokio::spawn(async move {
                let result = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.wait_for(|stop| *stop).await;
                    })
                    .await;
                if let Err(e) = result {
                    error!(error = %e, "metrics listener failed");
                }
            });
        }

        let addr = self.config.http_addr();
        info!(addr = %addr, "starting RPC listener");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let mut shutdown = self.shutdown.subscribe();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;

        info!("gateway stopped");
        Ok(())
    }

    fn spawn_background_tasks(&self) {
        tokio::spawn(cleanup_task(
            self.rate_limit.state(),
            self.config.rate_limit.cleanup_interval(),
            self.shutdown.subscribe(),
        ));

        let reaper = Reaper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.state.registries),
            self.metrics(),
            self.config.reaper.entry_ttl(),
        );
        tokio::spawn(reaper.run(self.config.reaper.interval(), self.shutdown.subscribe()));
    }
}

/// Handle a JSON-RPC request body (single or batch).
async fn handle_json_rpc(
    State(state): State<ServiceState>,
    Extension(client): Extension<ClientInfo>,
    body: String,
) -> impl IntoResponse {
    let request: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            let err = RpcError::parse_error(e.to_string());
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "error": err,
                    "id": null
                })),
            );
        }
    };

    let response = if let Some(requests) = request.as_array() {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(process_single_request(&state, &client, request).await);
        }
        serde_json::Value::Array(responses)
    } else {
        process_single_request(&state, &client, &request).await
    };

    (StatusCode::OK, Json(response))
}

/// Process one JSON-RPC request object.
async fn process_single_request(
    state: &ServiceState,
    client: &ClientInfo,
    request: &serde_json::Value,
) -> serde_json::Value {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = request.get("params");

    match route_method(&state.app, client, method, params).await {
        Ok(result) => {
            state.app.metrics.record_request(true);
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result
            })
        }
        Err(err) => {
            state.app.metrics.record_request(false);
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": err
            })
        }
    }
}

/// Upgrade to a subscription session, subject to the session cap.
async fn handle_ws_upgrade(
    State(state): State<ServiceState>,
    Extension(client): Extension<ClientInfo>,
    ws: WebSocketUpgrade,
) -> Response {
    let permit = match state.session_limits.try_acquire() {
        Some(permit) => permit,
        None => {
            let err = RpcError::resource_exhausted("too many subscription sessions");
            return (
                err.http_status(),
                Json(serde_json::json!({
                    "jsonrpc": "2.0",
                    "error": err,
                    "id": null
                })),
            )
                .into_response();
        }
    };

    let session = WsSession::new(
        Arc::clone(&state.app.handlers),
        Arc::clone(&state.registries),
        Arc::clone(&state.app.metrics),
        client,
        permit,
    );
    ws.on_upgrade(move |socket| session.run(socket))
}

/// Liveness endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "lfg-gateway",
        "version": crate::VERSION
    }))
}

/// Reflection endpoint: the supported-method registry.
async fn list_methods() -> impl IntoResponse {
    Json(serde_json::json!({
        "unary": UNARY_METHODS,
        "streaming": STREAMING_METHODS
    }))
}

/// Recovered handler panics surface as internal errors.
fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error!("recovered panic in request handler");
    let err = RpcError::internal("internal server error");
    (
        err.http_status(),
        Json(serde_json::json!({
            "jsonrpc": "2.0",
            "error": err,
            "id": null
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_service_name() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
