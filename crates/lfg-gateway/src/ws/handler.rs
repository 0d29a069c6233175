//! WebSocket session handler.
//!
//! One connection carries one subscription stream. The session waits for a
//! subscribe request, acknowledges it, then forwards buffered updates until
//! either side goes away. Registry slots are held through RAII handles, so
//! every exit path (close, send failure, socket error) releases them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use lfg_types::{ApplicationUpdate, ClientInfo, GroupsUpdate};

use crate::domain::error::RpcError;
use crate::domain::methods::is_method_supported;
use crate::domain::requests::SubscribeApplicationsParams;
use crate::middleware::GatewayMetrics;
use crate::rpc::RpcHandlers;
use crate::ws::subscriptions::SubscriptionNotification;
use crate::ws::{ApplicationsSubscription, GroupsSubscription, SubscriptionRegistries};

/// Cap on concurrent subscription sessions.
pub struct SessionLimits {
    max_sessions: usize,
    active: AtomicUsize,
}

impl SessionLimits {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            active: AtomicUsize::new(0),
        }
    }

    /// Try to claim a session slot. The permit returns the slot when
    /// dropped.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SessionPermit> {
        let mut current = self.active.load(Ordering::Relaxed);
        loop {
            if current >= self.max_sessions {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(SessionPermit(Arc::clone(self))),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// RAII slot claim from [`SessionLimits`].
pub struct SessionPermit(Arc<SessionLimits>);

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Either flavor of subscription stream, with its release handle.
enum SubscriptionStream {
    Groups {
        rx: mpsc::Receiver<GroupsUpdate>,
        _handle: GroupsSubscription,
    },
    Applications {
        rx: mpsc::Receiver<ApplicationUpdate>,
        _handle: ApplicationsSubscription,
    },
}

impl SubscriptionStream {
    /// Next buffered update, serialized for the wire. `None` means the
    /// buffer closed.
    async fn next_update(&mut self) -> Option<serde_json::Value> {
        match self {
            SubscriptionStream::Groups { rx, .. } => {
                let update = rx.recv().await?;
                serde_json::to_value(&update).ok()
            }
            SubscriptionStream::Applications { rx, .. } => {
                let update = rx.recv().await?;
                serde_json::to_value(&update).ok()
            }
        }
    }
}

/// One authenticated WebSocket session.
pub struct WsSession {
    handlers: Arc<RpcHandlers>,
    registries: Arc<SubscriptionRegistries>,
    metrics: Arc<GatewayMetrics>,
    client: ClientInfo,
    _permit: SessionPermit,
}

impl WsSession {
    pub fn new(
        handlers: Arc<RpcHandlers>,
        registries: Arc<SubscriptionRegistries>,
        metrics: Arc<GatewayMetrics>,
        client: ClientInfo,
        permit: SessionPermit,
    ) -> Self {
        Self {
            handlers,
            registries,
            metrics,
            client,
            _permit: permit,
        }
    }

    /// Drive the session to completion.
    pub async fn run(self, socket: WebSocket) {
        self.metrics.record_session_open();
        let metrics = Arc::clone(&self.metrics);
        debug!(account = %self.client.account, "subscription session opened");
        self.serve(socket).await;
        debug!("subscription session closed");
        metrics.record_session_close();
    }

    async fn serve(self, mut socket: WebSocket) {
        // Phase one: wait for a subscribe request.
        let (subscription_id, mut stream) = loop {
            match socket.recv().await {
                Some(Ok(Message::Text(text))) => match self.handle_subscribe(&text).await {
                    Ok((id, subscription_id, stream)) => {
                        let ack = json_rpc_result(id, serde_json::json!(subscription_id));
                        if socket.send(Message::Text(ack)).await.is_err() {
                            return;
                        }
                        break (subscription_id, stream);
                    }
                    Err((id, err)) => {
                        if socket.send(Message::Text(json_rpc_error(id, &err))).await.is_err() {
                            return;
                        }
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket error before subscribe");
                    return;
                }
            }
        };

        // Phase two: forward buffered updates until either side goes away.
        // The stream's release handle drops with it on every exit path.
        loop {
            tokio::select! {
                update = stream.next_update() => match update {
                    Some(result) => {
                        let notification =
                            SubscriptionNotification::new(subscription_id.clone(), result);
                        let text = match serde_json::to_string(&notification) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "failed to serialize notification");
                                continue;
                            }
                        };
                        if let Err(e) = socket.send(Message::Text(text)).await {
                            warn!(error = %e, "failed to push update, closing session");
                            return;
                        }
                    }
                    None => return,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Text(_))) => {
                        let err = RpcError::invalid_request("subscription already active");
                        if socket.send(Message::Text(json_rpc_error(None, &err))).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket error");
                        return;
                    }
                },
            }
        }
    }

    /// Parse and execute a subscribe request.
    #[allow(clippy::type_complexity)]
    async fn handle_subscribe(
        &self,
        text: &str,
    ) -> Result<
        (Option<serde_json::Value>, String, SubscriptionStream),
        (Option<serde_json::Value>, RpcError),
    > {
        let request: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return Err((None, RpcError::parse_error(e.to_string()))),
        };

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request.get("params");

        let stream = match method {
            "lfg_subscribeGroups" => {
                let (rx, handle) = self.handlers.groups.subscribe_groups(&self.client);
                SubscriptionStream::Groups { rx, _handle: handle }
            }
            "lfg_subscribeGroupApplications" => {
                let params: SubscribeApplicationsParams = match params {
                    Some(value) => serde_json::from_value(value.clone())
                        .map_err(|e| (id.clone(), RpcError::invalid_params(e.to_string())))?,
                    None => {
                        return Err((id, RpcError::invalid_params("missing params")));
                    }
                };
                let (rx, handle) = self
                    .handlers
                    .applications
                    .subscribe_group_applications(&self.client, &params.group_id)
                    .await
                    .map_err(|err| (id.clone(), err))?;
                SubscriptionStream::Applications { rx, _handle: handle }
            }
            other if is_method_supported(other) => {
                return Err((
                    id,
                    RpcError::invalid_request("unary methods are served on the HTTP endpoint"),
                ));
            }
            other => return Err((id, RpcError::method_not_found(other))),
        };

        Ok((id, self.registries.next_subscription_id(), stream))
    }
}

fn json_rpc_result(id: Option<serde_json::Value>, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
    .to_string()
}

fn json_rpc_error(id: Option<serde_json::Value>, err: &RpcError) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": err
    })
    .to_string()
}
