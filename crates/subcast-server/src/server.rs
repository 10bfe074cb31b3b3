//! `SubcastServer` — the axum HTTP + WebSocket front of the relay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use bytes::Bytes;
use subcast_settings::ServerSettings;
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::health::{self, HealthResponse};
use crate::ingress::{MessagePublisher, SEND_RESPONSE, SendRequest};
use crate::shutdown::ShutdownController;
use crate::websocket::{self, broadcast::BroadcastManager};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Sink for ingress messages.
    pub publisher: Arc<dyn MessagePublisher>,
    /// Broadcast registry for connected clients.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown controller.
    pub shutdown: Arc<ShutdownController>,
    /// When the server started.
    pub start_time: Instant,
    /// Per-connection send queue capacity.
    pub send_queue: usize,
    /// WebSocket ping interval.
    pub heartbeat_interval: Duration,
}

/// The relay server.
pub struct SubcastServer {
    config: ServerSettings,
    publisher: Arc<dyn MessagePublisher>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl SubcastServer {
    /// Create a new server.
    pub fn new(config: ServerSettings, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self {
            config,
            publisher,
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    ///
    /// Cross-origin requests are allowed from any origin.
    pub fn router(&self) -> Router {
        let state = AppState {
            publisher: self.publisher.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            // mpsc::channel panics on a zero capacity
            send_queue: self.config.send_queue.max(1),
            heartbeat_interval: Duration::from_secs(self.config.heartbeat_interval_secs),
        };

        Router::new()
            .route("/send", post(send_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(CorsLayer::permissive())
    }

    /// Bind the listener and start serving.
    ///
    /// Returns the bound address (useful with port 0) and the serve task's
    /// handle. The task exits once the shutdown token fires and in-flight
    /// connections have drained.
    pub async fn listen(
        &self,
    ) -> std::io::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned());
            if let Err(e) = serve.await {
                warn!(error = %e, "server exited with error");
            }
        });

        Ok((local_addr, handle))
    }

    /// Get the broadcast registry.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown controller.
    pub fn shutdown(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerSettings {
        &self.config
    }
}

/// POST /send — publish the message field to the bus.
///
/// The response body is fixed regardless of publish outcome; a failed
/// publish is logged and otherwise swallowed.
async fn send_handler(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> &'static str {
    debug!(len = req.message.len(), "ingress message");
    if let Err(e) = state.publisher.publish(Bytes::from(req.message)).await {
        warn!(error = %e, "publish failed, message lost");
    }
    SEND_RESPONSE
}

/// GET /ws — upgrade to a WebSocket and register the client.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket::handle_socket(socket, state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count();
    Json(health::health_check(state.start_time, connections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::PublishError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct RecordingPublisher {
        tx: mpsc::UnboundedSender<Bytes>,
    }

    #[async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
            self.tx.send(payload).map_err(|_| PublishError::Closed)
        }
    }

    fn make_server() -> (SubcastServer, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = ServerSettings {
            port: 0,
            ..ServerSettings::default()
        };
        let server = SubcastServer::new(config, Arc::new(RecordingPublisher { tx }));
        (server, rx)
    }

    fn send_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/send")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let (server, _rx) = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
    }

    #[tokio::test]
    async fn broadcast_registry_accessible() {
        let (server, _rx) = make_server();
        assert_eq!(server.broadcast().connection_count(), 0);
    }

    #[test]
    fn shutdown_controller_accessible() {
        let (server, _rx) = make_server();
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn send_returns_fixed_body_and_publishes() {
        let (server, mut rx) = make_server();
        let app = server.router();

        let resp = app
            .oneshot(send_request(r#"{"message":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        assert_eq!(&body[..], b"Message sent");
        assert_eq!(&rx.recv().await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn send_forwards_empty_message() {
        let (server, mut rx) = make_server();
        let app = server.router();

        let resp = app
            .oneshot(send_request(r#"{"message":""}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rx.recv().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_succeeds_even_when_publish_fails() {
        let (server, rx) = make_server();
        drop(rx); // publisher backend gone
        let app = server.router();

        let resp = app
            .oneshot(send_request(r#"{"message":"lost"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        assert_eq!(&body[..], b"Message sent");
    }

    #[tokio::test]
    async fn send_rejects_invalid_json() {
        let (server, _rx) = make_server();
        let app = server.router();

        let resp = app.oneshot(send_request("{not json")).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (server, _rx) = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (server, _rx) = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let (server, _rx) = make_server();
        let app = server.router();

        // A plain GET without upgrade headers must not be a 404 — the route
        // exists — but it cannot succeed either.
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn shutdown_propagates_to_controller() {
        let (server, _rx) = make_server();
        let shutdown = server.shutdown().clone();
        assert!(!shutdown.is_shutting_down());
        shutdown.trigger();
        assert!(server.shutdown().is_shutting_down());
    }
}
