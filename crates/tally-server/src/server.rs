//! `TallyServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tally_store::CounterStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::router::EventRouter;
use crate::service::CounterService;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::handler;
use crate::websocket::registry::ConnectionManager;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<EventRouter>,
    pub connections: Arc<ConnectionManager>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub config: Arc<ServerConfig>,
    pub start_time: Instant,
    /// Present when a global Prometheus recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The tally server.
pub struct TallyServer {
    state: AppState,
}

impl TallyServer {
    /// Wire the connection manager, broadcaster, service and router over `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn CounterStore>) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let broadcaster = Broadcaster::new(Arc::clone(&connections), config.broadcast_scope);
        let router = EventRouter::new(CounterService::new(store), broadcaster, config.report_not_found);
        Self {
            state: AppState {
                router: Arc::new(router),
                connections,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                config: Arc::new(config),
                start_time: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Serve `/metrics` from this recorder handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .layer(cors_layer(&self.state.config.client_origin))
            .layer(TraceLayer::new_for_http())
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.state.connections
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Bind and serve in the background until the shutdown token fires.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let addr = self.state.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.state.shutdown.token();
        let join = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server exited with error");
            }
        });

        info!(
            addr = %local_addr,
            scope = ?self.state.config.broadcast_scope,
            "tally server listening"
        );

        Ok(ServerHandle {
            local_addr,
            connections: Arc::clone(&self.state.connections),
            shutdown: Arc::clone(&self.state.shutdown),
            join,
        })
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    connections: Arc<ConnectionManager>,
    shutdown: Arc<ShutdownCoordinator>,
    join: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Cancel every connection and wait up to `timeout` for the server to drain.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        self.shutdown.graceful_shutdown(vec![self.join], timeout).await;
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "invalid client origin, cross-origin requests disabled");
            layer
        }
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let live = state.connections.connection_count().await;
    if live >= state.config.max_connections {
        warn!(live, limit = state.config.max_connections, "connection limit reached, refusing upgrade");
        metrics::counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }
    let max_message_size = state.config.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handler::handle_socket(socket, state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connections = state.connections.connection_count().await;
    let database_ok = state.router.service().store_reachable().await;
    let resp = health::health_check(state.start_time, connections, database_ok);
    let status = if resp.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(resp))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
