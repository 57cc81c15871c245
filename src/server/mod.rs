//! WebSocket server
//!
//! Exposes the registry to clients over a WebSocket API and relays change
//! notifications between them. Every connection is its own context on the
//! change bus: a write made through one connection (or a bare
//! `{"type":"DATA_UPDATED"}` frame sent by it) is forwarded to every other
//! connection as `{"type":"DATA_UPDATED"}`, never back to the sender.
//!
//! # Submodules
//!
//! - `protocol` - request/response envelopes and error codes
//! - `handler` - handler trait and shared context
//! - `sink` - per-connection outbound queue
//! - `op_sink` - request-scoped sink with a single terminal response
//! - `router` - method registry and dispatcher
//! - `handlers` - method implementations
//!
//! # Connection lifecycle
//!
//! The connection loop enforces:
//! - max message size (`ServerConfig.max_message_size`)
//! - periodic ping keepalive (`ServerConfig.ping_interval_secs`)
//! - idle timeout (`ServerConfig.connection_timeout_secs`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use patreg::server::{create_router, start_server, ServerConfig, WsContext};
//!
//! let context = WsContext::from_config(config.clone());
//! let server_config = ServerConfig::from_config(&config);
//! start_server(create_router(), context, server_config).await?;
//! ```

pub mod handler;
pub mod handlers;
pub mod op_sink;
pub mod protocol;
pub mod router;
pub mod sink;

pub use handler::{WsContext, WsError, WsMethod, WsRequest, WsResult};
pub use op_sink::{WsOpSink, WsOpSinkError};
pub use protocol::{ErrorCode, ErrorData, RequestEnvelope, ResponseEnvelope, ResponseType, SystemInfo};
pub use router::{Dispatcher, Router};
pub use sink::{WsSink, WsSinkError};

use crate::config::PatregConfig;
use crate::notify::{ChangeMessage, ChangeNotifier, ContextId};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router as AxumRouter,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

// =============================================================================
// Server Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,

    pub port: u16,

    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Idle timeout in seconds
    pub connection_timeout_secs: u64,

    pub ping_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            max_message_size: 1024 * 1024, // 1MB
            connection_timeout_secs: 300,  // 5 minutes
            ping_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address and port from the registry configuration
    pub fn from_config(config: &PatregConfig) -> Self {
        Self::default()
            .with_address(config.server_address.clone())
            .with_port(config.server_port)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// =============================================================================
// Router Creation
// =============================================================================

/// Create a router with all handlers registered
pub fn create_router() -> Router {
    use handlers::*;

    let mut router = Router::new();

    router.register::<SystemInfoHandler>();

    router.register::<PatientRegisterHandler>();
    router.register::<PatientUpdateHandler>();
    router.register::<PatientGetHandler>();
    router.register::<PatientListHandler>();
    router.register::<PatientSearchHandler>();

    router.register::<QueryExecuteHandler>();
    router.register::<QueryExportHandler>();

    router.register::<DashboardStatsHandler>();

    router
}

// =============================================================================
// Server State
// =============================================================================

#[derive(Clone)]
pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<ServerConfig>,
}

pub fn create_axum_router(state: ServerState) -> AxumRouter {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    AxumRouter::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Relay a bare change frame to the other connections
///
/// Returns `false` when `text` is not a change message and should be
/// dispatched as a request.
fn relay_change(text: &str, notifier: &ChangeNotifier) -> bool {
    match ChangeMessage::from_json(text) {
        Some(ChangeMessage::DataUpdated) => {
            notifier.notify_data_changed();
            true
        }
        None => false,
    }
}

async fn handle_text(state: &ServerState, notifier: &ChangeNotifier, text: &str, sink: &WsSink) {
    if relay_change(text, notifier) {
        tracing::debug!("{} relayed a change notification", notifier.context());
        return;
    }
    tracing::debug!("Received message: {}", text);
    state
        .dispatcher
        .dispatch(text, sink.clone(), notifier.context())
        .await;
}

async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (sender, mut receiver) = socket.split();
    let (sink, outbound) = WsSink::channel();
    let writer = tokio::spawn(sink::forward(outbound, sender));

    let context = ContextId::next();
    let notifier = state.dispatcher.context().notifier(context);
    let relay = {
        let sink = sink.clone();
        notifier.on_data_changed(move || {
            let frame = Message::Text(ChangeMessage::DataUpdated.to_json());
            if let Err(e) = sink.send_message_raw(frame) {
                tracing::debug!("Dropping change notification: {}", e);
            }
        })
    };

    tracing::info!("WebSocket connection established ({})", context);

    let max_message_size = state.config.max_message_size;
    let ping_interval = Duration::from_secs(state.config.ping_interval_secs.max(1));
    let idle_timeout = Duration::from_secs(state.config.connection_timeout_secs.max(1));

    let mut last_activity = Instant::now();
    let mut next_ping = Instant::now() + ping_interval;

    loop {
        tokio::select! {
            maybe_msg = receiver.next() => {
                let Some(msg) = maybe_msg else {
                    break;
                };

                match msg {
                    Ok(Message::Text(text)) => {
                        if text.len() > max_message_size {
                            tracing::warn!(
                                "Closing connection: text message too large ({} > {} bytes)",
                                text.len(),
                                max_message_size
                            );
                            let _ = sink.send_message_raw(Message::Close(None));
                            break;
                        }
                        last_activity = Instant::now();
                        handle_text(&state, &notifier, &text, &sink).await;
                    }
                    Ok(Message::Binary(data)) => {
                        if data.len() > max_message_size {
                            tracing::warn!(
                                "Closing connection: binary message too large ({} > {} bytes)",
                                data.len(),
                                max_message_size
                            );
                            let _ = sink.send_message_raw(Message::Close(None));
                            break;
                        }
                        last_activity = Instant::now();

                        match String::from_utf8(data) {
                            Ok(text) => handle_text(&state, &notifier, &text, &sink).await,
                            Err(_) => {
                                tracing::warn!("Received non-UTF8 binary message, ignoring");
                            }
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        last_activity = Instant::now();
                        if let Err(e) = sink.send_message_raw(Message::Pong(data)) {
                            tracing::warn!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {
                        last_activity = Instant::now();
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket connection closed by client ({})", context);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(next_ping) => {
                if last_activity.elapsed() > idle_timeout {
                    tracing::info!(
                        "Closing connection due to idle timeout (>{}s)",
                        idle_timeout.as_secs()
                    );
                    let _ = sink.send_message_raw(Message::Close(None));
                    break;
                }

                if let Err(e) = sink.send_message_raw(Message::Ping(Vec::new())) {
                    tracing::warn!("Failed to send ping: {}", e);
                    break;
                }

                next_ping = Instant::now() + ping_interval;
            }
        }
    }

    // the writer stops once every sink clone is gone
    drop(relay);
    drop(sink);
    let _ = writer.await;
    tracing::info!("WebSocket connection closed ({})", context);
}

// =============================================================================
// Server Startup
// =============================================================================

pub async fn start_server(
    router: Router,
    context: WsContext,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(router, context);

    let state = ServerState {
        dispatcher: Arc::new(dispatcher),
        config: Arc::new(config.clone()),
    };

    let app = create_axum_router(state);

    let bind_address = config.bind_address();
    tracing::info!("Starting WebSocket server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
