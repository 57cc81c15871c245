//! Registry-based method dispatch
//!
//! The `Router` maps method names to handlers; the `Dispatcher` parses a raw
//! frame, finds the handler and guarantees the request gets one terminal
//! response.

use crate::notify::ContextId;
use crate::server::handler::{make_handler, DynHandler, WsContext, WsMethod, WsRequest};
use crate::server::op_sink::WsOpSink;
use crate::server::protocol::{ErrorData, RequestEnvelope};
use crate::server::sink::WsSink;
use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// Router
// =============================================================================

pub struct Router {
    handlers: HashMap<&'static str, DynHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<M: WsMethod>(&mut self) -> &mut Self {
        self.handlers.insert(M::METHOD, make_handler::<M>());
        self
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn get_handler(&self, method: &str) -> Option<&DynHandler> {
        self.handlers.get(method)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Message Dispatcher
// =============================================================================

pub struct Dispatcher {
    router: Arc<Router>,
    context: Arc<WsContext>,
}

impl Dispatcher {
    pub fn new(router: Router, context: WsContext) -> Self {
        Self {
            router: Arc::new(router),
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &Arc<WsContext> {
        &self.context
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Dispatch one text frame received on the connection `origin`
    pub async fn dispatch(&self, message: &str, sink: WsSink, origin: ContextId) {
        let envelope: RequestEnvelope = match serde_json::from_str(message) {
            Ok(env) => env,
            Err(e) => {
                let id = uuid::Uuid::new_v4().to_string();
                let _ = WsOpSink::new(sink, id).send_error(ErrorData::invalid_request(format!(
                    "Failed to parse request: {}",
                    e
                )));
                return;
            }
        };

        let request = WsRequest::from_envelope(envelope, origin);
        let op_sink = WsOpSink::new(sink, request.id.clone());

        let Some(handler) = self.router.get_handler(&request.method) else {
            let _ = op_sink.send_error(ErrorData::unknown_method(&request.method));
            return;
        };

        tracing::debug!("{} -> {}", origin, request.method);
        let ctx = Arc::clone(&self.context);
        match handler(ctx, request, op_sink.clone()).await {
            Ok(()) if !op_sink.is_terminal() => {
                let _ = op_sink.send_error(ErrorData::internal("handler sent no response"));
            }
            Ok(()) => {}
            Err(e) => {
                tracing::debug!("request {} failed: {}", op_sink.id(), e);
                let _ = op_sink.send_error(e.to_error_data());
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
