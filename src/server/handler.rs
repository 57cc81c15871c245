//! Handler trait and context module for WebSocket methods
//!
//! `WsMethod` is implemented by every method handler. `WsContext` carries the
//! resources all connections share: the configuration, the one session
//! manager and the change bus.

use crate::config::PatregConfig;
use crate::database::SessionManager;
use crate::lens::RegistryError;
use crate::notify::{BroadcastChannel, ChangeNotifier, ContextId, InProcessBus};
use crate::server::op_sink::WsOpSink;
use crate::server::protocol::{ErrorCode, ErrorData, RequestEnvelope};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// Context
// =============================================================================

/// Resources shared by every connection
#[derive(Clone)]
pub struct WsContext {
    pub config: PatregConfig,

    /// The registry session; opened on the first request that needs it
    pub sessions: Arc<SessionManager>,

    /// Change bus every connection joins as its own context
    pub bus: Arc<dyn BroadcastChannel>,
}

impl WsContext {
    pub fn from_config(config: PatregConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(config.session_options()));
        Self::with_sessions(config, sessions)
    }

    pub fn with_sessions(config: PatregConfig, sessions: Arc<SessionManager>) -> Self {
        Self {
            config,
            sessions,
            bus: Arc::new(InProcessBus::default()),
        }
    }

    /// A context backed by a private in-memory registry
    pub fn in_memory() -> Self {
        let config = PatregConfig {
            database_path: crate::config::IN_MEMORY.to_string(),
            ..Default::default()
        };
        Self::from_config(config)
    }

    /// The notifier a connection uses to announce and hear changes
    pub fn notifier(&self, context: ContextId) -> ChangeNotifier {
        ChangeNotifier::for_context(context, Arc::clone(&self.bus))
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }
}

impl Default for WsContext {
    fn default() -> Self {
        Self::from_config(PatregConfig::default())
    }
}

// =============================================================================
// Request
// =============================================================================

/// Processed WebSocket request with guaranteed ID
#[derive(Debug, Clone)]
pub struct WsRequest {
    /// Request correlation ID (client-provided or server-generated)
    pub id: String,

    pub method: String,

    pub params: Value,

    /// Connection the request arrived on
    pub origin: ContextId,
}

impl WsRequest {
    /// Build a request from an envelope, generating an ID if not provided
    pub fn from_envelope(envelope: RequestEnvelope, origin: ContextId) -> Self {
        let id = envelope
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            id,
            method: envelope.method,
            params: envelope.params,
            origin,
        }
    }
}

// =============================================================================
// Handler Trait
// =============================================================================

pub type WsResult<T> = Result<T, WsError>;

#[derive(Debug, Clone)]
pub struct WsError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

impl WsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn to_error_data(&self) -> ErrorData {
        match &self.details {
            Some(details) => {
                ErrorData::with_details(self.code, self.message.clone(), details.clone())
            }
            None => ErrorData::new(self.code, self.message.clone()),
        }
    }
}

impl std::fmt::Display for WsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for WsError {}

impl From<RegistryError> for WsError {
    fn from(err: RegistryError) -> Self {
        let code = match &err {
            RegistryError::Validation(_) => ErrorCode::ValidationFailed,
            RegistryError::InvalidParams(_) => ErrorCode::InvalidParams,
            _ => ErrorCode::OperationFailed,
        };
        Self::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for WsError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_params(err.to_string())
    }
}

impl From<crate::server::op_sink::WsOpSinkError> for WsError {
    fn from(err: crate::server::op_sink::WsOpSinkError) -> Self {
        Self::internal(err.to_string())
    }
}

/// A WebSocket method: its name, parameters and behavior
#[async_trait]
pub trait WsMethod: Send + Sync + 'static {
    /// Fully qualified method name, e.g., "patient.register"
    const METHOD: &'static str;

    type Params: DeserializeOwned + Send;

    /// Checks beyond JSON deserialization
    fn validate(_params: &Self::Params) -> WsResult<()> {
        Ok(())
    }

    /// Execute the method and send exactly one result through the sink
    async fn handle(
        ctx: Arc<WsContext>,
        req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()>;
}

// =============================================================================
// Handler Registration
// =============================================================================

/// Type-erased handler function
pub type DynHandler = Box<
    dyn Fn(Arc<WsContext>, WsRequest, WsOpSink) -> futures::future::BoxFuture<'static, WsResult<()>>
        + Send
        + Sync,
>;

pub fn make_handler<M: WsMethod>() -> DynHandler {
    Box::new(move |ctx, req, sink| {
        Box::pin(async move {
            let params: M::Params = if req.params.is_null() {
                serde_json::from_value(Value::Object(Default::default()))?
            } else {
                serde_json::from_value(req.params.clone())?
            };
            M::validate(&params)?;
            M::handle(ctx, req, params, sink).await
        })
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::registration::ValidationError;

    #[test]
    fn test_ws_context_from_config() {
        let config = PatregConfig::default();
        let ctx = WsContext::from_config(config.clone());
        assert_eq!(ctx.page_size(), config.page_size);
        assert_eq!(ctx.sessions.options().location(), config.database_path);
    }

    #[test]
    fn test_notifiers_share_the_bus() {
        let ctx = WsContext::in_memory();
        let a = ctx.notifier(ContextId::next());
        let b = ctx.notifier(ContextId::next());
        assert_ne!(a.context(), b.context());
    }

    #[test]
    fn test_ws_request_from_envelope() {
        let origin = ContextId::next();
        let envelope = RequestEnvelope {
            id: Some("req-1".to_string()),
            method: "patient.get".to_string(),
            params: serde_json::json!({"id": 1}),
        };
        let req = WsRequest::from_envelope(envelope, origin);
        assert_eq!(req.id, "req-1");
        assert_eq!(req.origin, origin);

        let envelope = RequestEnvelope {
            id: None,
            method: "patient.get".to_string(),
            params: serde_json::json!({}),
        };
        let req = WsRequest::from_envelope(envelope, origin);
        assert!(!req.id.is_empty());
        assert_ne!(req.id, "req-1");
    }

    #[test]
    fn test_ws_error_from_registry_error() {
        let err: WsError = RegistryError::from(ValidationError::InvalidEmail).into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.message, "Please enter a valid email address");

        let err: WsError = RegistryError::InvalidParams("query is empty".to_string()).into();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(err.to_error_data().code, ErrorCode::InvalidParams);
    }
}
