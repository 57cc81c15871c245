//! Protocol types for the WebSocket API
//!
//! Request/response envelopes, error codes and the `system.info` payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Request Types
// =============================================================================

/// Request envelope sent by clients
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    /// Optional request correlation ID (client may omit; server generates and echoes)
    #[serde(default)]
    pub id: Option<String>,

    /// Operation to perform (e.g., "patient.register")
    pub method: String,

    /// Operation-specific parameters
    #[serde(default)]
    pub params: Value,
}

// =============================================================================
// Response Types
// =============================================================================

/// Response envelope sent by the server
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    /// Request correlation ID (client-provided or server-generated)
    pub id: String,

    #[serde(rename = "type")]
    pub response_type: ResponseType,

    pub data: Value,
}

impl ResponseEnvelope {
    pub fn result(id: String, data: impl Serialize) -> Self {
        Self {
            id,
            response_type: ResponseType::Result,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn error(id: String, error: ErrorData) -> Self {
        Self {
            id,
            response_type: ResponseType::Error,
            data: serde_json::to_value(error).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response (exactly once per request)
    Result,
    /// Failed request (terminal)
    Error,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorData {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ErrorCode::UnknownMethod,
            format!("Unknown method: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request message
    InvalidRequest,
    /// Method not found
    UnknownMethod,
    /// Invalid or missing parameters
    InvalidParams,
    /// Patient form rejected by validation
    ValidationFailed,
    /// Statement or session failure
    OperationFailed,
    /// Unexpected server error
    InternalError,
}

// =============================================================================
// System Info Types
// =============================================================================

/// Response for `system.info`
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub protocol_version: u32,
    pub server_version: String,
    pub build: BuildInfo,
    pub features: FeatureFlags,
    /// Where the registry lives (`:memory:` or a file path)
    pub database: String,
    /// Session lifecycle state at the time of the request
    pub session_state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub git_sha: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureFlags {
    /// Whether the server relays `DATA_UPDATED` messages between connections
    pub notifications: bool,
    pub auth_required: bool,
}

impl SystemInfo {
    pub fn new(database: impl Into<String>, session_state: impl Into<String>) -> Self {
        Self {
            protocol_version: 1,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            build: BuildInfo {
                git_sha: option_env!("GIT_SHA").unwrap_or("unknown").to_string(),
                timestamp: option_env!("BUILD_TIMESTAMP")
                    .unwrap_or("unknown")
                    .to_string(),
            },
            features: FeatureFlags {
                notifications: true,
                auth_required: false,
            },
            database: database.into(),
            session_state: session_state.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
