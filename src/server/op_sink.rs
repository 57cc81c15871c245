//! Request-scoped sink with a terminal guard
//!
//! Each request gets exactly one terminal `result` or `error`. After the
//! first one, further sends return [`WsOpSinkError::TerminalAlreadySent`].

use crate::server::protocol::{ErrorData, ResponseEnvelope};
use crate::server::sink::{WsSink, WsSinkError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub enum WsOpSinkError {
    /// Serialization or queue failure
    Sink(WsSinkError),
    /// A terminal message (`result` / `error`) was already sent for this request
    TerminalAlreadySent,
}

impl std::fmt::Display for WsOpSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WsOpSinkError::Sink(e) => write!(f, "{e}"),
            WsOpSinkError::TerminalAlreadySent => write!(f, "terminal message already sent"),
        }
    }
}

impl std::error::Error for WsOpSinkError {}

impl From<WsSinkError> for WsOpSinkError {
    fn from(e: WsSinkError) -> Self {
        WsOpSinkError::Sink(e)
    }
}

/// Sink for the response to one request
#[derive(Clone)]
pub struct WsOpSink {
    sink: WsSink,
    id: String,
    terminal_sent: Arc<AtomicBool>,
}

impl WsOpSink {
    pub fn new(sink: WsSink, id: String) -> Self {
        Self {
            sink,
            id,
            terminal_sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request correlation id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_sent.load(Ordering::SeqCst)
    }

    pub fn send_result<T: Serialize>(&self, data: T) -> Result<(), WsOpSinkError> {
        self.mark_terminal()?;
        Ok(self
            .sink
            .send_envelope(ResponseEnvelope::result(self.id.clone(), data))?)
    }

    pub fn send_error(&self, error: ErrorData) -> Result<(), WsOpSinkError> {
        self.mark_terminal()?;
        Ok(self
            .sink
            .send_envelope(ResponseEnvelope::error(self.id.clone(), error))?)
    }

    fn mark_terminal(&self) -> Result<(), WsOpSinkError> {
        if self.terminal_sent.swap(true, Ordering::SeqCst) {
            return Err(WsOpSinkError::TerminalAlreadySent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_guard_allows_one_terminal() {
        let (sink, mut rx) = WsSink::channel();
        let op = WsOpSink::new(sink, "req-1".to_string());

        assert!(!op.is_terminal());
        op.send_result(serde_json::json!({"ok": true})).unwrap();
        assert!(op.is_terminal());
        assert!(matches!(
            op.send_error(ErrorData::internal("late")),
            Err(WsOpSinkError::TerminalAlreadySent)
        ));
        assert!(matches!(
            op.clone().send_result(1),
            Err(WsOpSinkError::TerminalAlreadySent)
        ));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
