//! WebSocket sink abstraction (transport primitive)
//!
//! Every connection owns one outbound queue. Handlers, the change relay and
//! the keepalive all push onto the queue through a [`WsSink`]; a single writer
//! task drains it into the socket so frames never interleave.
//!
//! Protocol semantics (result/error, one terminal per request) live in
//! `WsOpSink`.

use crate::server::protocol::ResponseEnvelope;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;

/// Handle to a connection's outbound queue
#[derive(Clone)]
pub struct WsSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl WsSink {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue a raw websocket message (pong/close/ping/relay)
    pub fn send_message_raw(&self, msg: Message) -> Result<(), WsSinkError> {
        self.tx.send(msg).map_err(|_| WsSinkError::Closed)
    }

    /// Queue a protocol response envelope as a JSON text message
    pub fn send_envelope(&self, envelope: ResponseEnvelope) -> Result<(), WsSinkError> {
        let json = serde_json::to_string(&envelope)
            .map_err(|e| WsSinkError::SerializationError(e.to_string()))?;
        self.send_message_raw(Message::Text(json))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drain the queue into the socket until either side goes away
pub async fn forward(
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut sender: SplitSink<WebSocket, Message>,
) {
    while let Some(msg) = outbound.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sender.send(msg).await {
            tracing::warn!("Failed to write to websocket: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
}

/// Errors that can occur when queueing messages
#[derive(Debug, Clone)]
pub enum WsSinkError {
    /// Failed to serialize message
    SerializationError(String),
    /// The connection's writer is gone
    Closed,
}

impl std::fmt::Display for WsSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WsSinkError::SerializationError(e) => write!(f, "Serialization error: {}", e),
            WsSinkError::Closed => write!(f, "Send error: connection closed"),
        }
    }
}

impl std::error::Error for WsSinkError {}
