//! Cross-context change notification
//!
//! A context that writes to the registry announces it with
//! [`ChangeNotifier::notify_data_changed`]. Every *other* context that has
//! registered a handler with [`ChangeNotifier::on_data_changed`] gets called
//! once per announcement. The channel in between holds no patient data and
//! keeps no backlog: a context that subscribes after an announcement never
//! sees it.
//!
//! ```text
//!  context A ──publish──▶ BroadcastChannel ──▶ context B handler
//!                               │
//!                               └──────────▶ context C handler
//!                           (A's own handler is skipped)
//! ```

mod bus;
mod notifier;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use bus::{BroadcastChannel, EnvelopeHandler, InProcessBus, Subscription};
pub use notifier::ChangeNotifier;

/// Topic that carries registry change messages
pub const DATA_TOPIC: &str = "patreg.data";

/// Message exchanged between contexts
///
/// Serialized as `{"type":"DATA_UPDATED"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeMessage {
    DataUpdated,
}

impl ChangeMessage {
    /// Parse a raw frame, returning `None` for anything that is not a bare
    /// change message. A frame with fields besides `type` is not one.
    pub fn from_json(text: &str) -> Option<ChangeMessage> {
        let frame: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text).ok()?;
        if frame.len() != 1 {
            return None;
        }
        serde_json::from_value(serde_json::Value::Object(frame)).ok()
    }

    pub fn to_json(&self) -> String {
        match self {
            ChangeMessage::DataUpdated => r#"{"type":"DATA_UPDATED"}"#.to_string(),
        }
    }
}

/// Identity of one open context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(u64);

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    /// Allocate an id no other context in this process holds
    pub fn next() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A message together with the context that sent it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: ContextId,
    pub message: ChangeMessage,
}
