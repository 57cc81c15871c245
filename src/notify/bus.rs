//! Broadcast channel abstraction and the in-process implementation

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Envelope;

/// Callback invoked for every envelope delivered on a topic
pub type EnvelopeHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Shared intermediary between contexts
///
/// Delivery is best effort and fire and forget. Implementations keep no
/// backlog for subscribers that join later.
pub trait BroadcastChannel: Send + Sync {
    /// Send an envelope to every current subscriber of `topic`
    fn publish(&self, topic: &str, envelope: Envelope);

    /// Register a handler for `topic`; delivery stops when the returned
    /// [`Subscription`] is dropped
    fn subscribe(&self, topic: &str, handler: EnvelopeHandler) -> Subscription;
}

/// Handle to a live subscription
///
/// Dropping it stops delivery to the handler.
#[must_use = "dropping a Subscription stops delivery"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// In-process broadcast channel backed by one tokio `broadcast` per topic
pub struct InProcessBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl InProcessBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Envelope> {
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live receivers on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.sender(topic).receiver_count()
    }
}

impl BroadcastChannel for InProcessBus {
    fn publish(&self, topic: &str, envelope: Envelope) {
        // no receivers is not an error: nobody else is open
        match self.sender(topic).send(envelope) {
            Ok(receivers) => debug!(
                "published {:?} from {} to {} receiver(s) on {}",
                envelope.message, envelope.origin, receivers, topic
            ),
            Err(_) => debug!("no receivers on {}", topic),
        }
    }

    fn subscribe(&self, topic: &str, handler: EnvelopeHandler) -> Subscription {
        let mut rx = self.sender(topic).subscribe();
        let topic = topic.to_string();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => handler(envelope),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("subscriber on {} lagged, skipped {} message(s)", topic, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription::from_task(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChangeMessage, ContextId};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn envelope(origin: ContextId) -> Envelope {
        Envelope {
            origin,
            message: ChangeMessage::DataUpdated,
        }
    }

    fn forwarding(tx: mpsc::UnboundedSender<Envelope>) -> EnvelopeHandler {
        Arc::new(move |envelope| {
            let _ = tx.send(envelope);
        })
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = InProcessBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe("t", forwarding(tx));

        let origin = ContextId::next();
        bus.publish("t", envelope(origin));

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.origin, origin);
    }

    #[tokio::test]
    async fn test_topics_are_separate() {
        let bus = InProcessBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe("a", forwarding(tx));

        bus.publish("b", envelope(ContextId::next()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_backlog_for_late_subscribers() {
        let bus = InProcessBus::default();
        bus.publish("t", envelope(ContextId::next()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe("t", forwarding(tx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropping_subscription_stops_delivery() {
        let bus = InProcessBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus.subscribe("t", forwarding(tx));
        assert!(sub.is_active());
        drop(sub);

        // let the aborted task release its receiver
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(bus.subscriber_count("t"), 0);

        bus.publish("t", envelope(ContextId::next()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_continues() {
        let bus = InProcessBus::new(2);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe("t", forwarding(tx));

        let origin = ContextId::next();
        for _ in 0..10 {
            bus.publish("t", envelope(origin));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert!(received >= 1);

        bus.publish("t", envelope(origin));
        let again = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(again.unwrap().is_some());
    }
}
