use std::sync::Arc;

use tracing::debug;

use super::{BroadcastChannel, ChangeMessage, ContextId, Envelope, Subscription, DATA_TOPIC};

/// One context's view of the change channel
#[derive(Clone)]
pub struct ChangeNotifier {
    context: ContextId,
    channel: Arc<dyn BroadcastChannel>,
}

impl ChangeNotifier {
    /// Join the channel as a fresh context
    pub fn new(channel: Arc<dyn BroadcastChannel>) -> Self {
        Self::for_context(ContextId::next(), channel)
    }

    pub fn for_context(context: ContextId, channel: Arc<dyn BroadcastChannel>) -> Self {
        Self { context, channel }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Tell every other context that registry data changed
    pub fn notify_data_changed(&self) {
        debug!("{} announcing data change", self.context);
        self.channel.publish(
            DATA_TOPIC,
            Envelope {
                origin: self.context,
                message: ChangeMessage::DataUpdated,
            },
        );
    }

    /// Run `handler` once for every change announced by another context
    pub fn on_data_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let own = self.context;
        self.channel.subscribe(
            DATA_TOPIC,
            Arc::new(move |envelope: Envelope| {
                if envelope.origin == own {
                    return;
                }
                match envelope.message {
                    ChangeMessage::DataUpdated => handler(),
                }
            }),
        )
    }
}
