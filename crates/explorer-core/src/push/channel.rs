use super::{BlockUpdate, PushChannel, PushError, PushMessage, Topic};
use crate::types::ChainInfo;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// In-process push channel backed by a `tokio::sync::broadcast` channel.
///
/// Transports (a websocket hub, a test harness) call [`BroadcastPushChannel::subscribe`] and
/// filter by [`Topic`]. Slow receivers lag and lose the oldest messages, which matches the
/// best-effort delivery contract.
#[derive(Clone)]
pub struct BroadcastPushChannel {
    sender: broadcast::Sender<Arc<PushMessage>>,
}

impl BroadcastPushChannel {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushMessage>> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn send(&self, message: PushMessage) -> Result<(), PushError> {
        let topic = message.topic;
        let receivers =
            self.sender.send(Arc::new(message)).map_err(|_| PushError::NoSubscribers(topic))?;
        trace!(topic = %topic, receivers = receivers, "push message sent");
        Ok(())
    }
}

impl Default for BroadcastPushChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl PushChannel for BroadcastPushChannel {
    async fn publish_block(&self, update: BlockUpdate) -> Result<(), PushError> {
        self.send(PushMessage::block(update))
    }

    async fn publish_chain_info(&self, info: Arc<ChainInfo>) -> Result<(), PushError> {
        self.send(PushMessage::chain_info(info))
    }
}
