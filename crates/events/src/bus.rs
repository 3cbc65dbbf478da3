//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus moves opaque, keyed byte payloads between named topics. It makes
//! minimal assumptions about the transport:
//!
//! - **At-least-once delivery**: messages may be delivered more than once
//! - **Per-topic ordering only**: there is no ordering across topics
//! - **No persistence**: the bus distributes, it does not store
//!
//! Consumers must tolerate duplicates and cross-topic reordering.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// A keyed message on a topic.
///
/// The key is used by partitioned transports to keep messages for the same
/// entity in order (the pricing engine keys by product id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    key: String,
    payload: Vec<u8>,
    /// Transport id to acknowledge once handled (`None` for transports
    /// without acknowledgement).
    delivery_id: Option<String>,
}

impl BusMessage {
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            delivery_id: None,
        }
    }

    pub fn with_delivery_id(mut self, id: impl Into<String>) -> Self {
        self.delivery_id = Some(id.into());
        self
    }

    pub fn delivery_id(&self) -> Option<&str> {
        self.delivery_id.as_deref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A subscription to one topic.
///
/// ## Usage Pattern
///
/// ```ignore
/// let mut sub = bus.subscribe("order.events");
/// loop {
///     tokio::select! {
///         _ = shutdown.changed() => break,
///         msg = sub.recv() => match msg {
///             Some(msg) => process(msg).await,
///             None => break, // bus closed
///         },
///     }
/// }
/// ```
///
/// `recv` is cancellation-safe, so racing it against a shutdown signal never
/// loses a message.
///
/// Durable transports expect [`Subscription::ack`] once a message has been
/// handled; until then the message stays pending and is redelivered after a
/// restart.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<BusMessage>,
    acks: Option<mpsc::UnboundedSender<String>>,
}

impl Subscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<BusMessage>) -> Self {
        Self { receiver, acks: None }
    }

    /// Subscription whose acknowledgements are forwarded to `acks`.
    pub fn with_acks(
        receiver: mpsc::UnboundedReceiver<BusMessage>,
        acks: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            receiver,
            acks: Some(acks),
        }
    }

    /// Mark the message carrying `delivery_id` as handled. No-op when the
    /// transport does not acknowledge.
    pub fn ack(&self, delivery_id: &str) {
        if let Some(acks) = &self.acks {
            // The reader may already be gone; the entry then stays pending.
            let _ = acks.send(delivery_id.to_string());
        }
    }

    /// Wait for the next message. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }

    /// Try to receive a message without waiting.
    pub fn try_recv(&mut self) -> Result<BusMessage, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Transport-agnostic publish/subscribe port.
///
/// `publish` returning `Ok` means the transport accepted the message locally;
/// there is no delivery confirmation beyond that.
///
/// The trait requires `Send + Sync` so a single bus can be shared by the
/// consumer workers and the request handlers.
#[async_trait]
pub trait EventBus: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    async fn publish(&self, topic: &str, message: BusMessage) -> Result<(), Self::Error>;

    fn subscribe(&self, topic: &str) -> Subscription;
}

#[async_trait]
impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    type Error = B::Error;

    async fn publish(&self, topic: &str, message: BusMessage) -> Result<(), Self::Error> {
        (**self).publish(topic, message).await
    }

    fn subscribe(&self, topic: &str) -> Subscription {
        (**self).subscribe(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_forwards_delivery_id_to_transport() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let sub = Subscription::with_acks(rx, ack_tx);

        let msg = BusMessage::new("k", b"durable".to_vec()).with_delivery_id("1-0");
        sub.ack(msg.delivery_id().unwrap());

        assert_eq!(ack_rx.try_recv().unwrap(), "1-0");
        assert!(ack_rx.try_recv().is_err());
    }

    #[test]
    fn plain_messages_carry_no_delivery_id() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::new(rx);
        assert_eq!(BusMessage::new("k", Vec::new()).delivery_id(), None);
        sub.ack("1-0");
    }
}
