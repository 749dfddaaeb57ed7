//! Inbound stream abstraction.
//!
//! A [`Subscription`] is the recorder's only view of the publish/subscribe
//! transport: an endless sequence of `(topic, payload)` pairs. Connecting,
//! topic filtering on the wire and framing are the implementation's business.

use bytes::Bytes;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by an inbound stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting to the publisher failed.
    #[error("failed to connect to {endpoint}: {message}")]
    Connect {
        /// Publisher endpoint.
        endpoint: String,
        /// Description of the failure.
        message: String,
    },

    /// Registering the topic filter failed.
    #[error("failed to subscribe to topic '{topic}': {message}")]
    Subscribe {
        /// Topic filter.
        topic: String,
        /// Description of the failure.
        message: String,
    },

    /// A single receive failed. The stream remains usable.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The stream has ended for good.
    #[error("inbound stream closed")]
    Closed,
}

/// One message from the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: Bytes,
    /// Opaque payload. Only this is recorded.
    pub payload: Bytes,
}

impl InboundMessage {
    /// Creates a new message.
    pub fn new(topic: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns `true` if the topic matches a subscription filter.
    ///
    /// Filters are prefixes, as in pub/sub subscriptions; the empty filter
    /// matches everything.
    pub fn matches(&self, filter: &[u8]) -> bool {
        self.topic.starts_with(filter)
    }
}

/// A subscription to one topic of a remote publisher.
///
/// `recv` must be cancel-safe: the recorder polls it inside `select!` and
/// drops the future when shutdown or a statistics tick wins.
pub trait Subscription: Send {
    /// Waits for the next message.
    ///
    /// Returns [`TransportError::Closed`] once the stream has ended; any
    /// other error is transient.
    fn recv(&mut self) -> impl Future<Output = TransportResult<InboundMessage>> + Send;

    /// Disconnects from the publisher and releases stream resources.
    fn close(&mut self) -> impl Future<Output = TransportResult<()>> + Send;
}

/// The sending half of a [`ChannelSubscription`].
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<TransportResult<InboundMessage>>,
}

impl ChannelPublisher {
    /// Publishes a message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the subscription is gone.
    pub async fn publish(
        &self,
        topic: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> TransportResult<()> {
        self.sender
            .send(Ok(InboundMessage::new(topic, payload)))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Delivers a transient receive error to the subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the subscription is gone.
    pub async fn fail(&self, message: impl Into<String>) -> TransportResult<()> {
        self.sender
            .send(Err(TransportError::Receive(message.into())))
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// An in-process subscription fed through a bounded channel.
///
/// Useful for embedding the recorder behind another transport and for
/// tests. The stream ends when every [`ChannelPublisher`] is dropped.
#[derive(Debug)]
pub struct ChannelSubscription {
    receiver: mpsc::Receiver<TransportResult<InboundMessage>>,
}

impl ChannelSubscription {
    /// Creates a connected publisher/subscription pair.
    pub fn new(capacity: usize) -> (ChannelPublisher, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (ChannelPublisher { sender }, Self { receiver })
    }
}

impl Subscription for ChannelSubscription {
    async fn recv(&mut self) -> TransportResult<InboundMessage> {
        self.receiver.recv().await.unwrap_or(Err(TransportError::Closed))
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.receiver.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_prefix_matching() {
        let message = InboundMessage::new("tt_data.raw", "x");
        assert!(message.matches(b"tt_data"));
        assert!(message.matches(b""));
        assert!(!message.matches(b"tt_other"));
        assert!(!message.matches(b"tt_data.raw.extra"));
    }

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let (publisher, mut subscription) = ChannelSubscription::new(8);
        publisher.publish("t", "one").await.unwrap();
        publisher.fail("glitch").await.unwrap();
        publisher.publish("t", "two").await.unwrap();

        assert_eq!(subscription.recv().await.unwrap().payload, "one");
        assert!(matches!(
            subscription.recv().await,
            Err(TransportError::Receive(_))
        ));
        assert_eq!(subscription.recv().await.unwrap().payload, "two");
    }

    #[tokio::test]
    async fn channel_closes_when_publishers_drop() {
        let (publisher, mut subscription) = ChannelSubscription::new(1);
        drop(publisher);
        assert!(matches!(subscription.recv().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn publish_after_close_fails() {
        let (publisher, mut subscription) = ChannelSubscription::new(1);
        subscription.close().await.unwrap();
        assert!(matches!(
            publisher.publish("t", "late").await,
            Err(TransportError::Closed)
        ));
    }
}
