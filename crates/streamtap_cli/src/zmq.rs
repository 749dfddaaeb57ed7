//! ZeroMQ SUB socket as a recorder subscription.

use futures::channel::mpsc;
use futures::StreamExt;
use std::time::Duration;
use streamtap_core::{InboundMessage, Subscription, TransportError, TransportResult};
use tokio::time;
use tracing::{info, trace, warn};
use zeromq::{Socket, SocketEvent, SocketRecv, SubSocket, ZmqMessage, ZmqResult};

/// How long the initial connect may keep retrying before startup fails.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A SUB socket connected to one publisher and subscribed to one topic.
///
/// Publishers send two-frame messages: the topic, then the payload.
/// Messages with fewer frames are skipped.
///
/// The socket does not reconnect by itself. When the publisher goes away
/// the subscription builds a fresh socket and subscribes again, so a
/// restarted publisher is picked up without restarting the recorder.
pub struct ZmqSubscription {
    endpoint: String,
    topic: String,
    socket: Option<SubSocket>,
    events: Option<mpsc::Receiver<SocketEvent>>,
    closed: bool,
}

enum Step {
    Event(Option<SocketEvent>),
    Message(ZmqResult<ZmqMessage>),
}

impl ZmqSubscription {
    /// Connects to `endpoint` and subscribes to `topic`.
    ///
    /// Connecting retries with backoff while the publisher is unreachable,
    /// for at most [`CONNECT_TIMEOUT`].
    pub async fn connect(endpoint: &str, topic: &str) -> TransportResult<Self> {
        info!("Connecting to {}...", endpoint);
        let (socket, events) = time::timeout(CONNECT_TIMEOUT, open_socket(endpoint, topic))
            .await
            .map_err(|_| TransportError::Connect {
                endpoint: endpoint.to_string(),
                message: format!("publisher unreachable for {:?}", CONNECT_TIMEOUT),
            })??;
        info!("Subscribed to topic: '{}'", topic);

        Ok(Self {
            endpoint: endpoint.to_string(),
            topic: topic.to_string(),
            socket: Some(socket),
            events: Some(events),
            closed: false,
        })
    }

    async fn reconnect(&mut self) -> TransportResult<()> {
        let (socket, events) = open_socket(&self.endpoint, &self.topic)
            .await
            .map_err(|e| TransportError::Receive(format!("reconnect failed: {e}")))?;
        self.socket = Some(socket);
        self.events = Some(events);
        info!(endpoint = %self.endpoint, "Reconnected to publisher");
        Ok(())
    }
}

impl Subscription for ZmqSubscription {
    async fn recv(&mut self) -> TransportResult<InboundMessage> {
        loop {
            if self.closed {
                return Err(TransportError::Closed);
            }
            if self.socket.is_none() {
                self.reconnect().await?;
            }
            if self.events.is_none() {
                self.events = self.socket.as_mut().map(|socket| socket.monitor());
            }
            let (Some(socket), Some(events)) = (self.socket.as_mut(), self.events.as_mut()) else {
                continue;
            };

            let step = tokio::select! {
                biased;
                event = events.next() => Step::Event(event),
                message = socket.recv() => Step::Message(message),
            };

            match step {
                Step::Event(Some(SocketEvent::Disconnected(_))) => {
                    warn!(endpoint = %self.endpoint, "Publisher disconnected, reconnecting");
                    self.socket = None;
                    self.events = None;
                }
                Step::Event(Some(event)) => trace!(?event, "socket event"),
                // Monitor ended; a new one is attached on the next pass.
                Step::Event(None) => self.events = None,
                Step::Message(Ok(message)) => match split_frames(message) {
                    Some(inbound) => return Ok(inbound),
                    None => trace!("skipping message without payload frame"),
                },
                Step::Message(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.closed = true;
        self.events = None;
        let Some(socket) = self.socket.take() else {
            return Ok(());
        };

        let errors = socket.close().await;
        for e in &errors {
            warn!(endpoint = %self.endpoint, error = %e, "Error closing socket");
        }
        info!("Disconnected from {}", self.endpoint);
        Ok(())
    }
}

/// Builds a SUB socket, connects it and registers the topic filter.
async fn open_socket(
    endpoint: &str,
    topic: &str,
) -> TransportResult<(SubSocket, mpsc::Receiver<SocketEvent>)> {
    let mut socket = SubSocket::new();
    let events = socket.monitor();

    socket
        .connect(endpoint)
        .await
        .map_err(|e| TransportError::Connect {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

    socket
        .subscribe(topic)
        .await
        .map_err(|e| TransportError::Subscribe {
            topic: topic.to_string(),
            message: e.to_string(),
        })?;

    Ok((socket, events))
}

/// Splits a multipart message into topic and payload.
///
/// Frames past the second are ignored.
fn split_frames(message: ZmqMessage) -> Option<InboundMessage> {
    let mut frames = message.into_vec().into_iter();
    let topic = frames.next()?;
    let payload = frames.next()?;
    Some(InboundMessage { topic, payload })
}
