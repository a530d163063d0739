//! Connection handles and concurrent fan-out

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier of one accepted connection
pub type ConnectionId = Uuid;

/// Default bound on a single enqueue to a peer
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames queued for a connection's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A JSON text frame
    Text(Arc<str>),

    /// Close the connection with a code and reason
    Close { code: u16, reason: String },
}

/// Failure to hand a frame to one peer
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Connection {0} is closed")]
    Closed(ConnectionId),

    #[error("Delivery to connection {id} timed out after {after:?}")]
    TimedOut { id: ConnectionId, after: Duration },
}

/// Failure reported by the transport while reading frames
#[derive(Debug, Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

/// How outbound sends are bounded
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    /// Longest a single send may wait for queue space
    pub send_timeout: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

impl DeliveryPolicy {
    pub fn new(send_timeout: Duration) -> Self {
        Self { send_timeout }
    }
}

/// Sendable endpoint of a live connection.
///
/// Cloning is cheap; every clone feeds the same bounded outbound queue, which
/// the transport's writer task drains into the socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Unique connection identifier
    id: ConnectionId,

    /// Queue feeding this connection's writer
    sender: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Create a handle around an existing queue
    pub fn new(sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Create a handle together with the receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Get connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame, waiting at most `within` for room
    pub async fn send(&self, payload: Arc<str>, within: Duration) -> Result<(), DeliveryError> {
        self.deliver(Outbound::Text(payload), within).await
    }

    /// Queue a close frame, waiting at most `within` for room
    pub async fn close(
        &self,
        code: u16,
        reason: impl Into<String>,
        within: Duration,
    ) -> Result<(), DeliveryError> {
        let frame = Outbound::Close {
            code,
            reason: reason.into(),
        };
        self.deliver(frame, within).await
    }

    async fn deliver(&self, frame: Outbound, within: Duration) -> Result<(), DeliveryError> {
        match tokio::time::timeout(within, self.sender.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed(self.id)),
            Err(_) => Err(DeliveryError::TimedOut {
                id: self.id,
                after: within,
            }),
        }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

impl FanOutReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Send `payload` to every target concurrently.
///
/// All sends run to completion or timeout before this returns. Failures are
/// logged and counted, never propagated.
pub async fn fan_out(
    targets: &[ConnectionHandle],
    payload: Arc<str>,
    policy: &DeliveryPolicy,
) -> FanOutReport {
    let sends = targets.iter().map(|target| {
        let payload = Arc::clone(&payload);
        async move { target.send(payload, policy.send_timeout).await }
    });

    let mut report = FanOutReport::default();
    for result in join_all(sends).await {
        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!("Dropped message for one recipient: {}", e);
                report.failed += 1;
            }
        }
    }
    report
}
