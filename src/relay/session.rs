//! Connection session - drives one client from accept to close

use super::connection::{ConnectionHandle, TransportError};
use super::registry::RegistryError;
use super::Relay;
use crate::protocol::{
    parse_client_message, ProtocolError, CLOSE_INVALID_PAYLOAD, CLOSE_POLICY_VIOLATION,
    REASON_BAD_USERNAME, REASON_MALFORMED,
};
use futures_util::{Stream, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// Lifecycle of a session. `Closed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Joined { name: String },
    Closed,
}

/// Why a join was refused
#[derive(Debug, Error)]
pub enum JoinRejection {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl JoinRejection {
    /// Close code sent to the rejected client
    pub fn close_code(&self) -> u16 {
        match self {
            JoinRejection::Protocol(e) => e.close_code(),
            JoinRejection::Registry(_) => CLOSE_POLICY_VIOLATION,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            JoinRejection::Protocol(ProtocolError::MalformedMessage(_)) => REASON_MALFORMED,
            _ => REASON_BAD_USERNAME,
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer went away
    Disconnected,

    /// The first message was not an acceptable join
    JoinRejected(JoinRejection),

    /// A frame after join could not be routed
    Malformed(ProtocolError),

    /// Reading from the connection failed
    Transport(TransportError),
}

/// Server-side state for one client connection
pub struct Session {
    relay: Arc<Relay>,
    handle: ConnectionHandle,
    peer: Option<SocketAddr>,
    state: SessionState,
}

impl Session {
    pub fn new(relay: Arc<Relay>, handle: ConnectionHandle) -> Self {
        Self {
            relay,
            handle,
            peer: None,
            state: SessionState::Unauthenticated,
        }
    }

    /// Record the remote address for logging
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Name this session joined as, while joined
    pub fn name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Joined { name } => Some(name),
            _ => None,
        }
    }

    /// Run the session over `inbound` until the connection ends, then clean up
    pub async fn run<S>(mut self, inbound: S) -> SessionEnd
    where
        S: Stream<Item = Result<String, TransportError>>,
    {
        let mut inbound = std::pin::pin!(inbound);
        let end = self.drive(&mut inbound).await;
        self.close().await;

        match &end {
            SessionEnd::Disconnected => {}
            SessionEnd::JoinRejected(e) => {
                tracing::info!("Rejected join from {}: {}", self.peer_label(), e)
            }
            SessionEnd::Malformed(e) => tracing::warn!("Closing {}: {}", self.peer_label(), e),
            SessionEnd::Transport(e) => {
                tracing::warn!("Connection {} failed: {}", self.peer_label(), e)
            }
        }
        end
    }

    async fn drive<S>(&mut self, inbound: &mut S) -> SessionEnd
    where
        S: Stream<Item = Result<String, TransportError>> + Unpin,
    {
        let first = match inbound.next().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return SessionEnd::Transport(e),
            None => return SessionEnd::Disconnected,
        };

        if let Err(rejection) = self.join(&first).await {
            return SessionEnd::JoinRejected(rejection);
        }

        while let Some(frame) = inbound.next().await {
            let text = match frame {
                Ok(text) => text,
                Err(e) => return SessionEnd::Transport(e),
            };

            if let Err(e) = self.handle_message(&text).await {
                let within = self.relay.policy().send_timeout;
                if let Err(send_err) = self
                    .handle
                    .close(CLOSE_INVALID_PAYLOAD, REASON_MALFORMED, within)
                    .await
                {
                    tracing::debug!("Could not queue close frame: {}", send_err);
                }
                return SessionEnd::Malformed(e);
            }
        }

        SessionEnd::Disconnected
    }

    /// Handle the opening frame.
    ///
    /// On success the name is registered and everyone is told. On failure the
    /// connection is closed with a policy code and the session is `Closed`
    /// without ever having joined.
    pub async fn join(&mut self, text: &str) -> Result<(), JoinRejection> {
        match self.state {
            SessionState::Unauthenticated => {}
            SessionState::Joined { .. } => return Err(ProtocolError::AlreadyJoined.into()),
            SessionState::Closed => return Err(ProtocolError::SessionClosed.into()),
        }

        match self.try_register(text).await {
            Ok(name) => {
                tracing::info!("{} has connected from {}", name, self.peer_label());
                self.state = SessionState::Joined { name: name.clone() };

                let presence = self.relay.presence();
                presence.announce_join(&name).await;
                presence.broadcast_roster().await;
                Ok(())
            }
            Err(rejection) => {
                self.state = SessionState::Closed;
                let within = self.relay.policy().send_timeout;
                if let Err(e) = self
                    .handle
                    .close(rejection.close_code(), rejection.reason(), within)
                    .await
                {
                    tracing::debug!("Could not queue close frame: {}", e);
                }
                Err(rejection)
            }
        }
    }

    async fn try_register(&self, text: &str) -> Result<String, JoinRejection> {
        let name = parse_client_message(text)?.into_join()?;
        self.relay
            .registry()
            .register(&name, self.handle.clone())
            .await?;
        Ok(name)
    }

    /// Route one frame from a joined client
    pub async fn handle_message(&mut self, text: &str) -> Result<(), ProtocolError> {
        let name = self.name().ok_or(ProtocolError::NotJoined)?;
        let route = parse_client_message(text)?.into_route()?;

        if route.sender() != name {
            tracing::debug!("{} sent a message declaring sender {}", name, route.sender());
        }

        self.relay.router().dispatch(&route).await;
        Ok(())
    }

    /// Move to `Closed`, releasing the name and telling everyone if this
    /// session had joined. Later calls do nothing.
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        let SessionState::Joined { name } = previous else {
            return;
        };

        self.relay
            .registry()
            .unregister(&name, self.handle.id())
            .await;
        tracing::info!("{} has disconnected ({})", name, self.peer_label());

        let presence = self.relay.presence();
        presence.announce_leave(&name).await;
        presence.broadcast_roster().await;
    }

    fn peer_label(&self) -> String {
        match self.peer {
            Some(addr) => addr.to_string(),
            None => format!("connection {}", self.handle.id()),
        }
    }
}
