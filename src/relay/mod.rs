//! Relay core - registry, sessions, routing and presence
//!
//! Nothing in here knows about HTTP or WebSockets. A session consumes a stream
//! of inbound text frames and writes to peers through [`ConnectionHandle`]s,
//! whose queues are drained by whatever transport owns the sockets.

mod connection;
mod presence;
mod registry;
mod router;
mod session;

pub use connection::{
    fan_out, ConnectionHandle, ConnectionId, DeliveryError, DeliveryPolicy, FanOutReport,
    Outbound, TransportError, DEFAULT_SEND_TIMEOUT,
};
pub use presence::Presence;
pub use registry::{Registry, RegistryError};
pub use router::Router;
pub use session::{JoinRejection, Session, SessionEnd, SessionState};

/// Shared relay state: the registry plus the delivery policy applied to it.
///
/// Built once at startup and handed to every session behind an `Arc`.
pub struct Relay {
    registry: Registry,
    policy: DeliveryPolicy,
}

impl Relay {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            registry: Registry::new(),
            policy,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn presence(&self) -> Presence<'_> {
        Presence::new(&self.registry, &self.policy)
    }

    pub fn router(&self) -> Router<'_> {
        Router::new(&self.registry, &self.policy)
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}
