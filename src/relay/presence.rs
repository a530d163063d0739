//! Presence notifications - join/leave announcements and roster snapshots

use super::connection::{fan_out, DeliveryPolicy, FanOutReport};
use super::registry::Registry;
use crate::protocol::{encode, ServerMessage};
use std::sync::Arc;

/// Broadcasts membership changes to every registered connection
pub struct Presence<'a> {
    registry: &'a Registry,
    policy: &'a DeliveryPolicy,
}

impl<'a> Presence<'a> {
    pub fn new(registry: &'a Registry, policy: &'a DeliveryPolicy) -> Self {
        Self { registry, policy }
    }

    /// Tell everyone, the newcomer included, that `name` joined
    pub async fn announce_join(&self, name: &str) -> FanOutReport {
        self.broadcast(&ServerMessage::joined(name)).await
    }

    /// Tell everyone still online that `name` left
    pub async fn announce_leave(&self, name: &str) -> FanOutReport {
        self.broadcast(&ServerMessage::left(name)).await
    }

    /// Send the current roster to everyone
    pub async fn broadcast_roster(&self) -> FanOutReport {
        let (users, targets) = self.registry.snapshot_with_handles().await;
        if targets.is_empty() {
            return FanOutReport::default();
        }

        tracing::debug!("Broadcasting roster of {} users", users.len());
        match encode(&ServerMessage::UserList { users }) {
            Ok(payload) => fan_out(&targets, Arc::from(payload), self.policy).await,
            Err(e) => {
                tracing::error!("Failed to encode roster: {}", e);
                FanOutReport::default()
            }
        }
    }

    async fn broadcast(&self, msg: &ServerMessage) -> FanOutReport {
        let payload = match encode(msg) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode announcement: {}", e);
                return FanOutReport::default();
            }
        };

        let targets = self.registry.handles().await;
        fan_out(&targets, Arc::from(payload), self.policy).await
    }
}
