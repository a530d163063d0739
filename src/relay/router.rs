//! Message routing for joined clients

use super::connection::{fan_out, DeliveryPolicy, FanOutReport};
use super::registry::Registry;
use crate::protocol::Route;

/// Decides recipients for a chat message and dispatches it.
///
/// Recipients are chosen by the `sender` the client wrote into the payload,
/// not by the name its session joined with.
pub struct Router<'a> {
    registry: &'a Registry,
    policy: &'a DeliveryPolicy,
}

impl<'a> Router<'a> {
    pub fn new(registry: &'a Registry, policy: &'a DeliveryPolicy) -> Self {
        Self { registry, policy }
    }

    pub async fn dispatch(&self, route: &Route) -> FanOutReport {
        match route {
            Route::Private {
                sender,
                recipient,
                raw,
            } => {
                tracing::debug!("PM from {} to {}", sender, recipient);

                let mut targets = Vec::with_capacity(2);
                match self.registry.lookup(recipient).await {
                    Some(handle) => targets.push(handle),
                    None => tracing::debug!("PM recipient {} is not online", recipient),
                }
                // Echo back so the sender sees its own message
                if let Some(handle) = self.registry.lookup(sender).await {
                    targets.push(handle);
                }

                fan_out(&targets, raw.clone(), self.policy).await
            }
            Route::Group { sender, raw } => {
                tracing::debug!("Group message from {}", sender);
                let targets = self.registry.handles_except(sender).await;
                fan_out(&targets, raw.clone(), self.policy).await
            }
        }
    }
}
