//! Single-use claim handle handed to listen handlers.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{topics, ClusterMessage, MessageBody, ServerName};

use crate::service::{ArbiterState, Claim};

enum AcceptRoute {
    /// A live match this node may claim.
    Armed {
        state: Weak<RwLock<ArbiterState>>,
        bus: Arc<dyn MessagePublisher>,
        local: ServerName,
        pattern: String,
    },
    /// Handed out with match-gone notifications; accepting does nothing.
    Inert,
}

/// One-shot accept handle for a notified match.
///
/// Calling [`accept`](Self::accept) races the rest of the cluster for the
/// claim; losing is silent. Handles delivered alongside a match-gone
/// notification are inert.
pub struct ListenResponder {
    name: String,
    route: AcceptRoute,
}

impl ListenResponder {
    pub(crate) fn armed(
        name: String,
        pattern: String,
        state: Weak<RwLock<ArbiterState>>,
        bus: Arc<dyn MessagePublisher>,
        local: ServerName,
    ) -> Self {
        Self {
            name,
            route: AcceptRoute::Armed {
                state,
                bus,
                local,
                pattern,
            },
        }
    }

    pub(crate) fn inert(name: String) -> Self {
        Self {
            name,
            route: AcceptRoute::Inert,
        }
    }

    /// The concrete record name this notification is about.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claim the matched name for this node and broadcast the acceptance.
    ///
    /// Returns whether the claim is now held locally. Since the notification
    /// fired the name may have been claimed elsewhere, or its last subscriber
    /// may have left; either way the accept is refused silently.
    pub fn accept(self) -> bool {
        let AcceptRoute::Armed {
            state,
            bus,
            local,
            pattern,
        } = self.route
        else {
            debug!(name = %self.name, "Accept on an inert handle ignored");
            return false;
        };
        let Some(state) = state.upgrade() else {
            return false;
        };

        {
            let mut state = state.write();
            if state.claims.contains_key(&self.name) {
                debug!(name = %self.name, "Accept lost the claim race");
                return false;
            }
            // Interest can vanish between the notification and the accept; a
            // claim taken now would outlive the match it was offered for.
            if !state
                .interest
                .get(&self.name)
                .is_some_and(|servers| !servers.is_empty())
            {
                debug!(name = %self.name, "Accept after interest vanished ignored");
                return false;
            }
            state.claims.insert(
                self.name.clone(),
                Claim {
                    owner: local.clone(),
                    pattern: Some(pattern),
                },
            );
        }

        let frame = BusFrame::new(
            topics::LISTEN,
            ClusterMessage::new(local, MessageBody::ListenClaim { name: self.name }),
        );
        tokio::spawn(async move {
            bus.publish(frame).await;
        });
        true
    }
}
