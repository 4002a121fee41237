//! # Peer Registry Service
//!
//! Owns the PeerSet: an insertion-ordered list of every other known node,
//! with liveness timestamps read through the injectable clock.
//!
//! ## Thread Safety
//!
//! The registry is shared across tasks via `Arc`; internal state sits behind
//! `parking_lot::RwLock`. Callbacks are snapshotted and fired outside the
//! lock so a callback may call back into the registry without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{
    topics, CallbackSet, ClusterMessage, MessageBody, PeerAddress, ServerName, SubscriptionId,
    TimeSource, Timestamp,
};

use crate::config::RegistryConfig;

/// Callback fired on a peer add or remove transition.
pub type PeerCallback = dyn Fn(&PeerAddress) + Send + Sync;

/// What a join/heartbeat observation did to the PeerSet.
enum Observation {
    /// Previously unknown peer entered the set.
    New,
    /// Known name arrived with a fresh connection id: the peer restarted.
    Rejoined(PeerAddress),
    /// Known incarnation; only the liveness timestamp moved.
    Refreshed,
}

struct RegistryState {
    /// Remote peers in the order they were first observed.
    peers: Vec<PeerAddress>,
    /// Last time each peer was heard from.
    last_seen: HashMap<ServerName, Timestamp>,
}

/// Cluster membership tracker for one node.
pub struct PeerRegistry {
    config: RegistryConfig,
    local: PeerAddress,
    bus: Arc<dyn MessagePublisher>,
    clock: Arc<dyn TimeSource>,
    state: RwLock<RegistryState>,
    added: RwLock<CallbackSet<PeerCallback>>,
    removed: RwLock<CallbackSet<PeerCallback>>,
}

impl PeerRegistry {
    pub fn new(
        config: RegistryConfig,
        local: PeerAddress,
        bus: Arc<dyn MessagePublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            local,
            bus,
            clock,
            state: RwLock::new(RegistryState {
                peers: Vec::new(),
                last_seen: HashMap::new(),
            }),
            added: RwLock::new(CallbackSet::new()),
            removed: RwLock::new(CallbackSet::new()),
        }
    }

    /// This node's own address as announced to the cluster.
    #[must_use]
    pub fn local_address(&self) -> &PeerAddress {
        &self.local
    }

    /// Announce this node to the cluster. Called once at startup.
    pub async fn announce(&self) {
        info!(local = %self.local, "Joining cluster");
        self.publish(MessageBody::Join(self.local.clone())).await;
    }

    /// Publish one liveness heartbeat.
    pub async fn heartbeat(&self) {
        self.publish(MessageBody::Heartbeat(self.local.clone()))
            .await;
    }

    /// Publish the explicit leave notice. Peers drop this node immediately
    /// instead of waiting out the liveness window.
    pub async fn leave(&self) {
        info!(local = %self.local, "Leaving cluster");
        self.publish(MessageBody::Leave).await;
    }

    /// Handle one discovery frame from a remote node.
    pub async fn handle_frame(&self, message: &ClusterMessage) {
        match &message.body {
            MessageBody::Join(addr) => self.observe(addr.clone(), true).await,
            MessageBody::Heartbeat(addr) => self.observe(addr.clone(), false).await,
            MessageBody::Leave => self.remove(&message.origin, "leave notice"),
            _ => {}
        }
    }

    /// Drop every peer whose heartbeat is overdue. Returns the evicted
    /// addresses; remove callbacks have already fired for each.
    pub fn sweep_expired(&self) -> Vec<PeerAddress> {
        let now = self.clock.now();
        let expired: Vec<PeerAddress> = {
            let state = self.state.read();
            state
                .peers
                .iter()
                .filter(|peer| {
                    state.last_seen.get(&peer.server).is_none_or(|seen| {
                        now.saturating_since(*seen) >= self.config.liveness_timeout
                    })
                })
                .cloned()
                .collect()
        };
        for peer in &expired {
            self.remove(&peer.server, "heartbeat timeout");
        }
        expired
    }

    /// Remote peers in the order they were first observed.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.state.read().peers.clone()
    }

    /// Whether a server is currently in the PeerSet.
    #[must_use]
    pub fn is_known(&self, server: &ServerName) -> bool {
        self.state.read().peers.iter().any(|p| p.server == *server)
    }

    /// Register a callback fired once per peer-added transition.
    pub fn on_peer_added(&self, callback: Arc<PeerCallback>) -> SubscriptionId {
        self.added.write().insert(callback)
    }

    /// Register a callback fired once per peer-removed transition.
    pub fn on_peer_removed(&self, callback: Arc<PeerCallback>) -> SubscriptionId {
        self.removed.write().insert(callback)
    }

    async fn publish(&self, body: MessageBody) {
        let frame = BusFrame::new(
            topics::DISCOVERY,
            ClusterMessage::new(self.local.server.clone(), body),
        );
        self.bus.publish(frame).await;
    }

    async fn observe(&self, addr: PeerAddress, is_join: bool) {
        let now = self.clock.now();
        let observation = {
            let mut state = self.state.write();
            state.last_seen.insert(addr.server.clone(), now);
            match state.peers.iter().position(|p| p.server == addr.server) {
                Some(i) if state.peers[i].connection_id == addr.connection_id => {
                    Observation::Refreshed
                }
                Some(i) => {
                    let old = state.peers.remove(i);
                    state.peers.push(addr.clone());
                    Observation::Rejoined(old)
                }
                None => {
                    state.peers.push(addr.clone());
                    Observation::New
                }
            }
        };

        match observation {
            Observation::Refreshed => {
                debug!(peer = %addr, "Liveness refreshed");
            }
            Observation::New => {
                info!(peer = %addr, "Peer added");
                self.fire_added(&addr);
                if is_join {
                    // Join fast path: one out-of-cycle heartbeat so the
                    // joiner learns this node without waiting an interval.
                    self.heartbeat().await;
                }
            }
            Observation::Rejoined(old) => {
                info!(peer = %addr, "Peer restarted with a fresh connection");
                self.fire_removed(&old);
                self.fire_added(&addr);
                if is_join {
                    self.heartbeat().await;
                }
            }
        }
    }

    fn remove(&self, server: &ServerName, reason: &str) {
        let removed = {
            let mut state = self.state.write();
            let position = state.peers.iter().position(|p| p.server == *server);
            position.map(|i| {
                state.last_seen.remove(server);
                state.peers.remove(i)
            })
        };
        if let Some(peer) = removed {
            info!(peer = %peer, reason, "Peer removed");
            self.fire_removed(&peer);
        }
    }

    fn fire_added(&self, peer: &PeerAddress) {
        let callbacks = self.added.read().snapshot();
        for callback in callbacks {
            callback(peer);
        }
    }

    fn fire_removed(&self, peer: &PeerAddress) {
        let callbacks = self.removed.read().snapshot();
        for callback in callbacks {
            callback(peer);
        }
    }
}
