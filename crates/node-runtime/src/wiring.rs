//! # Component Wiring
//!
//! The cross-component callback graph. Components never call each other
//! directly; everything they need from one another flows through the
//! edge-triggered callbacks connected here.
//!
//! - Peer removal cascades into presence (ghost logout), the rpc router
//!   (provider cleanup, in-flight failure) and the listener arbiter (claim
//!   release, re-notification).
//! - Peer addition sends the newcomer this node's authoritative state on its
//!   private inbox, so late joiners converge without manual resync.
//! - Record interest edges feed the local arbiter directly; a node drops its
//!   own frames, so the bus cannot deliver them.

use std::sync::Arc;

use tracing::debug;

use ch_01_peer_registry::PeerRegistry;
use ch_02_presence::PresenceDirectory;
use ch_03_record_sync::RecordSynchronizer;
use ch_05_rpc_router::RpcRouter;
use ch_06_listen_arbiter::ListenerArbiter;
use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{
    topics, ClusterMessage, MessageBody, PeerAddress, ServerName, StateSyncPayload,
};

/// Connect the cross-component callbacks for one node.
pub(crate) fn connect(
    registry: &Arc<PeerRegistry>,
    presence: &Arc<PresenceDirectory>,
    records: &Arc<RecordSynchronizer>,
    rpc: &Arc<RpcRouter>,
    listeners: &Arc<ListenerArbiter>,
    bus: Arc<dyn MessagePublisher>,
    local: &ServerName,
) {
    // Peer loss cascades into every component holding per-peer state.
    {
        let presence = presence.clone();
        let rpc = rpc.clone();
        let listeners = listeners.clone();
        registry.on_peer_removed(Arc::new(move |peer: &PeerAddress| {
            presence.handle_peer_removed(&peer.server);
            rpc.handle_peer_removed(&peer.server);
            listeners.handle_peer_removed(&peer.server);
        }));
    }

    // A newly observed peer gets this node's authoritative state.
    {
        let presence = presence.clone();
        let records = records.clone();
        let rpc = rpc.clone();
        let listeners = listeners.clone();
        let local = local.clone();
        registry.on_peer_added(Arc::new(move |peer: &PeerAddress| {
            let payload = StateSyncPayload {
                presence: presence.local_entries(),
                providers: rpc.provider_names(),
                claims: listeners.owned_claims(),
                interest: records.local_interest(),
            };
            if payload.is_empty() {
                return;
            }
            debug!(to = %peer.server, "Sending bootstrap state");
            let frame = BusFrame::new(
                topics::inbox(&peer.server),
                ClusterMessage::new(local.clone(), MessageBody::StateSync(payload)),
            );
            let bus = bus.clone();
            tokio::spawn(async move {
                bus.publish(frame).await;
            });
        }));
    }

    // The synchronizer's interest edges drive the local arbiter.
    {
        let listeners = listeners.clone();
        records.on_interest_change(Arc::new(move |name: &str, active: bool| {
            listeners.local_interest_edge(name, active);
        }));
    }
}

/// Apply a bootstrap state snapshot received on the private inbox.
///
/// Imports are silent and idempotent: no presence callbacks fire, and
/// re-importing the same snapshot changes nothing.
pub(crate) fn apply_state_sync(
    presence: &PresenceDirectory,
    rpc: &RpcRouter,
    listeners: &ListenerArbiter,
    origin: &ServerName,
    payload: &StateSyncPayload,
) {
    debug!(from = %origin, "Importing bootstrap state");
    presence.import_state(payload.presence.clone());
    rpc.import_providers(origin, &payload.providers);
    listeners.import_state(origin, &payload.claims, &payload.interest);
}
