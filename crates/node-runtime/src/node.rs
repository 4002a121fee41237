//! # Cluster Node
//!
//! The server-facing façade. `ClusterNode::start` builds the six components
//! around one shared bus, wires their cross-component callbacks, spawns the
//! pumps and timers, and announces the node; the returned handle exposes the
//! component façades and graceful shutdown.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use ch_01_peer_registry::{PeerCallback, PeerRegistry};
use ch_02_presence::PresenceDirectory;
use ch_03_record_sync::RecordSynchronizer;
use ch_04_event_relay::EventRelay;
use ch_05_rpc_router::RpcRouter;
use ch_06_listen_arbiter::ListenerArbiter;
use shared_bus::{BusFilter, MessageBus};
use shared_types::{
    topics, MessageBody, PeerAddress, ServerName, SubscriptionId, SystemTimeSource,
};

use crate::config::{ConfigError, NodeConfig};
use crate::{pumps, wiring};

/// One running cluster node.
pub struct ClusterNode {
    address: PeerAddress,
    registry: Arc<PeerRegistry>,
    presence: Arc<PresenceDirectory>,
    records: Arc<RecordSynchronizer>,
    events: Arc<EventRelay>,
    rpc: Arc<RpcRouter>,
    listeners: Arc<ListenerArbiter>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClusterNode {
    /// Build the components, start the pumps and timers, and join the
    /// cluster.
    ///
    /// Pumps subscribe before the join announcement goes out, so nothing a
    /// peer sends in response can be missed.
    pub async fn start(config: NodeConfig, bus: Arc<dyn MessageBus>) -> Result<Self, ConfigError> {
        config.validate()?;

        let local = ServerName::new(&config.server_name);
        let address = PeerAddress::new(local.clone(), &config.host, config.port);
        let clock = Arc::new(SystemTimeSource);
        let publisher = bus.clone().as_publisher();

        let registry = Arc::new(PeerRegistry::new(
            config.registry.clone(),
            address.clone(),
            publisher.clone(),
            clock.clone(),
        ));
        let presence = Arc::new(PresenceDirectory::new(
            local.clone(),
            publisher.clone(),
            clock,
        ));
        let records = Arc::new(RecordSynchronizer::new(
            config.records.clone(),
            local.clone(),
            publisher.clone(),
        ));
        let events = Arc::new(EventRelay::new(local.clone(), publisher.clone()));
        let rpc = Arc::new(RpcRouter::new(
            config.rpc.clone(),
            local.clone(),
            publisher.clone(),
        ));
        let listeners = Arc::new(ListenerArbiter::new(local.clone(), publisher.clone()));

        wiring::connect(
            &registry, &presence, &records, &rpc, &listeners, publisher, &local,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // One pump per control topic.
        {
            let registry = registry.clone();
            tasks.push(pumps::spawn(
                "discovery",
                local.clone(),
                bus.subscribe(BusFilter::topic(topics::DISCOVERY)),
                shutdown_rx.clone(),
                move |message| {
                    let registry = registry.clone();
                    async move { registry.handle_frame(&message).await }
                },
            ));
        }
        {
            let presence = presence.clone();
            tasks.push(pumps::spawn(
                "presence",
                local.clone(),
                bus.subscribe(BusFilter::topic(topics::PRESENCE)),
                shutdown_rx.clone(),
                move |message| {
                    let presence = presence.clone();
                    async move { presence.handle_frame(&message) }
                },
            ));
        }
        {
            let records = records.clone();
            tasks.push(pumps::spawn(
                "records",
                local.clone(),
                bus.subscribe(BusFilter::pattern(topics::ALL_RECORDS)),
                shutdown_rx.clone(),
                move |message| {
                    let records = records.clone();
                    async move { records.handle_frame(&message).await }
                },
            ));
        }
        {
            let listeners = listeners.clone();
            tasks.push(pumps::spawn(
                "listen",
                local.clone(),
                bus.subscribe(BusFilter::topic(topics::LISTEN)),
                shutdown_rx.clone(),
                move |message| {
                    let listeners = listeners.clone();
                    async move { listeners.handle_frame(&message) }
                },
            ));
        }
        {
            let events = events.clone();
            tasks.push(pumps::spawn(
                "events",
                local.clone(),
                bus.subscribe(BusFilter::pattern(topics::ALL_EVENTS)),
                shutdown_rx.clone(),
                move |message| {
                    let events = events.clone();
                    async move { events.handle_frame(&message) }
                },
            ));
        }
        {
            let rpc = rpc.clone();
            tasks.push(pumps::spawn(
                "rpc",
                local.clone(),
                bus.subscribe(BusFilter::pattern(topics::ALL_RPCS)),
                shutdown_rx.clone(),
                move |message| {
                    let rpc = rpc.clone();
                    async move { rpc.handle_frame(&message) }
                },
            ));
        }

        // The private inbox carries directed traffic: calls, responses, and
        // bootstrap state syncs.
        {
            let rpc = rpc.clone();
            let presence = presence.clone();
            let listeners = listeners.clone();
            tasks.push(pumps::spawn(
                "inbox",
                local.clone(),
                bus.subscribe(BusFilter::topic(&topics::inbox(&local))),
                shutdown_rx.clone(),
                move |message| {
                    let rpc = rpc.clone();
                    let presence = presence.clone();
                    let listeners = listeners.clone();
                    async move {
                        if let MessageBody::StateSync(payload) = &message.body {
                            wiring::apply_state_sync(
                                &presence,
                                &rpc,
                                &listeners,
                                &message.origin,
                                payload,
                            );
                        } else {
                            rpc.handle_inbox(&message).await;
                        }
                    }
                },
            ));
        }

        // Heartbeat and liveness timers. The heartbeat ticker starts one
        // interval out so the join announcement is the first frame peers see
        // from this node.
        {
            let registry = registry.clone();
            let mut shutdown = shutdown_rx.clone();
            let interval = config.registry.heartbeat_interval;
            tasks.push(tokio::spawn(async move {
                let start = tokio::time::Instant::now() + interval;
                let mut ticker = tokio::time::interval_at(start, interval);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => registry.heartbeat().await,
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }
        {
            let registry = registry.clone();
            let mut shutdown = shutdown_rx;
            let interval = config.registry.sweep_interval();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            registry.sweep_expired();
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        let node = Self {
            address,
            registry,
            presence,
            records,
            events,
            rpc,
            listeners,
            shutdown: shutdown_tx,
            tasks: Mutex::new(tasks),
        };

        node.registry.announce().await;
        info!(node = %node.address, "Cluster node started");
        Ok(node)
    }

    /// This node's address as announced to the cluster.
    #[must_use]
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// This node's cluster-unique name.
    #[must_use]
    pub fn server_name(&self) -> &ServerName {
        &self.address.server
    }

    /// Remote peers in the order they were first observed.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.registry.peers()
    }

    /// Register a callback fired whenever a peer joins.
    pub fn on_add_peer(&self, callback: Arc<PeerCallback>) -> SubscriptionId {
        self.registry.on_peer_added(callback)
    }

    /// Register a callback fired whenever a peer leaves or expires.
    pub fn on_remove_peer(&self, callback: Arc<PeerCallback>) -> SubscriptionId {
        self.registry.on_peer_removed(callback)
    }

    /// The presence directory façade.
    #[must_use]
    pub fn presence(&self) -> Arc<PresenceDirectory> {
        Arc::clone(&self.presence)
    }

    /// The record synchronizer façade.
    #[must_use]
    pub fn records(&self) -> Arc<RecordSynchronizer> {
        Arc::clone(&self.records)
    }

    /// The event relay façade.
    #[must_use]
    pub fn events(&self) -> Arc<EventRelay> {
        Arc::clone(&self.events)
    }

    /// The rpc router façade.
    #[must_use]
    pub fn rpc(&self) -> Arc<RpcRouter> {
        Arc::clone(&self.rpc)
    }

    /// The listener arbiter façade.
    #[must_use]
    pub fn listeners(&self) -> Arc<ListenerArbiter> {
        Arc::clone(&self.listeners)
    }

    /// Leave the cluster gracefully and stop every task.
    ///
    /// The explicit leave notice lets peers drop this node immediately
    /// instead of waiting out the liveness window.
    pub async fn shutdown(&self) {
        info!(node = %self.address, "Shutting down");
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        // Every pump and timer has stopped; the leave notice is the last
        // frame this node puts on the bus.
        self.registry.leave().await;
    }

    /// Stop every task immediately, without the leave notice.
    ///
    /// Peers discover the loss through missed heartbeats, exactly as they
    /// would for a crashed process.
    pub fn halt(&self) {
        let _ = self.shutdown.send(true);
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
    }
}
