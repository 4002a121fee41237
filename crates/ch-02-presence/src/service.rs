//! # Presence Directory Service

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{
    topics, CallbackSet, ClusterMessage, DeviceId, MessageBody, PresenceEntry, ServerName,
    SubscriptionId, TimeSource,
};

/// Callback fired on a login (`true`) or logout (`false`) transition.
pub type PresenceCallback = dyn Fn(&DeviceId, bool) + Send + Sync;

/// Merged view of connected clients across the cluster.
pub struct PresenceDirectory {
    local: ServerName,
    bus: Arc<dyn MessagePublisher>,
    clock: Arc<dyn TimeSource>,
    entries: RwLock<HashMap<DeviceId, PresenceEntry>>,
    callbacks: RwLock<CallbackSet<PresenceCallback>>,
}

impl PresenceDirectory {
    pub fn new(
        local: ServerName,
        bus: Arc<dyn MessagePublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            local,
            bus,
            clock,
            entries: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(CallbackSet::new()),
        }
    }

    /// A client connected to this node. Publishes the login to the cluster
    /// and fires local subscribers if this is a fresh transition.
    pub async fn client_login(&self, device: DeviceId) {
        let now = self.clock.now();
        let transition = {
            let mut entries = self.entries.write();
            match entries.get_mut(&device) {
                Some(entry) if entry.origin == self.local => {
                    // Duplicate login on the same node: refresh only.
                    entry.last_seen = now;
                    None
                }
                Some(entry) => {
                    // Client moved here from another node. Ownership changes
                    // but the client was never logged out, so no transition.
                    entry.origin = self.local.clone();
                    entry.last_seen = now;
                    Some(false)
                }
                None => {
                    entries.insert(
                        device.clone(),
                        PresenceEntry {
                            device: device.clone(),
                            origin: self.local.clone(),
                            last_seen: now,
                        },
                    );
                    Some(true)
                }
            }
        };

        match transition {
            None => debug!(device = %device, "Duplicate login refreshed"),
            Some(fresh) => {
                self.publish(MessageBody::Login {
                    device: device.clone(),
                })
                .await;
                if fresh {
                    self.fire(&device, true);
                }
            }
        }
    }

    /// A client disconnected from this node. Logout for an unknown device is
    /// a no-op.
    pub async fn client_logout(&self, device: DeviceId) {
        let removed = self.entries.write().remove(&device).is_some();
        if !removed {
            debug!(device = %device, "Logout for unknown device ignored");
            return;
        }
        self.publish(MessageBody::Logout {
            device: device.clone(),
        })
        .await;
        self.fire(&device, false);
    }

    /// Every currently-connected device across the cluster, sorted.
    #[must_use]
    pub fn get_all(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.entries.read().keys().cloned().collect();
        devices.sort();
        devices
    }

    /// Register a transition callback.
    pub fn subscribe(&self, callback: Arc<PresenceCallback>) -> SubscriptionId {
        self.callbacks.write().insert(callback)
    }

    /// Remove a transition callback.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.write().remove(id)
    }

    /// Handle one presence frame from a remote node.
    pub fn handle_frame(&self, message: &ClusterMessage) {
        match &message.body {
            MessageBody::Login { device } => {
                let fresh = {
                    let mut entries = self.entries.write();
                    match entries.get_mut(device) {
                        Some(entry) => {
                            entry.origin = message.origin.clone();
                            entry.last_seen = self.clock.now();
                            false
                        }
                        None => {
                            entries.insert(
                                device.clone(),
                                PresenceEntry {
                                    device: device.clone(),
                                    origin: message.origin.clone(),
                                    last_seen: self.clock.now(),
                                },
                            );
                            true
                        }
                    }
                };
                if fresh {
                    self.fire(device, true);
                }
            }
            MessageBody::Logout { device } => {
                if self.entries.write().remove(device).is_some() {
                    self.fire(device, false);
                }
            }
            _ => {}
        }
    }

    /// Synthesize logouts for every client owned by a removed peer.
    pub fn handle_peer_removed(&self, server: &ServerName) {
        let ghosts: Vec<DeviceId> = {
            let mut entries = self.entries.write();
            let ghosts: Vec<DeviceId> = entries
                .values()
                .filter(|entry| entry.origin == *server)
                .map(|entry| entry.device.clone())
                .collect();
            for device in &ghosts {
                entries.remove(device);
            }
            ghosts
        };
        for device in &ghosts {
            debug!(device = %device, origin = %server, "Ghost presence entry cleared");
            self.fire(device, false);
        }
    }

    /// Merge a bootstrap snapshot. Silent: no callbacks fire, and entries we
    /// already know keep whichever timestamp is newer.
    pub fn import_state(&self, imported: Vec<PresenceEntry>) {
        let mut entries = self.entries.write();
        for entry in imported {
            match entries.get_mut(&entry.device) {
                Some(existing) if existing.last_seen >= entry.last_seen => {}
                Some(existing) => *existing = entry,
                None => {
                    entries.insert(entry.device.clone(), entry);
                }
            }
        }
    }

    /// Entries this node is authoritative for, shipped in bootstrap syncs.
    #[must_use]
    pub fn local_entries(&self) -> Vec<PresenceEntry> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.origin == self.local)
            .cloned()
            .collect()
    }

    async fn publish(&self, body: MessageBody) {
        let frame = BusFrame::new(
            topics::PRESENCE,
            ClusterMessage::new(self.local.clone(), body),
        );
        self.bus.publish(frame).await;
    }

    fn fire(&self, device: &DeviceId, is_login: bool) {
        let callbacks = self.callbacks.read().snapshot();
        for callback in callbacks {
            callback(device, is_login);
        }
    }
}
