//! # Event Relay Service

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{topics, CallbackSet, ClusterMessage, MessageBody, ServerName, SubscriptionId};

/// Callback fired with the event name and payload.
pub type EventCallback = dyn Fn(&str, &Value) + Send + Sync;

/// Stateless event fan-out for one node.
pub struct EventRelay {
    local: ServerName,
    bus: Arc<dyn MessagePublisher>,
    subscriptions: RwLock<HashMap<String, CallbackSet<EventCallback>>>,
}

impl EventRelay {
    pub fn new(local: ServerName, bus: Arc<dyn MessagePublisher>) -> Self {
        Self {
            local,
            bus,
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an event cluster-wide and invoke local subscribers directly.
    /// The pump drops this node's own frames, so locals fire exactly once.
    pub async fn emit(&self, name: &str, payload: Value) {
        let frame = BusFrame::new(
            topics::event(name),
            ClusterMessage::new(
                self.local.clone(),
                MessageBody::Event {
                    name: name.to_owned(),
                    payload: payload.clone(),
                },
            ),
        );
        self.bus.publish(frame).await;
        self.fire(name, &payload);
    }

    /// Attach a subscriber for one event name.
    pub fn subscribe(&self, name: &str, callback: Arc<EventCallback>) -> SubscriptionId {
        self.subscriptions
            .write()
            .entry(name.to_owned())
            .or_default()
            .insert(callback)
    }

    /// Detach a subscriber. Empty registries are dropped.
    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(set) = subscriptions.get_mut(name) else {
            return false;
        };
        let removed = set.remove(id);
        if set.is_empty() {
            subscriptions.remove(name);
        }
        removed
    }

    /// Handle one frame from an event topic.
    pub fn handle_frame(&self, message: &ClusterMessage) {
        if let MessageBody::Event { name, payload } = &message.body {
            trace!(event = %name, origin = %message.origin, "Event received");
            self.fire(name, payload);
        }
    }

    fn fire(&self, name: &str, payload: &Value) {
        let callbacks = match self.subscriptions.read().get(name) {
            Some(set) => set.snapshot(),
            None => return,
        };
        for callback in callbacks {
            callback(name, payload);
        }
    }
}
