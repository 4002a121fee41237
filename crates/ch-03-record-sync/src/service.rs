//! # Record Synchronizer Service
//!
//! Owns the local record cache. A record lives in the cache from first
//! access (get/set/subscribe) until `discard`; a record that is cached but
//! has zero subscribers keeps its value and keeps answering reads.
//!
//! ## Locking
//!
//! All state sits behind one `parking_lot::RwLock`. Waiters and callbacks
//! are always moved out of the lock before being completed or fired, so a
//! subscriber callback may freely call back into the synchronizer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{
    topics, CallbackSet, ClusterMessage, MessageBody, ServerName, SubscriptionId,
};

use crate::config::RecordConfig;

/// Callback fired with the record name and its new value on every applied
/// update.
pub type RecordCallback = dyn Fn(&str, &Value) + Send + Sync;

/// Callback fired when this node's first subscriber for a name appears
/// (`true`) or its last one disappears (`false`).
pub type InterestCallback = dyn Fn(&str, bool) + Send + Sync;

struct RecordEntry {
    value: Value,
    version: u64,
    author: ServerName,
    /// False while hydrating: the first remote update is accepted
    /// unconditionally and reads are not answered.
    ready: bool,
    subscribers: CallbackSet<RecordCallback>,
    /// Get calls parked until the entry becomes ready.
    waiters: Vec<oneshot::Sender<()>>,
}

impl RecordEntry {
    fn hydrating(local: &ServerName) -> Self {
        Self {
            value: Value::Null,
            version: 0,
            author: local.clone(),
            ready: false,
            subscribers: CallbackSet::new(),
            waiters: Vec::new(),
        }
    }
}

/// How a `get` call will obtain its value.
enum ReadPlan {
    Ready(Value),
    /// Hydration already in flight; park on it.
    Wait(oneshot::Receiver<()>),
    /// Fresh entry; broadcast a read request, then park.
    Request(oneshot::Receiver<()>),
}

/// Replicated document store for one node.
pub struct RecordSynchronizer {
    config: RecordConfig,
    local: ServerName,
    bus: Arc<dyn MessagePublisher>,
    records: RwLock<HashMap<String, RecordEntry>>,
    interest: RwLock<CallbackSet<InterestCallback>>,
}

impl RecordSynchronizer {
    pub fn new(config: RecordConfig, local: ServerName, bus: Arc<dyn MessagePublisher>) -> Self {
        Self {
            config,
            local,
            bus,
            records: RwLock::new(HashMap::new()),
            interest: RwLock::new(CallbackSet::new()),
        }
    }

    /// Write a record. Increments the version, broadcasts the update, and
    /// notifies local subscribers synchronously. Returns the new version.
    pub async fn set(&self, name: &str, value: Value) -> u64 {
        // A blind write to an unseen record would start at version 1 and
        // lose to any existing copy; hydrate first so the increment lands
        // on top of the cluster's current version.
        if !self.is_cached(name) {
            let _ = self.get(name).await;
        }

        let (version, waiters, subscribers) = {
            let mut records = self.records.write();
            let entry = records
                .entry(name.to_owned())
                .or_insert_with(|| RecordEntry::hydrating(&self.local));
            entry.ready = true;
            entry.version += 1;
            entry.value = value.clone();
            entry.author = self.local.clone();
            (
                entry.version,
                std::mem::take(&mut entry.waiters),
                entry.subscribers.snapshot(),
            )
        };

        for waiter in waiters {
            let _ = waiter.send(());
        }
        for callback in subscribers {
            callback(name, &value);
        }

        self.publish(
            name,
            MessageBody::RecordUpdate {
                name: name.to_owned(),
                value,
                version,
                author: self.local.clone(),
            },
        )
        .await;
        version
    }

    /// Read a record. Answers from the cache when hydrated; otherwise
    /// broadcasts a read request and waits up to the read timeout for any
    /// holder to answer. A record nobody holds resolves to null at version 0.
    pub async fn get(&self, name: &str) -> Value {
        let plan = {
            let mut records = self.records.write();
            match records.get_mut(name) {
                Some(entry) if entry.ready => ReadPlan::Ready(entry.value.clone()),
                Some(entry) => {
                    let (tx, rx) = oneshot::channel();
                    entry.waiters.push(tx);
                    ReadPlan::Wait(rx)
                }
                None => {
                    let mut entry = RecordEntry::hydrating(&self.local);
                    let (tx, rx) = oneshot::channel();
                    entry.waiters.push(tx);
                    records.insert(name.to_owned(), entry);
                    ReadPlan::Request(rx)
                }
            }
        };

        match plan {
            ReadPlan::Ready(value) => value,
            ReadPlan::Wait(rx) => self.await_hydration(name, rx).await,
            ReadPlan::Request(rx) => {
                self.publish(
                    name,
                    MessageBody::RecordRead {
                        name: name.to_owned(),
                    },
                )
                .await;
                self.await_hydration(name, rx).await
            }
        }
    }

    /// Attach a subscriber. Hydration is kicked off in the background the
    /// first time a name is seen; the callback fires on every applied update
    /// from then on.
    pub async fn subscribe(&self, name: &str, callback: Arc<RecordCallback>) -> SubscriptionId {
        let (id, created, first) = {
            let mut records = self.records.write();
            let created = !records.contains_key(name);
            let entry = records
                .entry(name.to_owned())
                .or_insert_with(|| RecordEntry::hydrating(&self.local));
            let first = entry.subscribers.is_empty();
            let id = entry.subscribers.insert(callback);
            (id, created, first)
        };

        if created {
            // Non-blocking hydration: the answer lands via the normal
            // update path whenever a holder responds.
            self.publish(
                name,
                MessageBody::RecordRead {
                    name: name.to_owned(),
                },
            )
            .await;
        }
        if first {
            self.interest_edge(name, true).await;
        }
        id
    }

    /// Detach a subscriber. The cached value survives until `discard`.
    pub async fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let (removed, last) = {
            let mut records = self.records.write();
            match records.get_mut(name) {
                Some(entry) => {
                    let removed = entry.subscribers.remove(id);
                    (removed, removed && entry.subscribers.is_empty())
                }
                None => (false, false),
            }
        };
        if last {
            self.interest_edge(name, false).await;
        }
        removed
    }

    /// Evict a record from the local cache entirely. Any parked reads
    /// resolve to null; the next access re-hydrates from the cluster.
    pub async fn discard(&self, name: &str) -> bool {
        let (existed, had_subscribers) = match self.records.write().remove(name) {
            Some(entry) => (true, !entry.subscribers.is_empty()),
            None => (false, false),
        };
        if had_subscribers {
            self.interest_edge(name, false).await;
        }
        existed
    }

    /// Handle one frame from a record data topic.
    pub async fn handle_frame(&self, message: &ClusterMessage) {
        match &message.body {
            MessageBody::RecordUpdate {
                name,
                value,
                version,
                author,
            } => self.apply_remote(name, value, *version, author),
            MessageBody::RecordRead { name } => {
                if let Some(answer) = self.answer_for(name) {
                    self.publish(name, answer).await;
                }
            }
            _ => {}
        }
    }

    /// Register a local-interest edge listener.
    pub fn on_interest_change(&self, callback: Arc<InterestCallback>) -> SubscriptionId {
        self.interest.write().insert(callback)
    }

    /// Names with at least one local subscriber, shipped in bootstrap syncs.
    #[must_use]
    pub fn local_interest(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .filter(|(_, entry)| !entry.subscribers.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Current version of a cached record.
    #[must_use]
    pub fn version_of(&self, name: &str) -> Option<u64> {
        self.records.read().get(name).map(|entry| entry.version)
    }

    #[must_use]
    pub fn is_cached(&self, name: &str) -> bool {
        self.records.read().contains_key(name)
    }

    async fn await_hydration(&self, name: &str, rx: oneshot::Receiver<()>) -> Value {
        match tokio::time::timeout(self.config.read_timeout, rx).await {
            // Woken by an update or a concurrent resolution; a dropped
            // sender means the record was discarded mid-read.
            Ok(_) => {}
            Err(_) => {
                // No holder answered: the record is new.
                self.resolve_as_new(name);
            }
        }
        self.records
            .read()
            .get(name)
            .map_or(Value::Null, |entry| entry.value.clone())
    }

    /// Mark a still-hydrating record ready at null/v0 and wake its waiters.
    fn resolve_as_new(&self, name: &str) {
        let waiters = {
            let mut records = self.records.write();
            match records.get_mut(name) {
                Some(entry) if !entry.ready => {
                    entry.ready = true;
                    std::mem::take(&mut entry.waiters)
                }
                _ => Vec::new(),
            }
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    fn apply_remote(&self, name: &str, value: &Value, version: u64, author: &ServerName) {
        let applied = {
            let mut records = self.records.write();
            // Updates for records this node never touched carry no local
            // obligation; drop them.
            let Some(entry) = records.get_mut(name) else {
                return;
            };
            let accept =
                !entry.ready || (version, author) > (entry.version, &entry.author);
            if !accept {
                None
            } else {
                entry.value = value.clone();
                entry.version = version;
                entry.author = author.clone();
                entry.ready = true;
                Some((
                    std::mem::take(&mut entry.waiters),
                    entry.subscribers.snapshot(),
                ))
            }
        };

        match applied {
            Some((waiters, subscribers)) => {
                for waiter in waiters {
                    let _ = waiter.send(());
                }
                for callback in subscribers {
                    callback(name, value);
                }
            }
            None => debug!(record = name, version, "Stale record update ignored"),
        }
    }

    /// Current state for answering a read request. Hydrating entries stay
    /// silent; they have nothing authoritative to say.
    fn answer_for(&self, name: &str) -> Option<MessageBody> {
        let records = self.records.read();
        let entry = records.get(name)?;
        if !entry.ready {
            return None;
        }
        Some(MessageBody::RecordUpdate {
            name: name.to_owned(),
            value: entry.value.clone(),
            version: entry.version,
            author: entry.author.clone(),
        })
    }

    async fn interest_edge(&self, name: &str, active: bool) {
        let body = if active {
            MessageBody::InterestAdded {
                name: name.to_owned(),
            }
        } else {
            MessageBody::InterestRemoved {
                name: name.to_owned(),
            }
        };
        let frame = BusFrame::new(topics::LISTEN, ClusterMessage::new(self.local.clone(), body));
        self.bus.publish(frame).await;

        let callbacks = self.interest.read().snapshot();
        for callback in callbacks {
            callback(name, active);
        }
    }

    async fn publish(&self, name: &str, body: MessageBody) {
        let frame = BusFrame::new(
            topics::record(name),
            ClusterMessage::new(self.local.clone(), body),
        );
        self.bus.publish(frame).await;
    }
}
