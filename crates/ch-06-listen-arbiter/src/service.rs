//! # Listener Arbiter Service
//!
//! Tracks three tables: the local glob patterns with their handlers, the
//! cluster-wide interest per record name, and the claims table mapping each
//! accepted name to its owning server. Patterns never leave this node; the
//! bus only carries interest edges, claims and releases, and every node runs
//! its own notification rounds against its own patterns.
//!
//! ## Arbitration Rules
//!
//! - A round fires for a name only while it is unclaimed and has live
//!   interest.
//! - The first accept recorded in the claims table wins; later accepts for
//!   the same name lose silently, as does an accept whose interest has
//!   meanwhile vanished.
//! - When two accepts cross on the wire, the lexicographically smaller
//!   server name keeps the claim and the displaced node's handler is told
//!   the match is gone. The winner re-broadcasts its claim, so a claimant
//!   that never saw the original converges too.
//! - A claim evaporates when its owner releases, unlistens, loses its last
//!   interested subscriber, or drops out of the peer set. Remaining interest
//!   then triggers a fresh round everywhere.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glob::Pattern;
use parking_lot::RwLock;
use tracing::{debug, info};

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{topics, ClusterMessage, MessageBody, ServerName};

use crate::error::ListenError;
use crate::responder::ListenResponder;

/// A listen handler: receives the matched record name, whether the match is
/// live, and a single-use accept handle. Gone-matches carry an inert handle.
pub type ListenHandler = dyn Fn(&str, bool, ListenResponder) + Send + Sync;

struct PatternEntry {
    raw: String,
    compiled: Pattern,
    handler: Arc<ListenHandler>,
}

pub(crate) struct Claim {
    pub(crate) owner: ServerName,
    /// The local pattern that accepted, when the owner is this node.
    pub(crate) pattern: Option<String>,
}

pub(crate) struct ArbiterState {
    /// Local patterns in registration order.
    patterns: Vec<PatternEntry>,
    /// Servers with at least one subscriber, per record name.
    pub(crate) interest: HashMap<String, HashSet<ServerName>>,
    /// Accepted matches, cluster-wide view.
    pub(crate) claims: HashMap<String, Claim>,
}

/// Wildcard-listener arbitration for one node.
pub struct ListenerArbiter {
    local: ServerName,
    bus: Arc<dyn MessagePublisher>,
    state: Arc<RwLock<ArbiterState>>,
}

impl ListenerArbiter {
    pub fn new(local: ServerName, bus: Arc<dyn MessagePublisher>) -> Self {
        Self {
            local,
            bus,
            state: Arc::new(RwLock::new(ArbiterState {
                patterns: Vec::new(),
                interest: HashMap::new(),
                claims: HashMap::new(),
            })),
        }
    }

    /// Register a glob pattern over record names.
    ///
    /// Fires the handler immediately for every unclaimed name that already
    /// has live interest, so a listener arriving late sees the same matches
    /// as one registered from the start.
    pub fn listen(&self, pattern: &str, handler: Arc<ListenHandler>) -> Result<(), ListenError> {
        let compiled = Pattern::new(pattern).map_err(|e| ListenError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;

        let backlog: Vec<String> = {
            let mut state = self.state.write();
            if state.patterns.iter().any(|entry| entry.raw == pattern) {
                return Err(ListenError::AlreadyListening(pattern.to_owned()));
            }
            let names = state
                .interest
                .keys()
                .filter(|name| !state.claims.contains_key(*name) && compiled.matches(name))
                .cloned()
                .collect();
            state.patterns.push(PatternEntry {
                raw: pattern.to_owned(),
                compiled,
                handler: handler.clone(),
            });
            names
        };

        for name in backlog {
            handler(&name, true, self.armed_responder(&name, pattern));
        }
        Ok(())
    }

    /// Deregister a pattern, releasing any matches it currently serves.
    ///
    /// Releases are broadcast; remaining interest triggers a fresh
    /// notification round here and on every other node.
    pub async fn unlisten(&self, pattern: &str) -> bool {
        let released: Vec<String> = {
            let mut state = self.state.write();
            let before = state.patterns.len();
            state.patterns.retain(|entry| entry.raw != pattern);
            if state.patterns.len() == before {
                return false;
            }
            let owned: Vec<String> = state
                .claims
                .iter()
                .filter(|(_, claim)| {
                    claim.owner == self.local && claim.pattern.as_deref() == Some(pattern)
                })
                .map(|(name, _)| name.clone())
                .collect();
            for name in &owned {
                state.claims.remove(name);
            }
            owned
        };

        for name in &released {
            self.bus.publish(self.release_frame(name)).await;
            self.notify_round(name);
        }
        true
    }

    /// Apply an interest edge from this node's own record synchronizer.
    ///
    /// Local edges arrive through this call rather than the bus, since a
    /// node drops its own frames.
    pub fn local_interest_edge(&self, name: &str, active: bool) {
        let local = self.local.clone();
        if active {
            self.interest_added(name, local);
        } else {
            self.interest_removed(name, &local);
        }
    }

    /// Handle one frame from the listen control topic.
    pub fn handle_frame(&self, message: &ClusterMessage) {
        match &message.body {
            MessageBody::InterestAdded { name } => {
                self.interest_added(name, message.origin.clone());
            }
            MessageBody::InterestRemoved { name } => {
                self.interest_removed(name, &message.origin);
            }
            MessageBody::ListenClaim { name } => {
                self.record_claim(name, &message.origin);
            }
            MessageBody::ListenRelease { name } => {
                self.clear_claim(name, &message.origin);
            }
            _ => {}
        }
    }

    /// Drop a vanished node's interest and claims, re-offering matches that
    /// remain live.
    pub fn handle_peer_removed(&self, server: &ServerName) {
        let (rounds, releases) = {
            let mut state = self.state.write();

            let mut emptied = Vec::new();
            state.interest.retain(|name, servers| {
                servers.remove(server);
                if servers.is_empty() {
                    emptied.push(name.clone());
                    false
                } else {
                    true
                }
            });

            // Claims held by the vanished node become unclaimed again.
            let dropped: Vec<String> = state
                .claims
                .iter()
                .filter(|(_, claim)| claim.owner == *server)
                .map(|(name, _)| name.clone())
                .collect();
            let mut rounds = Vec::new();
            for name in &dropped {
                state.claims.remove(name);
                if state.interest.contains_key(name) {
                    rounds.push(name.clone());
                }
            }

            // Claims this node holds for names whose interest just died
            // with the peer are dropped and broadcast as released.
            let mut releases = Vec::new();
            for name in &emptied {
                if let Some(claim) = state.claims.get(name) {
                    if claim.owner == self.local {
                        releases.push((name.clone(), claim.pattern.clone()));
                    }
                }
            }
            for (name, _) in &releases {
                state.claims.remove(name);
            }

            (rounds, releases)
        };

        for (name, pattern) in releases {
            self.spawn_release(&name);
            self.fire_dropped(&name, pattern.as_deref());
        }
        for name in rounds {
            self.notify_round(&name);
        }
    }

    /// Merge a bootstrap snapshot from an established peer.
    ///
    /// Claims land first so already-served names do not get re-offered;
    /// imported interest for unclaimed names fires the usual rounds.
    pub fn import_state(&self, server: &ServerName, claims: &[String], interest: &[String]) {
        {
            let mut state = self.state.write();
            for name in claims {
                state.claims.entry(name.clone()).or_insert_with(|| Claim {
                    owner: server.clone(),
                    pattern: None,
                });
            }
            for name in interest {
                state
                    .interest
                    .entry(name.clone())
                    .or_default()
                    .insert(server.clone());
            }
        }
        for name in interest {
            self.notify_round(name);
        }
    }

    /// Names this node currently serves, shipped in bootstrap syncs.
    #[must_use]
    pub fn owned_claims(&self) -> Vec<String> {
        let state = self.state.read();
        let mut names: Vec<String> = state
            .claims
            .iter()
            .filter(|(_, claim)| claim.owner == self.local)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Current claim owner for a name, if any.
    #[must_use]
    pub fn claim_owner(&self, name: &str) -> Option<ServerName> {
        self.state
            .read()
            .claims
            .get(name)
            .map(|claim| claim.owner.clone())
    }

    /// Whether a handler is registered for this exact pattern.
    #[must_use]
    pub fn is_listening(&self, pattern: &str) -> bool {
        self.state
            .read()
            .patterns
            .iter()
            .any(|entry| entry.raw == pattern)
    }

    fn interest_added(&self, name: &str, server: ServerName) {
        let round = {
            let mut state = self.state.write();
            state
                .interest
                .entry(name.to_owned())
                .or_default()
                .insert(server);
            !state.claims.contains_key(name)
        };
        if round {
            self.notify_round(name);
        }
    }

    fn interest_removed(&self, name: &str, server: &ServerName) {
        let release = {
            let mut state = self.state.write();
            let Some(servers) = state.interest.get_mut(name) else {
                return;
            };
            servers.remove(server);
            if !servers.is_empty() {
                return;
            }
            state.interest.remove(name);
            // The last subscriber anywhere is gone; if this node serves the
            // name, stop and tell the cluster.
            match state.claims.get(name) {
                Some(claim) if claim.owner == self.local => {
                    let pattern = claim.pattern.clone();
                    state.claims.remove(name);
                    Some(pattern)
                }
                _ => None,
            }
        };
        if let Some(pattern) = release {
            self.spawn_release(name);
            self.fire_dropped(name, pattern.as_deref());
        }
    }

    fn record_claim(&self, name: &str, origin: &ServerName) {
        let (displaced, reassert) = {
            let mut state = self.state.write();
            match state.claims.get(name) {
                None => {
                    state.claims.insert(
                        name.to_owned(),
                        Claim {
                            owner: origin.clone(),
                            pattern: None,
                        },
                    );
                    (None, false)
                }
                Some(existing) if existing.owner == *origin => (None, false),
                Some(existing) => {
                    // Two accepts crossed on the wire; the smaller server
                    // name keeps the claim on every node.
                    if *origin < existing.owner {
                        let was_local = existing.owner == self.local;
                        let pattern = existing.pattern.clone();
                        state.claims.insert(
                            name.to_owned(),
                            Claim {
                                owner: origin.clone(),
                                pattern: None,
                            },
                        );
                        if was_local {
                            info!(name, winner = %origin, "Crossing claim displaced this node");
                            (Some(pattern), false)
                        } else {
                            (None, false)
                        }
                    } else {
                        // A claimant that raced a crashed owner's expiry may
                        // never have seen the standing claim; the owner
                        // answers by broadcasting it again.
                        let reassert = existing.owner == self.local;
                        debug!(name, loser = %origin, "Crossing claim lost to the current owner");
                        (None, reassert)
                    }
                }
            }
        };
        if reassert {
            self.spawn_claim(name);
        }
        if let Some(pattern) = displaced {
            self.fire_dropped(name, pattern.as_deref());
        }
    }

    fn clear_claim(&self, name: &str, origin: &ServerName) {
        {
            let mut state = self.state.write();
            match state.claims.get(name) {
                Some(claim) if claim.owner == *origin => {
                    state.claims.remove(name);
                }
                _ => {
                    debug!(name, from = %origin, "Release from a non-owner ignored");
                    return;
                }
            }
        }
        self.notify_round(name);
    }

    /// Offer an unclaimed live match to every local pattern covering it.
    fn notify_round(&self, name: &str) {
        let matched: Vec<(String, Arc<ListenHandler>)> = {
            let state = self.state.read();
            if state.claims.contains_key(name) || !state.interest.contains_key(name) {
                return;
            }
            state
                .patterns
                .iter()
                .filter(|entry| entry.compiled.matches(name))
                .map(|entry| (entry.raw.clone(), entry.handler.clone()))
                .collect()
        };
        for (pattern, handler) in matched {
            handler(name, true, self.armed_responder(name, &pattern));
        }
    }

    /// Tell the local handler that was serving `name` that the match is gone.
    fn fire_dropped(&self, name: &str, pattern: Option<&str>) {
        let handler = {
            let state = self.state.read();
            pattern.and_then(|raw| {
                state
                    .patterns
                    .iter()
                    .find(|entry| entry.raw == raw)
                    .map(|entry| entry.handler.clone())
            })
        };
        if let Some(handler) = handler {
            handler(name, false, ListenResponder::inert(name.to_owned()));
        }
    }

    fn armed_responder(&self, name: &str, pattern: &str) -> ListenResponder {
        ListenResponder::armed(
            name.to_owned(),
            pattern.to_owned(),
            Arc::downgrade(&self.state),
            self.bus.clone(),
            self.local.clone(),
        )
    }

    fn release_frame(&self, name: &str) -> BusFrame {
        BusFrame::new(
            topics::LISTEN,
            ClusterMessage::new(
                self.local.clone(),
                MessageBody::ListenRelease {
                    name: name.to_owned(),
                },
            ),
        )
    }

    fn spawn_release(&self, name: &str) {
        let bus = self.bus.clone();
        let frame = self.release_frame(name);
        tokio::spawn(async move {
            bus.publish(frame).await;
        });
    }

    /// Re-broadcast this node's standing claim on a name.
    fn spawn_claim(&self, name: &str) {
        let bus = self.bus.clone();
        let frame = BusFrame::new(
            topics::LISTEN,
            ClusterMessage::new(
                self.local.clone(),
                MessageBody::ListenClaim {
                    name: name.to_owned(),
                },
            ),
        );
        tokio::spawn(async move {
            bus.publish(frame).await;
        });
    }
}
