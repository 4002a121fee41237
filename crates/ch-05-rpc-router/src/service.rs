//! # RPC Router Service
//!
//! Owns three tables: local handlers, the remote provider directory built
//! from `rpc.<name>` adverts, and the pending-call map keyed by correlation
//! id. Provider selection is deterministic: a local handler wins outright,
//! otherwise the earliest-advertised provider still known for the name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{topics, ClusterMessage, MessageBody, ServerName};

use crate::config::RpcConfig;
use crate::error::RpcError;
use crate::responder::{RpcResponder, NO_RESPONSE};

/// A provider handler: receives the argument and a single-use response
/// handle, and must resolve it exactly once.
pub type RpcHandler = dyn Fn(Value, RpcResponder) + Send + Sync;

struct PendingCall {
    rpc: String,
    provider: ServerName,
    reply: oneshot::Sender<Result<Value, RpcError>>,
}

struct RouterState {
    /// Procedures this node provides.
    handlers: HashMap<String, Arc<RpcHandler>>,
    /// Remote providers per procedure, in advert observation order.
    remote: HashMap<String, Vec<ServerName>>,
    /// In-flight outbound calls keyed by correlation id.
    pending: HashMap<Uuid, PendingCall>,
}

/// Call router for one node.
pub struct RpcRouter {
    config: RpcConfig,
    local: ServerName,
    bus: Arc<dyn MessagePublisher>,
    state: RwLock<RouterState>,
}

impl RpcRouter {
    pub fn new(config: RpcConfig, local: ServerName, bus: Arc<dyn MessagePublisher>) -> Self {
        Self {
            config,
            local,
            bus,
            state: RwLock::new(RouterState {
                handlers: HashMap::new(),
                remote: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Register this node as a provider and advertise it cluster-wide.
    ///
    /// Providing a name this node already serves swaps the handler in place;
    /// the directory entry is unchanged, so no fresh advert goes out.
    /// Returns whether the name was newly provided.
    pub async fn provide(&self, name: &str, handler: Arc<RpcHandler>) -> bool {
        let newly_provided = self
            .state
            .write()
            .handlers
            .insert(name.to_owned(), handler)
            .is_none();
        if newly_provided {
            self.publish_advert(name, true).await;
        }
        newly_provided
    }

    /// Deregister and broadcast the removal promptly so future calls do not
    /// route here.
    pub async fn unprovide(&self, name: &str) -> bool {
        let removed = self.state.write().handlers.remove(name).is_some();
        if removed {
            self.publish_advert(name, false).await;
        }
        removed
    }

    /// Call a procedure and await its single response.
    pub async fn make(&self, name: &str, arg: Value) -> Result<Value, RpcError> {
        // A local provider is invoked directly, off the wire.
        let local_handler = self.state.read().handlers.get(name).cloned();
        if let Some(handler) = local_handler {
            let (tx, rx) = oneshot::channel();
            handler(arg, RpcResponder::local(name.to_owned(), tx));
            return match tokio::time::timeout(self.config.call_timeout, rx).await {
                Ok(Ok(result)) => result.map_err(|message| map_handler_error(name, message)),
                Ok(Err(_)) => Err(RpcError::NoResponse(name.to_owned())),
                Err(_) => Err(RpcError::Timeout(name.to_owned())),
            };
        }

        let provider = self
            .state
            .read()
            .remote
            .get(name)
            .and_then(|providers| providers.first().cloned())
            .ok_or_else(|| RpcError::NoProvider(name.to_owned()))?;

        let correlation_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.state.write().pending.insert(
            correlation_id,
            PendingCall {
                rpc: name.to_owned(),
                provider: provider.clone(),
                reply: tx,
            },
        );

        let frame = BusFrame::new(
            topics::inbox(&provider),
            ClusterMessage::new(
                self.local.clone(),
                MessageBody::RpcRequest {
                    correlation_id,
                    rpc: name.to_owned(),
                    arg,
                },
            ),
        );
        self.bus.publish(frame).await;

        match tokio::time::timeout(self.config.call_timeout, rx).await {
            Ok(Ok(result)) => result,
            // The pending entry vanished without an answer; peer-removal
            // cleanup always resolves before dropping, so this is a bug net.
            Ok(Err(_)) => Err(RpcError::NoResponse(name.to_owned())),
            Err(_) => {
                self.state.write().pending.remove(&correlation_id);
                Err(RpcError::Timeout(name.to_owned()))
            }
        }
    }

    /// Handle one provider advert from `rpc.<name>`.
    pub fn handle_frame(&self, message: &ClusterMessage) {
        match &message.body {
            MessageBody::Provide { rpc } => {
                self.register_remote(rpc, &message.origin);
            }
            MessageBody::Unprovide { rpc } => {
                let mut state = self.state.write();
                if let Some(providers) = state.remote.get_mut(rpc) {
                    providers.retain(|p| p != &message.origin);
                    if providers.is_empty() {
                        state.remote.remove(rpc);
                    }
                }
            }
            _ => {}
        }
    }

    /// Handle one frame addressed to this node's private inbox.
    pub async fn handle_inbox(&self, message: &ClusterMessage) {
        match &message.body {
            MessageBody::RpcRequest {
                correlation_id,
                rpc,
                arg,
            } => {
                let handler = self.state.read().handlers.get(rpc).cloned();
                let responder = RpcResponder::remote(
                    rpc.clone(),
                    self.bus.clone(),
                    self.local.clone(),
                    message.origin.clone(),
                    *correlation_id,
                );
                match handler {
                    Some(handler) => {
                        // Run the handler off the inbox pump so a slow
                        // provider cannot stall unrelated inbox traffic.
                        let arg = arg.clone();
                        tokio::spawn(async move {
                            handler(arg, responder);
                        });
                    }
                    None => {
                        // Raced an unprovide; tell the caller instead of
                        // letting it time out.
                        warn!(rpc = %rpc, "Request for a procedure this node no longer provides");
                        responder.error(format!("no provider for '{rpc}'"));
                    }
                }
            }
            MessageBody::RpcResponse {
                correlation_id,
                result,
            } => {
                let pending = self.state.write().pending.remove(correlation_id);
                match pending {
                    Some(call) => {
                        let mapped = result
                            .clone()
                            .map_err(|message| map_handler_error(&call.rpc, message));
                        let _ = call.reply.send(mapped);
                    }
                    None => {
                        debug!(%correlation_id, "Response for unknown or timed-out call ignored");
                    }
                }
            }
            _ => {}
        }
    }

    /// Drop a vanished node from the provider directory and fail its
    /// in-flight calls.
    pub fn handle_peer_removed(&self, server: &ServerName) {
        let failed: Vec<PendingCall> = {
            let mut state = self.state.write();
            for providers in state.remote.values_mut() {
                providers.retain(|p| p != server);
            }
            state.remote.retain(|_, providers| !providers.is_empty());

            let lost: Vec<Uuid> = state
                .pending
                .iter()
                .filter(|(_, call)| call.provider == *server)
                .map(|(id, _)| *id)
                .collect();
            lost.into_iter()
                .filter_map(|id| state.pending.remove(&id))
                .collect()
        };
        for call in failed {
            let rpc = call.rpc.clone();
            let _ = call.reply.send(Err(RpcError::ProviderLost(rpc)));
        }
    }

    /// Procedures this node provides, shipped in bootstrap syncs.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Merge a bootstrap snapshot of another node's provider names.
    pub fn import_providers(&self, server: &ServerName, names: &[String]) {
        for name in names {
            self.register_remote(name, server);
        }
    }

    /// Remote providers currently known for a procedure, in advert order.
    #[must_use]
    pub fn known_providers(&self, name: &str) -> Vec<ServerName> {
        self.state.read().remote.get(name).cloned().unwrap_or_default()
    }

    fn register_remote(&self, rpc: &str, server: &ServerName) {
        let mut state = self.state.write();
        let providers = state.remote.entry(rpc.to_owned()).or_default();
        if !providers.contains(server) {
            providers.push(server.clone());
        }
    }

    async fn publish_advert(&self, name: &str, provide: bool) {
        let body = if provide {
            MessageBody::Provide {
                rpc: name.to_owned(),
            }
        } else {
            MessageBody::Unprovide {
                rpc: name.to_owned(),
            }
        };
        let frame = BusFrame::new(
            topics::rpc(name),
            ClusterMessage::new(self.local.clone(), body),
        );
        self.bus.publish(frame).await;
    }
}

fn map_handler_error(rpc: &str, message: String) -> RpcError {
    if message == NO_RESPONSE {
        RpcError::NoResponse(rpc.to_owned())
    } else {
        RpcError::Remote(message)
    }
}
