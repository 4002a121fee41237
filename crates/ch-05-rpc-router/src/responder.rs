//! # Response Handle
//!
//! The consume-on-send handle given to every provider handler. Exactly one
//! response leaves a handler: `send`/`error` take the handle by value, and
//! dropping it unused dispatches a "no response" error so the caller is
//! never left hanging.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use shared_bus::{BusFrame, MessagePublisher};
use shared_types::{topics, ClusterMessage, MessageBody, ServerName};

/// Sentinel carried on the wire when a handler never responded;
/// the caller maps it back to [`crate::RpcError::NoResponse`].
pub(crate) const NO_RESPONSE: &str = "no response from provider";

enum ReplyRoute {
    /// Response travels to the calling node's private inbox.
    Remote {
        bus: Arc<dyn MessagePublisher>,
        local: ServerName,
        reply_to: ServerName,
        correlation_id: Uuid,
    },
    /// Caller is on this node; complete its continuation directly.
    Local {
        reply: oneshot::Sender<Result<Value, String>>,
    },
}

/// One-shot response handle for a single RPC request.
pub struct RpcResponder {
    rpc: String,
    route: Option<ReplyRoute>,
}

impl RpcResponder {
    pub(crate) fn remote(
        rpc: String,
        bus: Arc<dyn MessagePublisher>,
        local: ServerName,
        reply_to: ServerName,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            rpc,
            route: Some(ReplyRoute::Remote {
                bus,
                local,
                reply_to,
                correlation_id,
            }),
        }
    }

    pub(crate) fn local(rpc: String, reply: oneshot::Sender<Result<Value, String>>) -> Self {
        Self {
            rpc,
            route: Some(ReplyRoute::Local { reply }),
        }
    }

    /// Deliver the successful result.
    pub fn send(mut self, result: Value) {
        self.dispatch(Ok(result));
    }

    /// Deliver a handler error.
    pub fn error(mut self, message: impl Into<String>) {
        self.dispatch(Err(message.into()));
    }

    fn dispatch(&mut self, result: Result<Value, String>) {
        match self.route.take() {
            Some(ReplyRoute::Local { reply }) => {
                // A caller that timed out already dropped the receiver.
                let _ = reply.send(result);
            }
            Some(ReplyRoute::Remote {
                bus,
                local,
                reply_to,
                correlation_id,
            }) => {
                let frame = BusFrame::new(
                    topics::inbox(&reply_to),
                    ClusterMessage::new(
                        local,
                        MessageBody::RpcResponse {
                            correlation_id,
                            result,
                        },
                    ),
                );
                // Handlers are synchronous; ship the publish to the reactor.
                tokio::spawn(async move {
                    bus.publish(frame).await;
                });
            }
            None => {}
        }
    }
}

impl Drop for RpcResponder {
    fn drop(&mut self) {
        if self.route.is_some() {
            debug!(rpc = %self.rpc, "Handler dropped its responder without answering");
            self.dispatch(Err(NO_RESPONSE.to_owned()));
        }
    }
}
