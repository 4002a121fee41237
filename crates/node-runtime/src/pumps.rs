//! # Bus Pumps
//!
//! One task per control topic plus the private inbox. Pumps are the only
//! place bus frames enter a node: each drains its subscription until the
//! shutdown flag flips, dropping this node's own frames and frames carrying
//! an unsupported protocol version before handing the rest to its component.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use shared_bus::BusSubscription;
use shared_types::{ClusterMessage, ServerName};

/// Spawn a pump draining `subscription` into `handle` until shutdown.
pub(crate) fn spawn<F, Fut>(
    name: &'static str,
    local: ServerName,
    mut subscription: BusSubscription,
    mut shutdown: watch::Receiver<bool>,
    handle: F,
) -> JoinHandle<()>
where
    F: Fn(ClusterMessage) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = subscription.recv() => {
                    let Some(frame) = frame else {
                        debug!(pump = name, "Bus closed, pump stopping");
                        break;
                    };
                    if let Some(message) = admit(&local, frame.message) {
                        handle(message).await;
                    }
                }
                _ = shutdown.changed() => {
                    debug!(pump = name, "Shutdown signal received");
                    break;
                }
            }
        }
    })
}

/// Admission check shared by every pump.
///
/// Local handlers already ran at the call site, so a node's own frames are
/// dropped here; otherwise every subscriber would fire twice.
fn admit(local: &ServerName, message: ClusterMessage) -> Option<ClusterMessage> {
    if !message.is_supported() {
        warn!(
            version = message.version,
            origin = %message.origin,
            "Dropping frame with unsupported protocol version"
        );
        return None;
    }
    if message.origin == *local {
        return None;
    }
    Some(message)
}
