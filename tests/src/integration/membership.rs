//! Discovery, graceful leave, crash detection and restart across a cluster.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use node_runtime::ClusterNode;
    use parking_lot::Mutex;
    use shared_types::PeerAddress;

    use crate::integration::harness::{settle, settle_for, ClusterHarness, LIVENESS};

    fn peer_names(node: &ClusterNode) -> Vec<String> {
        node.peers()
            .iter()
            .map(|peer| peer.server.to_string())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nodes_discover_in_spawn_order() {
        // Setup: four nodes announced one at a time.
        let cluster = ClusterHarness::start(&["node-a", "node-b", "node-c", "node-d"]).await;

        // Assert: the earliest nodes saw each later join as it happened.
        assert_eq!(peer_names(cluster.node(0)), ["node-b", "node-c", "node-d"]);
        assert_eq!(peer_names(cluster.node(1)), ["node-a", "node-c", "node-d"]);

        // Later joiners learned the incumbents from racing heartbeat
        // replies, so only membership is deterministic for them.
        let mut from_c = peer_names(cluster.node(2));
        from_c.sort();
        assert_eq!(from_c, ["node-a", "node-b", "node-d"]);
        let mut from_d = peer_names(cluster.node(3));
        from_d.sort();
        assert_eq!(from_d, ["node-a", "node-b", "node-c"]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_graceful_leave_is_immediate() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let removed = Arc::new(Mutex::new(Vec::new()));
        {
            let removed = Arc::clone(&removed);
            cluster.node(1).on_remove_peer(Arc::new(move |peer: &PeerAddress| {
                removed.lock().push(peer.server.to_string());
            }));
        }

        // Act: a announces its departure.
        cluster.node(0).shutdown().await;
        settle().await;

        // Assert: b dropped it without waiting out the liveness window.
        assert!(cluster.node(1).peers().is_empty());
        assert_eq!(removed.lock().as_slice(), ["node-a".to_owned()]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_crashed_node_expires_after_liveness_window() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let removed = Arc::new(Mutex::new(Vec::new()));
        {
            let removed = Arc::clone(&removed);
            cluster.node(1).on_remove_peer(Arc::new(move |peer: &PeerAddress| {
                removed.lock().push(peer.server.to_string());
            }));
        }

        // Act: a vanishes without a leave notice.
        cluster.node(0).halt();
        settle().await;

        // Assert: still listed while the liveness window runs.
        assert_eq!(cluster.node(1).peers().len(), 1);
        assert!(removed.lock().is_empty());

        // Assert: swept out once the heartbeats stay missing.
        settle_for(LIVENESS + Duration::from_millis(150)).await;
        assert!(cluster.node(1).peers().is_empty());
        assert_eq!(removed.lock().as_slice(), ["node-a".to_owned()]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restart_is_observed_as_remove_then_add() {
        let mut cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let log = Arc::clone(&log);
            cluster.node(0).on_add_peer(Arc::new(move |peer: &PeerAddress| {
                log.lock().push(format!("add {}", peer.server));
            }));
        }
        {
            let log = Arc::clone(&log);
            cluster.node(0).on_remove_peer(Arc::new(move |peer: &PeerAddress| {
                log.lock().push(format!("remove {}", peer.server));
            }));
        }

        // Act: b crashes and a fresh process announces under the same name
        // before the liveness window runs out.
        cluster.node(1).halt();
        cluster.spawn("node-b").await;

        // Assert: a treated the new announcement as a restart, not a
        // duplicate, and replaced its entry.
        assert_eq!(
            log.lock().as_slice(),
            ["remove node-b".to_owned(), "add node-b".to_owned()]
        );
        assert_eq!(peer_names(cluster.node(0)), ["node-b"]);

        cluster.shutdown().await;
    }
}
