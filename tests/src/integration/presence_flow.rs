//! Presence directory behavior across nodes: logins become visible
//! everywhere, logouts and crashes clean up, duplicates stay silent.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use shared_types::DeviceId;

    use crate::integration::harness::{settle, settle_for, ClusterHarness, LIVENESS};

    type TransitionLog = Arc<Mutex<Vec<(String, bool)>>>;

    fn record_transitions(cluster: &ClusterHarness, index: usize) -> TransitionLog {
        let log: TransitionLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        cluster
            .node(index)
            .presence()
            .subscribe(Arc::new(move |device: &DeviceId, online: bool| {
                sink.lock().push((device.to_string(), online));
            }));
        log
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_login_is_visible_on_every_node() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(0)
            .presence()
            .client_login(DeviceId::from("alice"))
            .await;
        settle().await;

        let expected = vec![DeviceId::from("alice")];
        assert_eq!(cluster.node(0).presence().get_all(), expected);
        assert_eq!(cluster.node(1).presence().get_all(), expected);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_logout_notifies_remote_subscribers() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;
        let log = record_transitions(&cluster, 1);

        cluster
            .node(0)
            .presence()
            .client_login(DeviceId::from("alice"))
            .await;
        settle().await;
        cluster
            .node(0)
            .presence()
            .client_logout(DeviceId::from("alice"))
            .await;
        settle().await;

        assert_eq!(
            log.lock().as_slice(),
            [("alice".to_owned(), true), ("alice".to_owned(), false)]
        );
        assert!(cluster.node(1).presence().get_all().is_empty());

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_login_is_a_single_transition() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;
        let log = record_transitions(&cluster, 1);

        let presence = cluster.node(0).presence();
        presence.client_login(DeviceId::from("alice")).await;
        presence.client_login(DeviceId::from("alice")).await;
        settle().await;

        assert_eq!(log.lock().as_slice(), [("alice".to_owned(), true)]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_node_crash_logs_out_its_clients() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;
        let log = record_transitions(&cluster, 1);

        cluster
            .node(0)
            .presence()
            .client_login(DeviceId::from("alice"))
            .await;
        settle().await;
        assert_eq!(
            cluster.node(1).presence().get_all(),
            vec![DeviceId::from("alice")]
        );

        // Act: the hosting node dies without logging anyone out.
        cluster.node(0).halt();
        settle_for(LIVENESS + Duration::from_millis(150)).await;

        // Assert: expiry cleaned up the ghost and fired the logout.
        assert!(cluster.node(1).presence().get_all().is_empty());
        assert_eq!(
            log.lock().as_slice(),
            [("alice".to_owned(), true), ("alice".to_owned(), false)]
        );

        cluster.shutdown().await;
    }
}
