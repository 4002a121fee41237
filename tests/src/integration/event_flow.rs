//! Event relay behavior across nodes: fire-and-forget fan-out with no
//! replay, scoped strictly by event name.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use crate::integration::harness::{settle, ClusterHarness};

    type EventLog = Arc<Mutex<Vec<Value>>>;

    fn subscribe_log(cluster: &ClusterHarness, index: usize, name: &str) -> EventLog {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        cluster.node(index).events().subscribe(
            name,
            Arc::new(move |_name: &str, payload: &Value| {
                sink.lock().push(payload.clone());
            }),
        );
        log
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_event_reaches_local_and_remote_subscribers() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let local = subscribe_log(&cluster, 0, "user/created");
        let remote = subscribe_log(&cluster, 1, "user/created");

        cluster
            .node(0)
            .events()
            .emit("user/created", json!({ "id": 7 }))
            .await;
        settle().await;

        assert_eq!(local.lock().as_slice(), [json!({ "id": 7 })]);
        assert_eq!(remote.lock().as_slice(), [json!({ "id": 7 })]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unsubscribe_stops_delivery() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let id = cluster.node(1).events().subscribe(
            "tick",
            Arc::new(move |_name: &str, payload: &Value| {
                sink.lock().push(payload.clone());
            }),
        );

        cluster.node(0).events().emit("tick", json!(1)).await;
        settle().await;
        assert!(cluster.node(1).events().unsubscribe("tick", id));

        cluster.node(0).events().emit("tick", json!(2)).await;
        settle().await;

        // Only the emission from before the unsubscribe got through.
        assert_eq!(log.lock().as_slice(), [json!(1)]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_are_scoped_by_name() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let placed = subscribe_log(&cluster, 1, "orders/placed");

        cluster
            .node(0)
            .events()
            .emit("orders/cancelled", json!({ "id": 1 }))
            .await;
        settle().await;

        assert!(placed.lock().is_empty());

        cluster.shutdown().await;
    }
}
