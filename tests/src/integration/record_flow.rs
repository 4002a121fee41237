//! Record synchronizer behavior across nodes: replication to subscribers,
//! concurrent-write convergence, hydration from holders, and cache eviction.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use crate::integration::harness::{settle, ClusterHarness};

    type ValueLog = Arc<Mutex<Vec<Value>>>;

    async fn subscribe_log(cluster: &ClusterHarness, index: usize, name: &str) -> ValueLog {
        let log: ValueLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        cluster
            .node(index)
            .records()
            .subscribe(
                name,
                Arc::new(move |_name: &str, value: &Value| {
                    sink.lock().push(value.clone());
                }),
            )
            .await;
        log
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_replicates_to_remote_subscribers() {
        let cluster = ClusterHarness::start(&["node-a", "node-b", "node-c"]).await;

        let seen = subscribe_log(&cluster, 1, "profile/alice").await;
        settle().await;

        // Act: first write anywhere in the cluster. The writer hydrates
        // first, finds no holder, and lands the write at version 1.
        let version = cluster
            .node(0)
            .records()
            .set("profile/alice", json!({ "age": 30 }))
            .await;
        settle().await;

        assert_eq!(version, 1);
        assert_eq!(seen.lock().as_slice(), [json!({ "age": 30 })]);
        assert_eq!(
            cluster.node(1).records().get("profile/alice").await,
            json!({ "age": 30 })
        );
        assert_eq!(cluster.node(1).records().version_of("profile/alice"), Some(1));

        // A node with no subscribers and no reads never caches the record.
        assert!(!cluster.node(2).records().is_cached("profile/alice"));

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_first_writes_converge() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        // Act: both nodes write the same unseen record at once. Each
        // hydrates, lands its own write, and the crossing updates are
        // resolved by the (version, author) rule.
        let records_a = cluster.node(0).records();
        let records_b = cluster.node(1).records();
        let (from_a, from_b) = tokio::join!(
            records_a.set("doc", json!("from-a")),
            records_b.set("doc", json!("from-b")),
        );
        settle().await;
        assert!(from_a >= 1 && from_b >= 1);

        // Assert: whichever write won the race, every node agrees on it.
        let value = cluster.node(0).records().get("doc").await;
        assert!(value == json!("from-a") || value == json!("from-b"));
        assert_eq!(cluster.node(1).records().get("doc").await, value);
        let merged = cluster.node(0).records().version_of("doc");
        assert_eq!(cluster.node(1).records().version_of("doc"), merged);

        // A follow-up write continues from the merged version and wins on
        // version alone.
        let next = cluster.node(0).records().set("doc", json!("again")).await;
        settle().await;
        assert_eq!(Some(next), merged.map(|version| version + 1));
        assert_eq!(cluster.node(1).records().get("doc").await, json!("again"));
        assert_eq!(cluster.node(1).records().version_of("doc"), Some(next));

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_holder_answers_hydrate_late_readers() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(0)
            .records()
            .set("config", json!({ "mode": "prod" }))
            .await;

        // Act: a cold read on another node. The holder's answer arrives long
        // before the read timeout, so the value is real, not null.
        let value = cluster.node(1).records().get("config").await;

        assert_eq!(value, json!({ "mode": "prod" }));
        assert_eq!(cluster.node(1).records().version_of("config"), Some(1));

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_without_holder_resolves_null() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let value = cluster.node(0).records().get("ghost").await;

        assert_eq!(value, Value::Null);
        assert_eq!(cluster.node(0).records().version_of("ghost"), Some(0));
        assert!(cluster.node(0).records().is_cached("ghost"));

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_discard_evicts_and_resubscribe_rehydrates() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let first = subscribe_log(&cluster, 1, "doc").await;
        settle().await;
        cluster.node(0).records().set("doc", json!(1)).await;
        settle().await;
        assert_eq!(first.lock().as_slice(), [json!(1)]);

        // Act: evict the local copy. Updates for unknown records are
        // dropped, so b misses the next write entirely.
        assert!(cluster.node(1).records().discard("doc").await);
        cluster.node(0).records().set("doc", json!(2)).await;
        settle().await;
        assert!(!cluster.node(1).records().is_cached("doc"));

        // Act: a fresh subscription re-hydrates from the holder.
        let second = subscribe_log(&cluster, 1, "doc").await;
        settle().await;

        assert_eq!(cluster.node(1).records().get("doc").await, json!(2));
        assert_eq!(second.lock().as_slice(), [json!(2)]);

        cluster.shutdown().await;
    }
}
