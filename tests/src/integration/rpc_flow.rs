//! RPC routing across nodes: remote round-trips, local preference, and the
//! full set of failure modes a caller can observe.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ch_05_rpc_router::{RpcError, RpcResponder};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use crate::integration::harness::{settle, ClusterHarness};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_call_round_trip() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(0)
            .rpc()
            .provide(
                "add-suffix",
                Arc::new(|arg: Value, responder: RpcResponder| {
                    let text = arg.as_str().unwrap_or_default();
                    responder.send(json!(format!("{text}-done")));
                }),
            )
            .await;
        settle().await;

        // A random prefix proves the answer was computed from this exact
        // argument rather than replayed.
        let prefix: u32 = rand::random();
        let result = cluster
            .node(1)
            .rpc()
            .make("add-suffix", json!(format!("req-{prefix}")))
            .await;

        assert_eq!(result, Ok(json!(format!("req-{prefix}-done"))));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_local_provider_is_preferred() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        for index in 0..2 {
            let name = cluster.node(index).server_name().to_string();
            cluster
                .node(index)
                .rpc()
                .provide(
                    "whoami",
                    Arc::new(move |_arg: Value, responder: RpcResponder| {
                        responder.send(json!(name.clone()));
                    }),
                )
                .await;
        }
        settle().await;

        // Both nodes know a remote provider too, but answer from their own.
        let from_a = cluster.node(0).rpc().make("whoami", json!(null)).await;
        let from_b = cluster.node(1).rpc().make("whoami", json!(null)).await;

        assert_eq!(from_a, Ok(json!("node-a")));
        assert_eq!(from_b, Ok(json!("node-b")));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_call_without_provider_fails_fast() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let result = cluster.node(1).rpc().make("nope", json!(null)).await;

        assert_eq!(result, Err(RpcError::NoProvider("nope".to_owned())));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dropped_responder_resolves_to_no_response() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(0)
            .rpc()
            .provide(
                "void",
                Arc::new(|_arg: Value, _responder: RpcResponder| {
                    // Handler forgets to answer; the dropped handle reports it.
                }),
            )
            .await;
        settle().await;

        let result = cluster.node(1).rpc().make("void", json!(null)).await;

        assert_eq!(result, Err(RpcError::NoResponse("void".to_owned())));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handler_error_reaches_the_caller() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(0)
            .rpc()
            .provide(
                "always-fails",
                Arc::new(|_arg: Value, responder: RpcResponder| {
                    responder.error("boom");
                }),
            )
            .await;
        settle().await;

        let result = cluster.node(1).rpc().make("always-fails", json!(null)).await;

        assert_eq!(result, Err(RpcError::Remote("boom".to_owned())));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_provider_crash_fails_the_in_flight_call() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        // The handler parks its responder, so the call stays in flight
        // until something else resolves it.
        let parked: Arc<Mutex<Vec<RpcResponder>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let parked = Arc::clone(&parked);
            cluster
                .node(0)
                .rpc()
                .provide(
                    "stall",
                    Arc::new(move |_arg: Value, responder: RpcResponder| {
                        parked.lock().push(responder);
                    }),
                )
                .await;
        }
        settle().await;

        let rpc = cluster.node(1).rpc();
        let call = tokio::spawn(async move { rpc.make("stall", json!(null)).await });
        settle().await;

        // Act: the provider dies. Liveness expiry resolves the call well
        // before the two-second call timeout would.
        cluster.node(0).halt();
        let result = call.await.expect("join");

        assert_eq!(result, Err(RpcError::ProviderLost("stall".to_owned())));
        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unprovide_withdraws_the_route() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(0)
            .rpc()
            .provide(
                "temp",
                Arc::new(|_arg: Value, responder: RpcResponder| {
                    responder.send(json!(true));
                }),
            )
            .await;
        settle().await;
        assert_eq!(
            cluster.node(1).rpc().make("temp", json!(null)).await,
            Ok(json!(true))
        );

        assert!(cluster.node(0).rpc().unprovide("temp").await);
        settle().await;

        let result = cluster.node(1).rpc().make("temp", json!(null)).await;
        assert_eq!(result, Err(RpcError::NoProvider("temp".to_owned())));

        cluster.shutdown().await;
    }
}
