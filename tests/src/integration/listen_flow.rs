//! Listener arbitration across nodes: one accepted provider per record
//! name, hand-over on release or crash, teardown when interest ends.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ch_06_listen_arbiter::ListenResponder;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_types::ServerName;

    use crate::integration::harness::{settle, settle_for, ClusterHarness, LIVENESS, READ_TIMEOUT};

    fn ignore_record() -> Arc<ch_03_record_sync::RecordCallback> {
        Arc::new(|_name: &str, _value: &Value| {})
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_accepted_listener_provides_the_record() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        // The listener serves any weather record just-in-time once it wins
        // the claim.
        {
            let records = cluster.node(0).records();
            cluster
                .node(0)
                .listeners()
                .listen(
                    "weather/*",
                    Arc::new(move |name: &str, live: bool, responder: ListenResponder| {
                        if live && responder.accept() {
                            let records = Arc::clone(&records);
                            let name = name.to_owned();
                            tokio::spawn(async move {
                                records.set(&name, json!({ "temp": 21 })).await;
                            });
                        }
                    }),
                )
                .expect("listen");
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            cluster
                .node(1)
                .records()
                .subscribe(
                    "weather/london",
                    Arc::new(move |_name: &str, value: &Value| {
                        seen.lock().push(value.clone());
                    }),
                )
                .await;
        }

        // The serving write hydrates first, so allow one read timeout.
        settle_for(READ_TIMEOUT + Duration::from_millis(300)).await;

        assert_eq!(
            cluster.node(0).listeners().owned_claims(),
            ["weather/london".to_owned()]
        );
        assert_eq!(
            cluster.node(1).listeners().claim_owner("weather/london"),
            Some(ServerName::from("node-a"))
        );
        assert_eq!(seen.lock().as_slice(), [json!({ "temp": 21 })]);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exactly_one_listener_wins_a_contested_name() {
        let cluster = ClusterHarness::start(&["node-a", "node-b", "node-c"]).await;

        let accepts = Arc::new(Mutex::new(Vec::new()));
        let dropped = Arc::new(Mutex::new(Vec::new()));
        for index in 0..2 {
            let node_name = cluster.node(index).server_name().to_string();
            let accepts = Arc::clone(&accepts);
            let dropped = Arc::clone(&dropped);
            cluster
                .node(index)
                .listeners()
                .listen(
                    "jobs/*",
                    Arc::new(move |_name: &str, live: bool, responder: ListenResponder| {
                        if live {
                            if responder.accept() {
                                accepts.lock().push(node_name.clone());
                            }
                        } else {
                            dropped.lock().push(node_name.clone());
                        }
                    }),
                )
                .expect("listen");
        }

        // Act: interest appears on a third node. Both listeners accept
        // before they see each other's claim.
        cluster
            .node(2)
            .records()
            .subscribe("jobs/42", ignore_record())
            .await;
        settle_for(Duration::from_millis(300)).await;

        // Assert: the crossing resolved to the smaller node name everywhere,
        // and the loser was told to stand down.
        for index in 0..3 {
            assert_eq!(
                cluster.node(index).listeners().claim_owner("jobs/42"),
                Some(ServerName::from("node-a")),
                "diverged on node {index}"
            );
        }
        let mut accepted_by = accepts.lock().clone();
        accepted_by.sort();
        assert_eq!(accepted_by, ["node-a".to_owned(), "node-b".to_owned()]);
        assert_eq!(dropped.lock().as_slice(), ["node-b".to_owned()]);
        assert_eq!(cluster.node(1).listeners().owned_claims(), Vec::<String>::new());

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unlisten_hands_the_claim_over() {
        let cluster = ClusterHarness::start(&["node-a", "node-b", "node-c"]).await;

        let accept_all = || {
            Arc::new(|_name: &str, live: bool, responder: ListenResponder| {
                if live {
                    responder.accept();
                }
            })
        };

        cluster
            .node(0)
            .listeners()
            .listen("jobs/*", accept_all())
            .expect("listen");
        cluster
            .node(2)
            .records()
            .subscribe("jobs/1", ignore_record())
            .await;
        settle().await;
        assert_eq!(cluster.node(0).listeners().owned_claims(), ["jobs/1".to_owned()]);

        // A second listener arrives while the name is already claimed; it
        // stays quiet until the owner withdraws.
        cluster
            .node(1)
            .listeners()
            .listen("jobs/*", accept_all())
            .expect("listen");
        settle().await;
        assert_eq!(cluster.node(1).listeners().owned_claims(), Vec::<String>::new());

        // Act: the owner stops listening.
        assert!(cluster.node(0).listeners().unlisten("jobs/*").await);
        settle().await;

        assert_eq!(cluster.node(0).listeners().owned_claims(), Vec::<String>::new());
        assert_eq!(cluster.node(1).listeners().owned_claims(), ["jobs/1".to_owned()]);
        assert_eq!(
            cluster.node(2).listeners().claim_owner("jobs/1"),
            Some(ServerName::from("node-b"))
        );

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_owner_crash_reassigns_the_claim() {
        let cluster = ClusterHarness::start(&["node-a", "node-b", "node-c"]).await;

        let accept_all = || {
            Arc::new(|_name: &str, live: bool, responder: ListenResponder| {
                if live {
                    responder.accept();
                }
            })
        };

        cluster
            .node(0)
            .listeners()
            .listen("jobs/*", accept_all())
            .expect("listen");
        cluster
            .node(2)
            .records()
            .subscribe("jobs/9", ignore_record())
            .await;
        settle().await;
        cluster
            .node(1)
            .listeners()
            .listen("jobs/*", accept_all())
            .expect("listen");
        settle().await;
        assert_eq!(cluster.node(0).listeners().owned_claims(), ["jobs/9".to_owned()]);

        // Act: the owner crashes. Its claims die with it once the liveness
        // window runs out, and the surviving listener steps in.
        cluster.node(0).halt();
        settle_for(LIVENESS + Duration::from_millis(150)).await;
        settle().await;
        assert_eq!(cluster.node(1).listeners().owned_claims(), ["jobs/9".to_owned()]);

        // A node that expired the crashed owner after the hand-over saw the
        // new claim as a losing crossing and dismissed it. Any claim it
        // raises now loses too, and the standing owner's re-broadcast
        // converges it either way.
        cluster
            .node(2)
            .listeners()
            .listen("jobs/*", accept_all())
            .expect("listen");
        settle().await;
        settle().await;

        assert_eq!(cluster.node(1).listeners().owned_claims(), ["jobs/9".to_owned()]);
        assert_eq!(cluster.node(2).listeners().owned_claims(), Vec::<String>::new());
        assert_eq!(
            cluster.node(2).listeners().claim_owner("jobs/9"),
            Some(ServerName::from("node-b"))
        );

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_last_unsubscribe_stops_the_listener() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let log = Arc::clone(&log);
            cluster
                .node(0)
                .listeners()
                .listen(
                    "jobs/*",
                    Arc::new(move |name: &str, live: bool, responder: ListenResponder| {
                        if live {
                            responder.accept();
                        }
                        log.lock().push((name.to_owned(), live));
                    }),
                )
                .expect("listen");
        }

        cluster
            .node(1)
            .records()
            .subscribe("jobs/7", ignore_record())
            .await;
        settle().await;
        assert_eq!(cluster.node(0).listeners().owned_claims(), ["jobs/7".to_owned()]);

        // Act: the only subscriber walks away.
        assert!(cluster.node(1).records().discard("jobs/7").await);
        settle().await;

        // Assert: the owner released its claim and was told to stop.
        assert_eq!(cluster.node(0).listeners().owned_claims(), Vec::<String>::new());
        assert_eq!(
            log.lock().as_slice(),
            [("jobs/7".to_owned(), true), ("jobs/7".to_owned(), false)]
        );
        assert_eq!(cluster.node(1).listeners().claim_owner("jobs/7"), None);

        cluster.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_late_listener_sees_existing_interest() {
        let cluster = ClusterHarness::start(&["node-a", "node-b"]).await;

        cluster
            .node(1)
            .records()
            .subscribe("metrics/cpu", ignore_record())
            .await;
        settle().await;

        // Act: a listener registers after the interest already exists. It
        // is notified immediately, but declines the claim.
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let log = Arc::clone(&log);
            cluster
                .node(0)
                .listeners()
                .listen(
                    "metrics/*",
                    Arc::new(move |name: &str, live: bool, _responder: ListenResponder| {
                        log.lock().push((name.to_owned(), live));
                    }),
                )
                .expect("listen");
        }

        assert_eq!(log.lock().as_slice(), [("metrics/cpu".to_owned(), true)]);
        assert_eq!(cluster.node(0).listeners().claim_owner("metrics/cpu"), None);

        cluster.shutdown().await;
    }
}
