//! # Event Flows
//!
//! Connect notifications, sink drop accounting and worker liveness.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{eventually, Harness, WAIT};
    use mc_session::SessionApi;
    use shared_bus::{ClientEvent, EventFilter, EventKind, EventPublisher};
    use std::collections::BTreeSet;
    use std::time::Duration;

    // =========================================================================
    // Connect events
    // =========================================================================

    #[tokio::test]
    async fn test_connect_event_lists_distinct_rpc_servers() {
        let h = Harness::new(2);
        let mut events = h
            .service
            .sink()
            .attach(EventFilter::kinds(vec![EventKind::Connect]));
        let created = h.create(30).await;

        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .unwrap()
            .unwrap();
        let ClientEvent::Connect(connect) = event else {
            panic!("expected a connect event");
        };
        assert_eq!(connect.address, created.address);
        assert_eq!(connect.client.address, created.address);

        // Four subclients over two nodes.
        assert_eq!(connect.rpc_servers.len(), 2);
        let distinct: BTreeSet<_> = connect.rpc_servers.iter().collect();
        assert_eq!(distinct.len(), 2);
        assert!(connect.rpc_servers.iter().all(|s| s.starts_with("http://")));

        let json = ClientEvent::Connect(connect).to_json();
        assert_eq!(json["event"], "onConnect");
        assert_eq!(json["_id"], created.address.as_str());
    }

    #[tokio::test]
    async fn test_events_without_consumer_are_dropped() {
        let h = Harness::new(2);
        assert!(!h.service.sink().has_consumer());
        h.create(31).await;

        let sink = h.service.sink().clone();
        assert!(eventually(WAIT, || sink.events_dropped() >= 1).await);
        assert_eq!(sink.events_published(), sink.events_dropped());

        // Nothing is replayed to a late consumer.
        let mut events = sink.attach(EventFilter::all());
        let late = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(late.is_err());
    }

    // =========================================================================
    // Liveness
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_stays_alive() {
        let h = Harness::new(2);
        let mut events = h.service.sink().attach(EventFilter::kinds(vec![
            EventKind::Message,
            EventKind::Error,
        ]));
        let created = h.create(32).await;
        let generation = h.service.registry().generations(&created.address)[0];

        // Several poll and housekeeping periods without traffic.
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert!(events.try_recv().unwrap().is_none());
        assert!(h.service.pump_alive(&created.address, generation));
        assert!(!h.client(&created.address).is_closed());
    }

    #[tokio::test]
    async fn test_close_stops_worker() {
        let h = Harness::new(2);
        let created = h.create(33).await;
        let generation = h.service.registry().generations(&created.address)[0];
        assert!(h.service.pump_alive(&created.address, generation));

        h.service.close(&created.address).await.unwrap();
        let service = h.service.clone();
        let address = created.address.clone();
        assert!(eventually(WAIT, || !service.pump_alive(&address, generation)).await);
    }

    #[tokio::test]
    async fn test_reconnect_after_dropped_connections() {
        let h = Harness::new(2);
        let created = h.create(34).await;
        let client = h.client(&created.address);

        h.backend.network.set_reachable(false);
        for sub in client.subclients() {
            h.backend.network.drop_connections(sub.address());
        }
        let watched = client.clone();
        assert!(eventually(WAIT, || watched.connected_count() == 0).await);

        let err = h.service.reconnect(&created.address).await.unwrap_err();
        assert_eq!(err.code(), "RECONNECT_FAILED");

        h.backend.network.set_reachable(true);
        h.service.reconnect(&created.address).await.unwrap();
        assert!(eventually(WAIT, || client.connected_count() == 4).await);
    }
}
