//! # Chain Flows
//!
//! Subscriptions propagate through the transaction pool before they are
//! confirmed; reads poll until the chain catches up.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{request, Harness, WAIT};
    use mc_session::SessionApi;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const PROPAGATION: Duration = Duration::from_millis(200);

    async fn confirmed_subscribers(h: &Harness, id: &str, topic: &str) -> BTreeMap<String, String> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let subscribers = h
                .service
                .get_subscribers(request(json!({
                    "_id": id,
                    "topic": topic,
                    "txPool": false
                })))
                .await
                .unwrap();
            if !subscribers.is_empty() || tokio::time::Instant::now() >= deadline {
                return subscribers;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    #[tokio::test]
    async fn test_subscription_visible_in_pool_then_confirmed() {
        let h = Harness::with_chain_delay(2, PROPAGATION);
        let created = h.create(40).await;

        let tx = h
            .service
            .subscribe(request(json!({
                "_id": created.address,
                "identifier": "feed",
                "topic": "weather",
                "duration": 100,
                "meta": "celsius"
            })))
            .await
            .unwrap();
        assert_eq!(tx.len(), 64);

        let subscriber = format!("feed.{}", created.public_key);
        let pending = h
            .service
            .get_subscribers(request(json!({"_id": created.address, "topic": "weather"})))
            .await
            .unwrap();
        assert_eq!(pending.get(&subscriber).map(String::as_str), Some("celsius"));

        let confirmed = confirmed_subscribers(&h, &created.address, "weather").await;
        assert_eq!(confirmed.len(), 1);
        assert!(confirmed.contains_key(&subscriber));

        let count = h
            .service
            .get_subscribers_count(request(json!({"_id": created.address, "topic": "weather"})))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let info = h
            .service
            .get_subscription(request(json!({
                "_id": created.address,
                "topic": "weather",
                "subscriber": subscriber
            })))
            .await
            .unwrap();
        assert_eq!(info.meta, "celsius");
        assert!(info.expires_at > 100);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_subscriber() {
        let h = Harness::new(2);
        let created = h.create(41).await;
        let args = json!({"_id": created.address, "topic": "sports"});

        h.service
            .subscribe(request(json!({
                "_id": created.address,
                "topic": "sports",
                "duration": 100
            })))
            .await
            .unwrap();
        assert_eq!(
            h.service
                .get_subscribers_count(request(args.clone()))
                .await
                .unwrap(),
            1
        );

        h.service.unsubscribe(request(args.clone())).await.unwrap();
        assert_eq!(
            h.service.get_subscribers_count(request(args)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_subscribe_requires_topic() {
        let h = Harness::new(2);
        let created = h.create(42).await;
        let err = h
            .service
            .subscribe(request(json!({"_id": created.address})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    async fn nonce(h: &Harness, id: &str, tx_pool: bool) -> u64 {
        h.service
            .get_nonce(request(json!({"_id": id, "txPool": tx_pool})))
            .await
            .unwrap()
    }

    // =========================================================================
    // Nonce / Height
    // =========================================================================

    #[tokio::test]
    async fn test_nonce_counts_pool_until_confirmed() {
        let h = Harness::with_chain_delay(2, PROPAGATION);
        let created = h.create(43).await;
        let id = created.address.as_str();
        assert_eq!(nonce(&h, id, true).await, 0);

        h.service
            .subscribe(request(json!({"_id": created.address, "topic": "a"})))
            .await
            .unwrap();
        assert_eq!(nonce(&h, id, true).await, 1);
        assert_eq!(nonce(&h, id, false).await, 0);

        tokio::time::sleep(PROPAGATION * 2).await;
        assert_eq!(nonce(&h, id, false).await, 1);
    }

    #[tokio::test]
    async fn test_height_advances_with_confirmations() {
        let h = Harness::new(2);
        let created = h.create(44).await;

        let before = h.service.get_height(&created.address).await.unwrap();
        h.service
            .subscribe(request(json!({"_id": created.address, "topic": "b"})))
            .await
            .unwrap();
        let after = h.service.get_height(&created.address).await.unwrap();
        assert_eq!(after, before + 1);
    }

    #[tokio::test]
    async fn test_chain_queries_need_live_client() {
        let h = Harness::new(2);
        let err = h.service.get_height("nobody").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
