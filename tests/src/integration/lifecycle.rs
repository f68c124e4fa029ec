//! # Client Lifecycle Flows
//!
//! create → recreate → reconnect → close, and stale generation eviction.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{create_request, eventually, request, Harness, WAIT};
    use mc_session::ports::CreateRequest;
    use mc_session::{
        unix_now, ClientConfig, Ed25519Account, Generation, MultiClient, SessionApi, SessionError,
    };
    use serde_json::json;
    use std::sync::Arc;

    // =========================================================================
    // Create / Close
    // =========================================================================

    #[tokio::test]
    async fn test_create_registers_latest_usable() {
        let h = Harness::new(3);
        let created = h.create(1).await;

        let client = h.client(&created.address);
        assert_eq!(client.address(), created.address);
        assert_eq!(created.public_key, created.address);
        assert_eq!(created.seed, hex::encode([1u8; 32]));
        assert_eq!(client.connected_count(), 4);
    }

    #[tokio::test]
    async fn test_identifier_prefixes_address() {
        let h = Harness::new(2);
        let created = h
            .service
            .create(CreateRequest {
                identifier: "alice".to_string(),
                ..create_request(2)
            })
            .await
            .unwrap();
        assert_eq!(created.address, format!("alice.{}", created.public_key));
    }

    #[tokio::test]
    async fn test_close_twice_reports_not_found() {
        let h = Harness::new(2);
        let created = h.create(3).await;
        let client = h.client(&created.address);

        h.service.close(&created.address).await.unwrap();
        assert!(client.is_closed());

        let err = h.service.close(&created.address).await.unwrap_err();
        assert_eq!(err, SessionError::NotFound("client is closed".to_string()));
        assert!(h.service.registry().get_latest_usable(&created.address).is_none());
    }

    #[tokio::test]
    async fn test_reconnect_then_close() {
        let h = Harness::new(3);
        let created = h
            .service
            .create(request(json!({
                "seed": "04".repeat(32),
                "numSubClients": 3,
                "maxReconnectInterval": 50
            })))
            .await
            .unwrap();
        assert_eq!(created.address, created.public_key);

        h.service.reconnect(&created.address).await.unwrap();

        h.service.close(&created.address).await.unwrap();
        let err = h.service.reconnect(&created.address).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    // =========================================================================
    // Generations
    // =========================================================================

    #[tokio::test]
    async fn test_create_closes_previous_generation() {
        let h = Harness::new(2);
        let first = h.create(5).await;
        let old = h.client(&first.address);

        let second = h.create(5).await;
        assert_eq!(first.address, second.address);
        assert!(old.is_closed());
        assert_eq!(h.service.registry().generation_count(&second.address), 1);
        assert!(!Arc::ptr_eq(&old, &h.client(&second.address)));
    }

    #[tokio::test]
    async fn test_recreate_keeps_previous_generation() {
        let h = Harness::new(2);
        let created = h.create(6).await;
        let old = h.client(&created.address);

        h.service
            .recreate(CreateRequest {
                id: created.address.clone(),
                ..create_request(6)
            })
            .await
            .unwrap();

        assert!(!old.is_closed());
        assert_eq!(h.service.registry().generation_count(&created.address), 2);
        assert!(!Arc::ptr_eq(&old, &h.client(&created.address)));
    }

    #[tokio::test]
    async fn test_pump_evicts_stale_generation() {
        let h = Harness::new(2);
        let address = "session-7";
        let ports = h.backend.ports();

        let mut clients = Vec::new();
        for seed in 70..73u8 {
            let account = Arc::new(Ed25519Account::from_seed_bytes([seed; 32]));
            let client =
                MultiClient::create(account, "", 1, ClientConfig::for_testing(), ports.clone())
                    .await
                    .unwrap();
            clients.push(client);
        }
        let stale = Generation::from_parts(unix_now() - 3_601, 0);
        h.service
            .registry()
            .put(address, stale, Arc::clone(&clients[0]));
        for client in &clients[1..] {
            h.service
                .registry()
                .put(address, Generation::now(), Arc::clone(client));
        }

        // The fourth generation's pump runs housekeeping on start.
        h.service
            .recreate(CreateRequest {
                id: address.to_string(),
                ..create_request(73)
            })
            .await
            .unwrap();

        let stale_client = Arc::clone(&clients[0]);
        assert!(eventually(WAIT, || stale_client.is_closed()).await);
        assert_eq!(h.service.registry().generation_count(address), 3);
        assert!(clients[1..].iter().all(|c| !c.is_closed()));
        assert!(!h.service.registry().generations(address).contains(&stale));
    }
}
