//! # Bridge Flows
//!
//! JSON requests through [`Dispatcher`](session_bridge::Dispatcher) and the
//! line transport, against a live service.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{Harness, WAIT};
    use serde_json::{json, Value};
    use session_bridge::{serve, BridgeResponse, Dispatcher};
    use shared_bus::{ClientEvent, EventFilter, EventKind};
    use std::collections::HashMap;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn seed(byte: u8) -> String {
        hex::encode([byte; 32])
    }

    // =========================================================================
    // Dispatcher
    // =========================================================================

    #[tokio::test]
    async fn test_dispatch_send_between_clients() {
        let h = Harness::new(2);
        let dispatcher = Dispatcher::new(h.service.clone());

        let alice = dispatcher
            .dispatch("create", json!({"seed": seed(50), "maxReconnectInterval": 50}))
            .await
            .unwrap();
        let bob = dispatcher
            .dispatch("create", json!({"seed": seed(51), "maxReconnectInterval": 50}))
            .await
            .unwrap();

        let mut events = h
            .service
            .sink()
            .attach(EventFilter::kinds(vec![EventKind::Message]));
        let sent = dispatcher
            .dispatch(
                "sendText",
                json!({"_id": alice["address"], "dests": [bob["address"]], "data": "hey"}),
            )
            .await
            .unwrap();
        assert_eq!(sent["messageId"].as_array().map(Vec::len), Some(8));

        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .unwrap()
            .unwrap();
        let ClientEvent::Message(message) = event else {
            panic!("expected a message event");
        };
        assert_eq!(message.address, bob["address"].as_str().unwrap());
        assert_eq!(message.data.data, "hey");
        assert_eq!(json!(message.data.message_id), sent["messageId"]);
    }

    #[tokio::test]
    async fn test_dispatch_error_codes() {
        let h = Harness::new(2);
        let dispatcher = Dispatcher::new(h.service.clone());

        let cases = [
            (r#"{"id":1,"method":"close","args":{"_id":"ghost"}}"#, "NOT_FOUND"),
            (r#"{"id":2,"method":"create","args":{}}"#, "INVALID_PARAMS"),
            (r#"{"id":3,"method":"create","args":{"seed":"zz"}}"#, "INVALID_PARAMS"),
            (r#"{"id":4,"method":"getSubscribers","args":{"_id":"ghost"}}"#, "INVALID_PARAMS"),
            (r#"{"id":5,"method":"teleport"}"#, "METHOD_NOT_IMPLEMENTED"),
            (r#"{"id":6,"method":"#, "INVALID_REQUEST"),
        ];
        for (line, code) in cases {
            let response: BridgeResponse =
                serde_json::from_str(&dispatcher.handle_line(line).await).unwrap();
            let error = response.error.unwrap_or_else(|| panic!("{line} should fail"));
            assert_eq!(error.code, code, "{line}");
        }
    }

    // =========================================================================
    // Transport
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_requests_correlate_by_id() {
        let h = Harness::new(2);
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = split(server);
        let (client_read, mut client_write) = split(client);
        let served = tokio::spawn(serve(h.service.clone(), server_read, server_write));

        let mut input = String::new();
        for (id, byte) in [("a", 60u8), ("b", 61), ("c", 62)] {
            let request = json!({
                "id": id,
                "method": "create",
                "args": {"seed": seed(byte), "maxReconnectInterval": 50}
            });
            input.push_str(&format!("{request}\n"));
        }
        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();

        served.await.unwrap().unwrap();

        let mut responses = HashMap::new();
        let mut lines = BufReader::new(client_read).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            let value: Value = serde_json::from_str(&line).unwrap();
            if value.get("event").is_some() {
                continue;
            }
            let id = value["id"].as_str().unwrap().to_string();
            responses.insert(id, value["result"]["seed"].clone());
        }

        assert_eq!(responses.len(), 3);
        assert_eq!(responses["a"], json!(seed(60)));
        assert_eq!(responses["b"], json!(seed(61)));
        assert_eq!(responses["c"], json!(seed(62)));
    }
}
