//! # Messaging Flows
//!
//! Fan-out over subclients, receive-side dedup, reply routing and topic
//! publishing, observed through the event sink.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{request, Harness, WAIT};
    use mc_session::ports::SendTextResult;
    use mc_session::{SessionApi, SessionError};
    use serde_json::json;
    use shared_bus::{ClientEvent, EventFilter, EventKind, MessageEvent, Subscription};
    use std::sync::Arc;
    use std::time::Duration;

    async fn next_message(events: &mut Subscription) -> MessageEvent {
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("message event in time")
            .expect("sink open");
        match event {
            ClientEvent::Message(message) => message,
            other => panic!("expected a message event, got {other:?}"),
        }
    }

    // =========================================================================
    // Fan-out and dedup
    // =========================================================================

    #[tokio::test]
    async fn test_multi_path_copies_delivered_once() {
        let h = Harness::new(3);
        let sender = h.create(10).await;
        let receiver = h.create(11).await;
        let mut events = h
            .service
            .sink()
            .attach(EventFilter::kinds(vec![EventKind::Message]));

        let sent = h
            .service
            .send_text(request(json!({
                "_id": sender.address,
                "dests": [receiver.address, receiver.address],
                "data": "hello"
            })))
            .await
            .unwrap();
        assert!(matches!(sent, SendTextResult::Sent(ref r) if r.message_id.len() == 8));

        let message = next_message(&mut events).await;
        assert_eq!(message.address, receiver.address);
        assert_eq!(message.data.src, sender.address);
        assert_eq!(message.data.data, "hello");

        // Every subclient path carried a copy; only one surfaces.
        let extra = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
        assert!(extra.is_err(), "duplicate copy surfaced: {extra:?}");
    }

    #[tokio::test]
    async fn test_empty_destinations_rejected() {
        let h = Harness::new(2);
        let sender = h.create(12).await;
        let before = h.backend.network.delivered_count();

        let err = h
            .service
            .send_text(request(json!({
                "_id": sender.address,
                "dests": [],
                "data": "hello"
            })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
        assert_eq!(h.backend.network.delivered_count(), before);
    }

    // =========================================================================
    // Replies
    // =========================================================================

    #[tokio::test]
    async fn test_reply_routed_to_waiting_sender() {
        let h = Harness::new(3);
        let alice = h.create(13).await;
        let bob = h.create(14).await;
        let mut events = h
            .service
            .sink()
            .attach(EventFilter::kinds(vec![EventKind::Message]));

        let service = Arc::clone(&h.service);
        let (from, to) = (alice.address.clone(), bob.address.clone());
        let pending = tokio::spawn(async move {
            service
                .send_text(request(json!({
                    "_id": from,
                    "dests": [to],
                    "data": "ping",
                    "noReply": false,
                    "timeout": 5_000
                })))
                .await
        });

        let question = next_message(&mut events).await;
        assert_eq!(question.address, bob.address);
        assert!(!question.data.no_reply);
        let message_id = question.data.message_id.clone().expect("message id");

        h.service
            .reply_text(request(json!({
                "_id": bob.address,
                "messageId": message_id,
                "dest": question.data.src,
                "data": "pong"
            })))
            .await
            .unwrap();

        let answer = pending.await.unwrap().unwrap();
        let SendTextResult::Reply(reply) = answer else {
            panic!("expected a reply");
        };
        assert_eq!(reply.src, bob.address);
        assert_eq!(reply.data, "pong");
    }

    #[tokio::test]
    async fn test_unanswered_send_times_out() {
        let h = Harness::new(2);
        let alice = h.create(15).await;
        let bob = h.create(16).await;

        let err = h
            .service
            .send_text(request(json!({
                "_id": alice.address,
                "dests": [bob.address],
                "data": "anyone?",
                "noReply": false,
                "timeout": 100
            })))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Timeout("wait reply timeout".to_string()));
        assert_eq!(h.client(&alice.address).pending_replies().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reply_requires_message_id() {
        let h = Harness::new(2);
        let bob = h.create(17).await;
        let err = h
            .service
            .reply_text(request(json!({
                "_id": bob.address,
                "messageId": [1, 2, 3],
                "dest": "someone",
                "data": "late"
            })))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::InvalidParams("invalid messageId".to_string()));
    }

    // =========================================================================
    // Publish
    // =========================================================================

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let h = Harness::new(2);
        let publisher = h.create(18).await;
        let reader = h.create(19).await;

        h.service
            .subscribe(request(json!({
                "_id": reader.address,
                "topic": "news",
                "duration": 100
            })))
            .await
            .unwrap();

        let mut events = h
            .service
            .sink()
            .attach(EventFilter::kinds(vec![EventKind::Message]));
        let published = h
            .service
            .publish_text(request(json!({
                "_id": publisher.address,
                "topic": "news",
                "data": "extra",
                "txPool": true
            })))
            .await
            .unwrap();
        assert_eq!(published.message_id.len(), 8);

        let message = next_message(&mut events).await;
        assert_eq!(message.address, reader.address);
        assert_eq!(message.data.data, "extra");
        assert!(message.data.no_reply);
    }

    #[tokio::test]
    async fn test_publish_requires_topic() {
        let h = Harness::new(2);
        let publisher = h.create(20).await;
        let err = h
            .service
            .publish_text(request(json!({"_id": publisher.address, "data": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }
}
