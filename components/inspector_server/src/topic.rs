//! Broadcast fan-out to attached frontends

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use backend_bridge::OutboundSink;

use crate::config::ListenerConfig;
use crate::session::{ConnectionId, EnqueueOutcome, FrontendConnection};

/// Named fan-out group every attached connection joins
///
/// Each published payload is offered once to every subscriber, in publish
/// order per subscriber.
pub struct BroadcastTopic {
    subscribers: DashMap<ConnectionId, Arc<FrontendConnection>>,
    max_backpressure: usize,
    close_on_backpressure_limit: bool,
}

impl BroadcastTopic {
    /// Create an empty topic using the listener's backpressure policy
    pub fn new(config: &ListenerConfig) -> Self {
        Self {
            subscribers: DashMap::new(),
            max_backpressure: config.max_backpressure,
            close_on_backpressure_limit: config.close_on_backpressure_limit,
        }
    }

    /// Add a connection to the fan-out
    pub fn subscribe(&self, connection: Arc<FrontendConnection>) {
        self.subscribers.insert(connection.id(), connection);
    }

    /// Remove a connection from the fan-out
    pub fn unsubscribe(&self, id: &ConnectionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// Number of subscribed connections
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Offer `payload` to every subscriber; returns how many queued it
    ///
    /// A subscriber over its backpressure ceiling misses this payload, or is
    /// closed if the listener is configured to do so. Others are unaffected.
    pub fn publish(&self, payload: String) -> usize {
        let payload = Utf8Bytes::from(payload);
        let mut delivered = 0;

        for entry in self.subscribers.iter() {
            let connection = entry.value();
            match connection.enqueue(&payload, self.max_backpressure) {
                EnqueueOutcome::Queued => delivered += 1,
                EnqueueOutcome::OverLimit if self.close_on_backpressure_limit => {
                    warn!(
                        "Connection {} over backpressure limit ({} bytes buffered), closing",
                        connection.id(),
                        connection.buffered_amount()
                    );
                    connection.request_close();
                }
                EnqueueOutcome::OverLimit => {
                    warn!(
                        "Connection {} over backpressure limit ({} bytes buffered), dropping {} byte message",
                        connection.id(),
                        connection.buffered_amount(),
                        payload.as_str().len()
                    );
                }
                EnqueueOutcome::Closed => {
                    debug!("Skipping closed connection {}", connection.id());
                }
            }
        }

        delivered
    }

    /// Ask every subscriber to close
    pub fn close_all(&self) {
        for entry in self.subscribers.iter() {
            entry.value().request_close();
        }
    }
}

impl OutboundSink for BroadcastTopic {
    fn broadcast(&self, payload: String) -> usize {
        self.publish(payload)
    }
}

impl std::fmt::Debug for BroadcastTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastTopic")
            .field("subscribers", &self.subscriber_count())
            .field("max_backpressure", &self.max_backpressure)
            .field("close_on_backpressure_limit", &self.close_on_backpressure_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::text;
    use crate::session::{ConnectionState, OutboundQueue};
    use std::sync::Weak;
    use std::time::Duration;

    fn connection() -> (Arc<FrontendConnection>, OutboundQueue) {
        let connection = FrontendConnection::new(Weak::new());
        connection.0.mark_attached();
        connection
    }

    fn topic(max_backpressure: usize, close: bool) -> BroadcastTopic {
        let config = ListenerConfig::default()
            .with_max_backpressure(max_backpressure)
            .with_close_on_backpressure_limit(close);
        BroadcastTopic::new(&config)
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let topic = topic(1024, false);
        let (conn, _queue) = connection();

        topic.subscribe(conn.clone());
        assert_eq!(topic.subscriber_count(), 1);
        assert!(topic.unsubscribe(&conn.id()));
        assert!(!topic.unsubscribe(&conn.id()));
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_reaches_every_subscriber_in_order() {
        let topic = topic(1024, false);
        let (a, mut qa) = connection();
        let (b, mut qb) = connection();
        topic.subscribe(a);
        topic.subscribe(b);

        assert_eq!(topic.publish("one".to_string()), 2);
        assert_eq!(topic.publish("two".to_string()), 2);

        for queue in [&mut qa, &mut qb] {
            assert_eq!(text(queue.try_recv()).as_deref(), Some("one"));
            assert_eq!(text(queue.try_recv()).as_deref(), Some("two"));
            assert!(queue.try_recv().is_none());
        }
    }

    #[test]
    fn test_publish_shares_one_buffer() {
        let topic = topic(1024, false);
        let (a, mut qa) = connection();
        let (b, mut qb) = connection();
        topic.subscribe(a);
        topic.subscribe(b);

        topic.publish("x".repeat(4096));

        let first = qa.try_recv().unwrap();
        let second = qb.try_recv().unwrap();
        assert_eq!(first.as_str().as_ptr(), second.as_str().as_ptr());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let topic = topic(1024, false);
        assert_eq!(topic.publish("nobody".to_string()), 0);
    }

    #[test]
    fn test_slow_subscriber_drops_others_unaffected() {
        let topic = topic(8, false);
        let (slow, mut slow_queue) = connection();
        let (fast, mut fast_queue) = connection();
        topic.subscribe(slow);
        topic.subscribe(fast);

        assert_eq!(topic.publish("123456".to_string()), 2);
        // Fast reader drains; slow reader still holds 6 bytes
        assert!(fast_queue.try_recv().is_some());
        assert_eq!(topic.publish("abcdef".to_string()), 1);

        assert_eq!(text(fast_queue.try_recv()).as_deref(), Some("abcdef"));
        assert_eq!(text(slow_queue.try_recv()).as_deref(), Some("123456"));
        assert!(slow_queue.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_close_on_backpressure_limit() {
        let topic = topic(8, true);
        let (slow, _queue) = connection();
        topic.subscribe(slow.clone());

        topic.publish("123456".to_string());
        assert_eq!(topic.publish("abcdef".to_string()), 0);

        tokio::time::timeout(Duration::from_secs(1), slow.close_requested())
            .await
            .expect("close should have been requested");
        assert_eq!(slow.state(), ConnectionState::Attached);
    }

    #[test]
    fn test_as_outbound_sink() {
        let topic: Arc<dyn OutboundSink> = Arc::new(topic(1024, false));
        assert_eq!(topic.broadcast("x".to_string()), 0);
    }
}
