//! Outbound channel handed to the backend on connect

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use inspector_protocol::transform_outbound;
use tracing::debug;

use crate::backend::OutboundSink;

/// The backend's handle for sending messages to attached frontends
///
/// Every message passes through the outbound transform before broadcast.
/// A channel is valid for one connect/disconnect cycle; once the bridge
/// disconnects, sends through it (or any clone of it) are dropped.
#[derive(Clone)]
pub struct FrontendChannel {
    sink: Arc<dyn OutboundSink>,
    open: Arc<AtomicBool>,
}

impl FrontendChannel {
    pub(crate) fn open(sink: Arc<dyn OutboundSink>) -> Self {
        Self {
            sink,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Transform `message` and broadcast it
    ///
    /// Returns `false` if the channel has been disconnected.
    pub fn send_message_to_frontend(&self, message: &str) -> bool {
        if !self.is_open() {
            debug!("Dropping outbound message on disconnected channel");
            return false;
        }

        let payload = transform_outbound(message).into_owned();
        let delivered = self.sink.broadcast(payload);
        debug!("Outbound message delivered to {} frontend(s)", delivered);
        true
    }

    /// Whether the bridge is still connected through this channel
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidate(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for FrontendChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontendChannel")
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_send_applies_transform() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let channel = FrontendChannel::open(Arc::new(tx));

        assert!(channel.send_message_to_frontend(
            r#"{"method":"Debugger.scriptParsed","params":{"url":"/tmp/app.js"}}"#
        ));

        let sent: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(sent["params"]["url"], "file:///tmp/app.js");
        assert_eq!(sent["params"]["executionContextId"], 1);
    }

    #[test]
    fn test_invalidated_channel_drops_sends() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let channel = FrontendChannel::open(Arc::new(tx));
        let clone = channel.clone();

        channel.invalidate();

        assert!(!clone.is_open());
        assert!(!clone.send_message_to_frontend(r#"{"id":1,"result":{}}"#));
        assert!(rx.try_recv().is_err());
    }
}
