//! Inspector session and frontend connection state

use axum::extract::ws::Utf8Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use backend_bridge::BridgeHandle;
use inspector_protocol::ProtocolMessage;

use crate::discovery::TargetLocator;
use crate::error::{InspectorServerError, Result};
use crate::topic::BroadcastTopic;

/// Unique identifier for a frontend connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new unique connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attachment state of a frontend connection
///
/// Moves forward only: `Unattached -> Attached -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open, not yet joined to the session
    Unattached,
    /// Receiving broadcasts and routing commands to the backend
    Attached,
    /// Gone; further operations are no-ops
    Closed,
}

/// Result of queueing one outbound payload on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Payload queued for the writer
    Queued,
    /// Connection is over its backpressure ceiling; payload not queued
    OverLimit,
    /// Connection's writer is gone
    Closed,
}

/// One attached client transport connection
pub struct FrontendConnection {
    id: ConnectionId,
    session: Weak<InspectorSession>,
    state: RwLock<ConnectionState>,
    outbound: mpsc::UnboundedSender<Utf8Bytes>,
    buffered: AtomicUsize,
    close_requested: Notify,
}

/// Receiving side of a connection's outbound queue, owned by its writer
pub struct OutboundQueue {
    connection: Arc<FrontendConnection>,
    rx: mpsc::UnboundedReceiver<Utf8Bytes>,
}

impl OutboundQueue {
    /// Next payload to write; releases its bytes from the backpressure count
    pub async fn recv(&mut self) -> Option<Utf8Bytes> {
        let payload = self.rx.recv().await?;
        self.connection
            .buffered
            .fetch_sub(payload.as_str().len(), Ordering::SeqCst);
        Some(payload)
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<Utf8Bytes> {
        let payload = self.rx.try_recv().ok()?;
        self.connection
            .buffered
            .fetch_sub(payload.as_str().len(), Ordering::SeqCst);
        Some(payload)
    }
}

impl FrontendConnection {
    /// Create an unattached connection that refers back to `session`
    pub fn new(session: Weak<InspectorSession>) -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            session,
            state: RwLock::new(ConnectionState::Unattached),
            outbound: tx,
            buffered: AtomicUsize::new(0),
            close_requested: Notify::new(),
        });
        let queue = OutboundQueue {
            connection: Arc::clone(&connection),
            rx,
        };
        (connection, queue)
    }

    /// Get connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// The session this connection belongs to, if it still exists
    pub fn session(&self) -> Option<Arc<InspectorSession>> {
        self.session.upgrade()
    }

    /// Bytes queued but not yet handed to the writer
    pub fn buffered_amount(&self) -> usize {
        self.buffered.load(Ordering::SeqCst)
    }

    /// Queue `payload` unless that would exceed `max_backpressure`
    ///
    /// The payload is shared with other connections, not copied.
    ///
    /// An empty queue always accepts, so a single message larger than the
    /// ceiling still gets through.
    pub fn enqueue(&self, payload: &Utf8Bytes, max_backpressure: usize) -> EnqueueOutcome {
        if self.state() == ConnectionState::Closed {
            return EnqueueOutcome::Closed;
        }

        let len = payload.as_str().len();
        let buffered = self.buffered.load(Ordering::SeqCst);
        if buffered > 0 && buffered.saturating_add(len) > max_backpressure {
            return EnqueueOutcome::OverLimit;
        }

        self.buffered.fetch_add(len, Ordering::SeqCst);
        match self.outbound.send(payload.clone()) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(_) => {
                self.buffered.fetch_sub(len, Ordering::SeqCst);
                EnqueueOutcome::Closed
            }
        }
    }

    /// Ask the connection's task to close the transport
    pub fn request_close(&self) {
        self.close_requested.notify_one();
    }

    /// Resolves once [`request_close`](Self::request_close) has been called
    pub async fn close_requested(&self) {
        self.close_requested.notified().await
    }

    pub(crate) fn mark_attached(&self) -> bool {
        let mut state = self.state.write();
        if *state == ConnectionState::Unattached {
            *state = ConnectionState::Attached;
            true
        } else {
            false
        }
    }

    /// Move to `Closed`, returning the previous state
    pub(crate) fn mark_closed(&self) -> ConnectionState {
        std::mem::replace(&mut *self.state.write(), ConnectionState::Closed)
    }
}

impl std::fmt::Debug for FrontendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontendConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("buffered", &self.buffered_amount())
            .finish()
    }
}

/// Listening address of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListeningAddress {
    pub host: String,
    pub port: u16,
}

/// One debuggable execution context exposed to frontends
///
/// Owned by the server through an `Arc`; connections hold only a `Weak`.
pub struct InspectorSession {
    identifier: String,
    title: String,
    bridge: BridgeHandle,
    topic: Arc<BroadcastTopic>,
    attached: Mutex<usize>,
    address: RwLock<Option<ListeningAddress>>,
}

impl InspectorSession {
    /// Create a session for the target described by `locator`
    ///
    /// Fails if the identifier is empty, holds control characters, or holds a
    /// `?` or `#` that would cut the WebSocket URL's path short. Spaces and
    /// quotes are fine; discovery JSON escapes them.
    pub fn new(
        locator: &dyn TargetLocator,
        bridge: BridgeHandle,
        topic: Arc<BroadcastTopic>,
    ) -> Result<Arc<Self>> {
        let identifier = locator.resolve_identifier();
        validate_identifier(&identifier)?;

        Ok(Arc::new(Self {
            identifier,
            title: locator.resolve_display_title(),
            bridge,
            topic,
            attached: Mutex::new(0),
            address: RwLock::new(None),
        }))
    }

    /// Stable target identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Display title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Broadcast topic for this session
    pub fn topic(&self) -> &Arc<BroadcastTopic> {
        &self.topic
    }

    /// Number of currently attached frontends
    pub fn attached_count(&self) -> usize {
        *self.attached.lock()
    }

    /// Where the session is listening, once bound
    pub fn listening_address(&self) -> Option<ListeningAddress> {
        self.address.read().clone()
    }

    pub(crate) fn set_listening_address(&self, host: &str, port: u16) {
        *self.address.write() = Some(ListeningAddress {
            host: host.to_string(),
            port,
        });
    }

    /// A frontend connection opened
    ///
    /// Subscribes it to broadcasts; the first attached frontend connects the
    /// backend. Returns `false` if the connection was not `Unattached`.
    pub fn attach(&self, connection: &Arc<FrontendConnection>) -> Result<bool> {
        let mut attached = self.attached.lock();
        if !connection.mark_attached() {
            return Ok(false);
        }

        self.topic.subscribe(Arc::clone(connection));
        *attached += 1;
        info!(
            "Frontend {} attached to {} ({} attached)",
            connection.id(),
            self.identifier,
            *attached
        );

        if *attached == 1 {
            self.bridge.connect_frontend()?;
        }
        Ok(true)
    }

    /// Route an inbound text frame to the backend
    ///
    /// Returns `false` if the connection is not attached (the caller should
    /// close it) or the backend is gone.
    pub fn route_inbound(&self, connection: &FrontendConnection, message: String) -> bool {
        // Held across the dispatch so a concurrent close cannot slip in between.
        let state = connection.state.read();
        if *state != ConnectionState::Attached {
            debug!(
                "Dropping message on {:?} connection {}",
                *state,
                connection.id()
            );
            return false;
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            match ProtocolMessage::parse(&message) {
                Ok(parsed) => debug!(
                    "Frontend {} -> backend: {:?} {}",
                    connection.id(),
                    parsed.kind(),
                    parsed.method().unwrap_or("<no method>")
                ),
                Err(_) => debug!(
                    "Frontend {} -> backend: {} unstructured bytes",
                    connection.id(),
                    message.len()
                ),
            }
        }

        match self.bridge.dispatch_inbound(message) {
            Ok(()) => true,
            Err(e) => {
                warn!("Cannot dispatch message from {}: {}", connection.id(), e);
                false
            }
        }
    }

    /// A frontend connection closed
    ///
    /// Idempotent. The last attached frontend disconnects the backend.
    /// Returns whether this call detached an attached connection.
    pub fn detach(&self, connection: &FrontendConnection) -> bool {
        let mut attached = self.attached.lock();
        if connection.mark_closed() != ConnectionState::Attached {
            return false;
        }

        self.topic.unsubscribe(&connection.id());
        *attached = attached.saturating_sub(1);
        info!(
            "Frontend {} detached from {} ({} attached)",
            connection.id(),
            self.identifier,
            *attached
        );

        if *attached == 0 {
            if let Err(e) = self.bridge.disconnect_frontend() {
                debug!("Backend already gone on last detach: {}", e);
            }
        }
        true
    }

    /// Ask every attached connection to close
    pub fn close_all(&self) {
        self.topic.close_all();
    }
}

fn validate_identifier(identifier: &str) -> Result<()> {
    let unusable = |c: char| c.is_control() || matches!(c, '?' | '#');

    if identifier.is_empty() || identifier.chars().any(unusable) {
        return Err(InspectorServerError::InvalidIdentifier(
            identifier.to_string(),
        ));
    }
    Ok(())
}
