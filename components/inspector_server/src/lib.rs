//! Inspector listener and session management
//!
//! Serves the DevTools discovery documents and accepts WebSocket frontends on
//! any path. Attached frontends share one [`InspectorSession`]: their commands
//! are routed to the backend through a [`backend_bridge::BridgeHandle`], and
//! the backend's outbound messages fan out to all of them through the
//! session's [`BroadcastTopic`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use backend_bridge::{DispatchBridge, FrontendChannel, InspectorBackend};
//! use inspector_server::{
//!     BroadcastTopic, InspectorServer, InspectorSession, ListenerConfig, ScriptTarget,
//! };
//!
//! struct Silent;
//!
//! impl InspectorBackend for Silent {
//!     fn connect_frontend(&mut self, _channel: FrontendChannel) {}
//!     fn disconnect_frontend(&mut self) {}
//!     fn dispatch(&mut self, _message: &str) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ListenerConfig::default();
//!     let topic = Arc::new(BroadcastTopic::new(&config));
//!     let (mut bridge, handle) = DispatchBridge::new(Silent, topic.clone());
//!
//!     let target = ScriptTarget::new("/tmp/app.js", "Bun", "1.0.0");
//!     let session = InspectorSession::new(&target, handle, topic)?;
//!     let server = InspectorServer::new(config, session).listen().await?;
//!
//!     bridge.run().await;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod server;
pub mod session;
pub mod topic;

pub use config::ListenerConfig;
pub use discovery::{
    DiscoveryService, ScriptTarget, TargetDescriptor, TargetLocator, VersionInfo, TARGET_ID,
    TARGET_TYPE,
};
pub use error::{InspectorServerError, Result};
pub use server::{InspectorServer, ServerHandle};
pub use session::{
    ConnectionId, ConnectionState, EnqueueOutcome, FrontendConnection, InspectorSession,
    ListeningAddress, OutboundQueue,
};
pub use topic::BroadcastTopic;
