//! Backend dispatch bridge
//!
//! This crate is the single path into the in-process debugger backend.
//! The backend's state is not safe for concurrent access, so it is owned by
//! a [`DispatchBridge`] that runs on the execution context's own thread.
//! Everything else (WebSocket tasks, the session manager) talks to it through
//! a cloneable [`BridgeHandle`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use backend_bridge::{DispatchBridge, FrontendChannel, InspectorBackend};
//! use tokio::sync::mpsc;
//!
//! struct Echo(Option<FrontendChannel>);
//!
//! impl InspectorBackend for Echo {
//!     fn connect_frontend(&mut self, channel: FrontendChannel) {
//!         self.0 = Some(channel);
//!     }
//!     fn disconnect_frontend(&mut self) {
//!         self.0 = None;
//!     }
//!     fn dispatch(&mut self, message: &str) {
//!         if let Some(channel) = &self.0 {
//!             channel.send_message_to_frontend(message);
//!         }
//!     }
//! }
//!
//! let (tx, mut rx) = mpsc::unbounded_channel::<String>();
//! let (mut bridge, handle) = DispatchBridge::new(Echo(None), Arc::new(tx));
//!
//! handle.connect_frontend().unwrap();
//! handle.dispatch_inbound(r#"{"id":1,"result":{}}"#).unwrap();
//! bridge.pump();
//!
//! assert_eq!(rx.try_recv().unwrap(), r#"{"id":1,"result":{}}"#);
//! ```

pub mod backend;
pub mod bridge;
pub mod channel;
pub mod error;

pub use backend::{InspectorBackend, OutboundSink};
pub use bridge::{BridgeCommand, BridgeHandle, BridgeState, DispatchBridge};
pub use channel::FrontendChannel;
pub use error::{BridgeError, Result};
