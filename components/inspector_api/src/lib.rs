//! Public API for embedding a debugger inspector
//!
//! This crate wires the lower-level pieces together: a [`BroadcastTopic`]
//! that fans outbound messages out to frontends, a [`DispatchBridge`] that
//! owns the backend, and an [`InspectorSession`] served by an
//! [`InspectorServer`].
//!
//! # Example
//!
//! ```no_run
//! use inspector_api::{FrontendChannel, Inspector, InspectorBackend, ListenerConfig, ScriptTarget};
//!
//! struct Debugger(Option<FrontendChannel>);
//!
//! impl InspectorBackend for Debugger {
//!     fn connect_frontend(&mut self, channel: FrontendChannel) {
//!         self.0 = Some(channel);
//!     }
//!     fn disconnect_frontend(&mut self) {
//!         self.0 = None;
//!     }
//!     fn dispatch(&mut self, _message: &str) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = ScriptTarget::new("/tmp/app.js", "Bun", "1.0.0");
//!     let inspector = Inspector::new(&target, ListenerConfig::default(), Debugger(None))?;
//!
//!     let (server, mut bridge) = inspector.listen().await?;
//!     println!("Listening on {}", server.local_addr());
//!
//!     // ... drive the backend on this thread ...
//!     bridge.pump();
//!
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

pub use backend_bridge::{
    BridgeError, BridgeHandle, BridgeState, DispatchBridge, FrontendChannel, InspectorBackend,
    OutboundSink,
};
pub use inspector_protocol::{transform_outbound, MessageKind, ProtocolMessage};
pub use inspector_server::{
    BroadcastTopic, InspectorServer, InspectorServerError, InspectorSession, ListenerConfig,
    Result, ScriptTarget, ServerHandle, TargetLocator,
};

/// An inspector for one execution context, not yet listening
///
/// Holds the backend's [`DispatchBridge`] until the listener is started; the
/// bridge is then handed back so the caller can drive it on the thread that
/// owns the backend.
pub struct Inspector<B: InspectorBackend> {
    server: InspectorServer,
    bridge: DispatchBridge<B>,
}

impl<B: InspectorBackend> Inspector<B> {
    /// Create an inspector for the target described by `locator`
    ///
    /// # Arguments
    ///
    /// * `locator` - Resolves the target identifier and display title
    /// * `config` - Listener configuration
    /// * `backend` - The in-process debugger backend
    ///
    /// # Returns
    ///
    /// Returns an error if the target identifier cannot be embedded in a URL.
    ///
    /// # Example
    ///
    /// ```
    /// # use inspector_api::{FrontendChannel, Inspector, InspectorBackend, ListenerConfig, ScriptTarget};
    /// # struct Noop;
    /// # impl InspectorBackend for Noop {
    /// #     fn connect_frontend(&mut self, _: FrontendChannel) {}
    /// #     fn disconnect_frontend(&mut self) {}
    /// #     fn dispatch(&mut self, _: &str) {}
    /// # }
    /// let target = ScriptTarget::new("/tmp/app.js", "Bun", "1.0.0");
    /// let inspector = Inspector::new(&target, ListenerConfig::default(), Noop).unwrap();
    /// assert_eq!(inspector.session().identifier(), "/tmp/app.js");
    /// ```
    pub fn new(locator: &dyn TargetLocator, config: ListenerConfig, backend: B) -> Result<Self> {
        let topic = Arc::new(BroadcastTopic::new(&config));
        let (bridge, handle) = DispatchBridge::new(backend, topic.clone());
        let session = InspectorSession::new(locator, handle, topic)?;
        debug!("Inspector created for {}", session.identifier());

        Ok(Self {
            server: InspectorServer::new(config, session),
            bridge,
        })
    }

    /// The session frontends will attach to
    pub fn session(&self) -> &Arc<InspectorSession> {
        self.server.session()
    }

    /// Listener configuration
    pub fn config(&self) -> &ListenerConfig {
        self.server.config()
    }

    /// Mutably borrow the backend before listening
    pub fn backend_mut(&mut self) -> &mut B {
        self.bridge.backend_mut()
    }

    /// Split into the listener and the backend's dispatch bridge
    pub fn into_parts(self) -> (InspectorServer, DispatchBridge<B>) {
        (self.server, self.bridge)
    }

    /// Bind the listener and return it along with the dispatch bridge
    ///
    /// # Returns
    ///
    /// The running listener's handle and the bridge, which must be driven
    /// with [`DispatchBridge::pump`] or [`DispatchBridge::run`] on the
    /// backend's thread for commands to reach the backend.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use inspector_api::{FrontendChannel, Inspector, InspectorBackend, ListenerConfig, ScriptTarget};
    /// # struct Noop;
    /// # impl InspectorBackend for Noop {
    /// #     fn connect_frontend(&mut self, _: FrontendChannel) {}
    /// #     fn disconnect_frontend(&mut self) {}
    /// #     fn dispatch(&mut self, _: &str) {}
    /// # }
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// let target = ScriptTarget::new("/tmp/app.js", "Bun", "1.0.0");
    /// let inspector = Inspector::new(&target, ListenerConfig::new("127.0.0.1", 0), Noop)?;
    /// let (server, _bridge) = inspector.listen().await?;
    /// assert!(server.port() > 0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn listen(self) -> Result<(ServerHandle, DispatchBridge<B>)> {
        let (server, bridge) = self.into_parts();
        let handle = server.listen().await?;
        Ok((handle, bridge))
    }

    /// Start the listener in the background
    ///
    /// `on_complete` is called with the session and whether binding
    /// succeeded. Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// The dispatch bridge, ready to be driven, and the listener task.
    pub fn start_web_socket_server<F>(
        self,
        on_complete: F,
    ) -> (DispatchBridge<B>, JoinHandle<Result<ServerHandle>>)
    where
        F: FnOnce(Arc<InspectorSession>, bool) + Send + 'static,
    {
        let (server, bridge) = self.into_parts();
        (bridge, server.start_listening(on_complete))
    }
}
