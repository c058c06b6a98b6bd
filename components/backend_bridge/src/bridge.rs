//! Backend dispatch bridge
//!
//! The only code that calls into the debugger backend. Network tasks enqueue
//! [`BridgeCommand`]s through a [`BridgeHandle`]; the [`DispatchBridge`],
//! driven on the backend's own thread, executes them in order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::{InspectorBackend, OutboundSink};
use crate::channel::FrontendChannel;
use crate::error::{BridgeError, Result};

/// Work queued for the backend thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// First frontend attached
    Connect,
    /// Last frontend detached
    Disconnect,
    /// Inbound frontend command, verbatim
    Dispatch(String),
}

/// Connection state of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No frontend channel registered with the backend
    Idle,
    /// Backend holds an open frontend channel
    Connected,
}

/// Thread-safe handle for queueing backend work
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    commands: mpsc::UnboundedSender<BridgeCommand>,
}

impl BridgeHandle {
    /// Ask the backend to register its frontend channel
    pub fn connect_frontend(&self) -> Result<()> {
        self.send(BridgeCommand::Connect)
    }

    /// Ask the backend to drop its frontend channel
    pub fn disconnect_frontend(&self) -> Result<()> {
        self.send(BridgeCommand::Disconnect)
    }

    /// Queue an inbound frontend message for the backend's dispatcher
    pub fn dispatch_inbound(&self, message: impl Into<String>) -> Result<()> {
        self.send(BridgeCommand::Dispatch(message.into()))
    }

    /// Whether the bridge on the other end has been dropped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: BridgeCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| BridgeError::BackendGone)
    }
}

/// Owner of the debugger backend
///
/// Lives on the execution context's thread. Drive it from that thread's
/// event loop with [`pump`](Self::pump), or hand the loop to
/// [`run`](Self::run).
pub struct DispatchBridge<B: InspectorBackend> {
    backend: B,
    commands: mpsc::UnboundedReceiver<BridgeCommand>,
    sink: Arc<dyn OutboundSink>,
    channel: Option<FrontendChannel>,
}

impl<B: InspectorBackend> DispatchBridge<B> {
    /// Wrap `backend`, sending its outbound messages to `sink`
    pub fn new(backend: B, sink: Arc<dyn OutboundSink>) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let bridge = Self {
            backend,
            commands: rx,
            sink,
            channel: None,
        };

        (bridge, BridgeHandle { commands: tx })
    }

    /// Current connection state
    pub fn state(&self) -> BridgeState {
        if self.channel.is_some() {
            BridgeState::Connected
        } else {
            BridgeState::Idle
        }
    }

    /// Borrow the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutably borrow the backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Run every command queued so far without waiting for more
    ///
    /// Returns the number of commands executed.
    pub fn pump(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.execute(command);
            executed += 1;
        }
        executed
    }

    /// Execute commands as they arrive until every handle is dropped
    pub async fn run(&mut self) {
        while let Some(command) = self.commands.recv().await {
            self.execute(command);
        }
        debug!("All bridge handles dropped, dispatch loop exiting");
        self.disconnect();
    }

    /// Execute one command against the backend
    pub fn execute(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::Connect => self.connect(),
            BridgeCommand::Disconnect => self.disconnect(),
            BridgeCommand::Dispatch(message) => self.dispatch(&message),
        }
    }

    fn connect(&mut self) {
        if self.channel.is_some() {
            debug!("Frontend channel already connected");
            return;
        }

        let channel = FrontendChannel::open(Arc::clone(&self.sink));
        self.channel = Some(channel.clone());
        self.backend.connect_frontend(channel);
        info!("Backend connected to frontend channel");
    }

    fn disconnect(&mut self) {
        let Some(channel) = self.channel.take() else {
            debug!("Frontend channel already disconnected");
            return;
        };

        channel.invalidate();
        self.backend.disconnect_frontend();
        info!("Backend disconnected from frontend channel");
    }

    fn dispatch(&mut self, message: &str) {
        if self.channel.is_none() {
            debug!("Dropping inbound message while no frontend is connected");
            return;
        }

        debug!("Dispatching {} byte message to backend", message.len());
        self.backend.dispatch(message);
    }
}

impl<B: InspectorBackend> Drop for DispatchBridge<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingBackend {
        connects: usize,
        disconnects: usize,
        dispatched: Vec<String>,
        channel: Option<FrontendChannel>,
    }

    impl InspectorBackend for CountingBackend {
        fn connect_frontend(&mut self, channel: FrontendChannel) {
            self.connects += 1;
            self.channel = Some(channel);
        }

        fn disconnect_frontend(&mut self) {
            self.disconnects += 1;
        }

        fn dispatch(&mut self, message: &str) {
            self.dispatched.push(message.to_string());
        }
    }

    fn bridge() -> (
        DispatchBridge<CountingBackend>,
        BridgeHandle,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let (bridge, handle) = DispatchBridge::new(CountingBackend::default(), Arc::new(tx));
        (bridge, handle, rx)
    }

    #[test]
    fn test_initially_idle() {
        let (bridge, _handle, _rx) = bridge();
        assert_eq!(bridge.state(), BridgeState::Idle);
    }

    #[test]
    fn test_pump_executes_in_order() {
        let (mut bridge, handle, _rx) = bridge();

        handle.connect_frontend().unwrap();
        handle.dispatch_inbound("first").unwrap();
        handle.dispatch_inbound("second").unwrap();

        assert_eq!(bridge.pump(), 3);
        assert_eq!(bridge.state(), BridgeState::Connected);
        assert_eq!(bridge.backend().dispatched, vec!["first", "second"]);
        assert_eq!(bridge.pump(), 0);
    }

    #[test]
    fn test_repeated_connect_is_ignored() {
        let (mut bridge, handle, _rx) = bridge();

        handle.connect_frontend().unwrap();
        handle.connect_frontend().unwrap();
        bridge.pump();

        assert_eq!(bridge.backend().connects, 1);
    }

    #[test]
    fn test_disconnect_while_idle_is_ignored() {
        let (mut bridge, handle, _rx) = bridge();

        handle.disconnect_frontend().unwrap();
        bridge.pump();

        assert_eq!(bridge.backend().disconnects, 0);
    }

    #[test]
    fn test_dispatch_while_idle_dropped() {
        let (mut bridge, handle, _rx) = bridge();

        handle.dispatch_inbound("orphan").unwrap();
        bridge.pump();

        assert!(bridge.backend().dispatched.is_empty());
    }

    #[test]
    fn test_disconnect_invalidates_backend_channel() {
        let (mut bridge, handle, mut rx) = bridge();

        handle.connect_frontend().unwrap();
        bridge.pump();
        let channel = bridge.backend().channel.clone().unwrap();
        assert!(channel.send_message_to_frontend(r#"{"id":1,"result":{}}"#));
        assert_eq!(rx.try_recv().unwrap(), r#"{"id":1,"result":{}}"#);

        handle.disconnect_frontend().unwrap();
        bridge.pump();

        assert_eq!(bridge.state(), BridgeState::Idle);
        assert!(!channel.send_message_to_frontend(r#"{"id":2,"result":{}}"#));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handle_reports_dropped_bridge() {
        let (bridge, handle, _rx) = bridge();
        drop(bridge);

        assert!(handle.is_closed());
        assert_eq!(handle.dispatch_inbound("late"), Err(BridgeError::BackendGone));
    }

    #[tokio::test]
    async fn test_run_exits_when_handles_dropped() {
        let (mut bridge, handle, _rx) = bridge();

        handle.connect_frontend().unwrap();
        handle.dispatch_inbound("only").unwrap();
        drop(handle);

        bridge.run().await;

        assert_eq!(bridge.backend().dispatched, vec!["only"]);
        assert_eq!(bridge.backend().disconnects, 1);
        assert_eq!(bridge.state(), BridgeState::Idle);
    }
}
