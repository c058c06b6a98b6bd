//! Seams to the debugger backend and to the frontend fan-out

use tokio::sync::mpsc;

use crate::channel::FrontendChannel;

/// The in-process debugger controller
///
/// Implementations are driven only from the thread that owns the
/// [`DispatchBridge`](crate::DispatchBridge), so no `Send` bound is required
/// and backend state needs no locking.
pub trait InspectorBackend {
    /// A frontend is now attached; outbound messages go through `channel`
    /// until [`disconnect_frontend`](Self::disconnect_frontend) is called.
    fn connect_frontend(&mut self, channel: FrontendChannel);

    /// The last frontend went away
    fn disconnect_frontend(&mut self);

    /// Handle one command exactly as the frontend sent it
    ///
    /// Replies, including protocol-level errors for unknown methods or bad
    /// params, are the backend's responsibility and go out through the channel.
    fn dispatch(&mut self, message: &str);
}

impl<B: InspectorBackend + ?Sized> InspectorBackend for Box<B> {
    fn connect_frontend(&mut self, channel: FrontendChannel) {
        (**self).connect_frontend(channel)
    }

    fn disconnect_frontend(&mut self) {
        (**self).disconnect_frontend()
    }

    fn dispatch(&mut self, message: &str) {
        (**self).dispatch(message)
    }
}

/// Destination for transformed outbound messages
///
/// Implemented by the session manager's broadcast topic.
pub trait OutboundSink: Send + Sync {
    /// Deliver `payload` to every attached frontend; returns how many accepted it
    fn broadcast(&self, payload: String) -> usize;
}

impl OutboundSink for mpsc::UnboundedSender<String> {
    fn broadcast(&self, payload: String) -> usize {
        match self.send(payload) {
            Ok(()) => 1,
            Err(_) => 0,
        }
    }
}
