//! HTTP + WebSocket listener

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use http::{header, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ListenerConfig;
use crate::discovery::DiscoveryService;
use crate::error::{InspectorServerError, Result};
use crate::session::{FrontendConnection, InspectorSession};

/// How long [`ServerHandle::shutdown`] waits for the listener task
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Listener for one inspector session
pub struct InspectorServer {
    config: Arc<ListenerConfig>,
    session: Arc<InspectorSession>,
}

/// Shared state passed to axum handlers
#[derive(Clone)]
struct ServerState {
    config: Arc<ListenerConfig>,
    session: Arc<InspectorSession>,
    discovery: Arc<DiscoveryService>,
}

impl InspectorServer {
    /// Create a listener for `session`; nothing is bound until [`listen`](Self::listen)
    pub fn new(config: ListenerConfig, session: Arc<InspectorSession>) -> Self {
        Self {
            config: Arc::new(config),
            session,
        }
    }

    /// Get the session served by this listener
    pub fn session(&self) -> &Arc<InspectorSession> {
        &self.session
    }

    /// Get listener configuration
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Bind and start serving discovery and WebSocket traffic
    ///
    /// The listener keeps serving until [`ServerHandle::shutdown`] is called;
    /// dropping the handle detaches it without stopping it.
    pub async fn listen(&self) -> Result<ServerHandle> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| InspectorServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        self.session
            .set_listening_address(&self.config.host, local_addr.port());

        if self.config.compression {
            warn!("Per-message compression requested but not supported, continuing without it");
        }

        let state = ServerState {
            config: Arc::clone(&self.config),
            session: Arc::clone(&self.session),
            discovery: Arc::new(DiscoveryService::new(
                &self.session,
                &self.config,
                local_addr.port(),
            )),
        };
        let router = build_router(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    // A dropped handle leaves the listener running.
                    if shutdown_rx.await.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
                .await
        });

        info!(
            "Inspector listening on {} for {}",
            local_addr,
            self.session.identifier()
        );

        Ok(ServerHandle {
            local_addr,
            session: Arc::clone(&self.session),
            shutdown: shutdown_tx,
            task,
        })
    }

    /// Start listening in the background and report the outcome to `on_complete`
    ///
    /// `on_complete` receives the session and whether the listener bound.
    pub fn start_listening<F>(self, on_complete: F) -> JoinHandle<Result<ServerHandle>>
    where
        F: FnOnce(Arc<InspectorSession>, bool) + Send + 'static,
    {
        tokio::spawn(async move {
            let result = self.listen().await;
            if let Err(e) = &result {
                error!("Inspector failed to listen: {}", e);
            }
            on_complete(Arc::clone(&self.session), result.is_ok());
            result
        })
    }
}

/// Handle to a running listener
#[must_use = "dropping the handle leaves the listener running with no way to shut it down"]
pub struct ServerHandle {
    local_addr: SocketAddr,
    session: Arc<InspectorSession>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Get the served session
    pub fn session(&self) -> &Arc<InspectorSession> {
        &self.session
    }

    /// Stop accepting, close every frontend, and wait for the listener
    pub async fn shutdown(self) -> Result<()> {
        info!("Inspector on {} shutting down", self.local_addr);
        let _ = self.shutdown.send(());
        self.session.close_all();

        match tokio::time::timeout(SHUTDOWN_GRACE, self.task).await {
            Ok(Ok(result)) => result.map_err(InspectorServerError::from),
            Ok(Err(join_error)) => Err(anyhow::anyhow!("listener task failed: {}", join_error).into()),
            Err(_) => {
                warn!("Listener did not stop within {:?}", SHUTDOWN_GRACE);
                Ok(())
            }
        }
    }
}

fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/json", get(list_handler).fallback(fallback_handler))
        .route("/json/list", get(list_handler).fallback(fallback_handler))
        .route("/json/version", get(version_handler).fallback(fallback_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

async fn list_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.discovery.list_targets())
}

async fn version_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.discovery.version_info())
}

/// Every other path: WebSocket upgrade if requested, otherwise 404
async fn fallback_handler(State(state): State<ServerState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let (mut parts, _body) = request.into_parts();

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => {
            debug!("WebSocket upgrade on {}", path);
            let max = state.config.max_payload_length;
            upgrade
                .max_message_size(max)
                .max_frame_size(max)
                .on_upgrade(move |socket| handle_socket(socket, state))
        }
        Err(_) => {
            debug!("No route for {}", path);
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/plain")],
                DiscoveryService::not_found_body(&path),
            )
                .into_response()
        }
    }
}

/// Drive one frontend connection from attach to detach
async fn handle_socket(socket: WebSocket, state: ServerState) {
    let session = state.session;
    let config = state.config;
    let (connection, mut outbound) = FrontendConnection::new(Arc::downgrade(&session));

    if let Err(e) = session.attach(&connection) {
        warn!("Cannot attach frontend {}: {}", connection.id(), e);
        session.detach(&connection);
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    let idle_timeout = config.idle_timeout();
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    let mut ping_interval = tokio::time::interval(config.ping_interval());
    ping_interval.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !session.route_inbound(&connection, text.to_string()) {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("Ignoring {} byte binary frame from {}", data.len(), connection.id());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by axum
                    Some(Err(e)) => {
                        debug!("WebSocket error on {}: {}", connection.id(), e);
                        break;
                    }
                }
            }
            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                if ws_tx.send(Message::Text(payload)).await.is_err() {
                    break;
                }
                if config.reset_idle_timeout_on_send {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                }
            }
            _ = connection.close_requested() => {
                debug!("Closing frontend {} on request", connection.id());
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            _ = &mut idle => {
                info!("Frontend {} idle for {:?}, closing", connection.id(), idle_timeout);
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            _ = ping_interval.tick(), if config.send_pings_automatically => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.detach(&connection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::test_session;

    #[tokio::test]
    async fn test_listen_on_ephemeral_port() {
        let (session, _bridge) = test_session("/tmp/app.js");
        let server = InspectorServer::new(ListenerConfig::new("127.0.0.1", 0), session.clone());

        let handle = server.listen().await.unwrap();
        assert!(handle.port() > 0);

        let address = session.listening_address().unwrap();
        assert_eq!(address.host, "127.0.0.1");
        assert_eq!(address.port, handle.port());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_reported() {
        let (first, _b1) = test_session("/a.js");
        let handle = InspectorServer::new(ListenerConfig::new("127.0.0.1", 0), first)
            .listen()
            .await
            .unwrap();

        let (second, _b2) = test_session("/b.js");
        let server = InspectorServer::new(ListenerConfig::new("127.0.0.1", handle.port()), second);
        let err = server.listen().await.err().unwrap();
        assert!(matches!(err, InspectorServerError::Bind { .. }));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_listening_callback() {
        let (session, _bridge) = test_session("/tmp/app.js");
        let server = InspectorServer::new(ListenerConfig::new("127.0.0.1", 0), session);
        let (tx, rx) = oneshot::channel();

        let join = server.start_listening(move |session, ok| {
            let _ = tx.send((session.identifier().to_string(), ok));
        });

        let (identifier, ok) = rx.await.unwrap();
        assert_eq!(identifier, "/tmp/app.js");
        assert!(ok);
        join.await.unwrap().unwrap().shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_listening_reports_failure() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let (session, _bridge) = test_session("/tmp/app.js");
        let server = InspectorServer::new(ListenerConfig::new("127.0.0.1", port), session);
        let (tx, rx) = oneshot::channel();

        let join = server.start_listening(move |_, ok| {
            let _ = tx.send(ok);
        });

        assert!(!rx.await.unwrap());
        assert!(join.await.unwrap().is_err());
    }
}
