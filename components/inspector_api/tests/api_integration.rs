//! Integration tests for the inspector public API
//!
//! These tests exercise the listener lifecycle through the facade.

use std::sync::{Arc, Mutex};

use inspector_api::*;

#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<&'static str>>>);

struct LoggingBackend(SharedLog);

impl InspectorBackend for LoggingBackend {
    fn connect_frontend(&mut self, _channel: FrontendChannel) {
        self.0 .0.lock().unwrap().push("connect");
    }

    fn disconnect_frontend(&mut self) {
        self.0 .0.lock().unwrap().push("disconnect");
    }

    fn dispatch(&mut self, _message: &str) {
        self.0 .0.lock().unwrap().push("dispatch");
    }
}

fn inspector(port: u16, log: &SharedLog) -> Inspector<LoggingBackend> {
    let target = ScriptTarget::new("/srv/app.js", "Bun", "1.1.0");
    Inspector::new(
        &target,
        ListenerConfig::new("127.0.0.1", port),
        LoggingBackend(log.clone()),
    )
    .expect("Failed to create inspector")
}

#[tokio::test]
async fn test_full_inspector_lifecycle() {
    let log = SharedLog::default();
    let (server, bridge) = inspector(0, &log)
        .listen()
        .await
        .expect("Failed to start inspector");

    let address = server.session().listening_address().unwrap();
    assert_eq!(address.port, server.port());
    assert_eq!(bridge.state(), BridgeState::Idle);

    server.shutdown().await.expect("Failed to stop inspector");
    drop(bridge);

    // Never attached, so the backend was never touched
    assert!(log.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_multiple_cycles() {
    let log = SharedLog::default();

    for cycle in 0..3 {
        let (server, _bridge) = inspector(0, &log)
            .listen()
            .await
            .unwrap_or_else(|e| panic!("Cycle {}: start failed: {}", cycle, e));
        server
            .shutdown()
            .await
            .unwrap_or_else(|e| panic!("Cycle {}: stop failed: {}", cycle, e));
    }
}

#[tokio::test]
async fn test_port_conflict_is_reported() {
    let log = SharedLog::default();
    let (first, _bridge) = inspector(0, &log).listen().await.unwrap();

    let result = inspector(first.port(), &log).listen().await;
    match result {
        Err(InspectorServerError::Bind { address, .. }) => {
            assert_eq!(address, format!("127.0.0.1:{}", first.port()));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("second listener should not bind"),
    }

    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_web_socket_server_failure_callback() {
    let log = SharedLog::default();
    let (first, _bridge) = inspector(0, &log).listen().await.unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    let (_second_bridge, task) = inspector(first.port(), &log)
        .start_web_socket_server(move |_session, ok| {
            let _ = tx.send(ok);
        });

    assert!(!rx.await.unwrap());
    assert!(task.await.unwrap().is_err());
    first.shutdown().await.unwrap();
}
