//! Request lifecycle tests: success, remote errors, timeouts, cancellation and
//! disconnects, including against a server that stopped reading.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_test::assert_ok;

use super::{connect, connect_stalled, connect_with, wait_for_pending};
use crate::client::TIMEOUT_CANCEL_REASON;
use crate::config::ClientConfig;
use crate::error::{McpError, TracingErrorReporter, TransportError};
use crate::protocol::jsonrpc::{ClientMethod, ErrorCode};
use std::sync::Arc;

#[tokio::test]
async fn test_ping_round_trip() {
    let (client, mut server) = connect();

    let caller = client.clone();
    let call = tokio::spawn(async move { caller.ping().await });

    let request = server.next_frame().await;
    assert_eq!(request, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));

    server.send(json!({"jsonrpc": "2.0", "id": 1, "result": {}})).await;
    assert_ok!(call.await.unwrap());
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_ids_are_sequential() {
    let (client, mut server) = connect();

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(
            client
                .start_request(ClientMethod::ToolsList, &(), None)
                .await
                .unwrap(),
        );
    }

    let ids: Vec<i64> = handles.iter().map(|handle| handle.id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for expected in 1..=3 {
        assert_eq!(server.next_frame().await["id"], expected);
    }
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let (client, mut server) = connect();

    let first = client
        .start_request(ClientMethod::ToolsCall, &json!({"name": "a"}), None)
        .await
        .unwrap();
    let second = client
        .start_request(ClientMethod::ToolsCall, &json!({"name": "b"}), None)
        .await
        .unwrap();
    server.next_frame().await;
    server.next_frame().await;

    // Answer out of order
    server.send(json!({"jsonrpc": "2.0", "id": second.id(), "result": {"for": "b"}})).await;
    server.send(json!({"jsonrpc": "2.0", "id": first.id(), "result": {"for": "a"}})).await;

    assert_eq!(first.response().await.unwrap(), json!({"for": "a"}));
    assert_eq!(second.response().await.unwrap(), json!({"for": "b"}));
}

#[tokio::test]
async fn test_remote_error_reaches_only_its_caller() {
    let (client, mut server) = connect();

    let failing = client
        .start_request(ClientMethod::ToolsCall, &json!({"name": "bad"}), None)
        .await
        .unwrap();
    let healthy = client.start_request(ClientMethod::Ping, &(), None).await.unwrap();
    server.next_frame().await;
    server.next_frame().await;

    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": failing.id(),
            "error": {"code": -32602, "message": "unknown tool", "data": {"tool": "bad"}}
        }))
        .await;
    server.send(json!({"jsonrpc": "2.0", "id": healthy.id(), "result": {}})).await;

    match failing.response().await {
        Err(McpError::Remote(error)) => {
            assert_eq!(error.error_code(), Some(ErrorCode::InvalidParams));
            assert_eq!(error.message, "unknown tool");
            assert_eq!(error.data, Some(json!({"tool": "bad"})));
        }
        other => panic!("Expected remote error, got {:?}", other),
    }
    assert_ok!(healthy.response().await);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_expires_request_and_notifies_server() {
    let (client, mut server) = connect();

    let caller = client.clone();
    let call = tokio::spawn(async move {
        caller
            .send_request(
                ClientMethod::ToolsCall,
                &json!({"name": "slow"}),
                Some(Duration::from_millis(50)),
            )
            .await
    });

    let request = server.next_frame().await;
    assert_eq!(request["id"], 1);

    let cancellation = server.next_frame().await;
    assert_eq!(cancellation["method"], "notifications/cancelled");
    assert!(cancellation.get("id").is_none());
    assert_eq!(cancellation["params"]["requestId"], "1");
    assert_eq!(cancellation["params"]["reason"], TIMEOUT_CANCEL_REASON);

    match call.await.unwrap() {
        Err(McpError::Timeout { id, after_ms }) => {
            assert_eq!(id, 1);
            assert!(after_ms >= 50);
        }
        other => panic!("Expected timeout, got {:?}", other),
    }
    assert_eq!(client.pending_requests(), 0);

    // A late response is dropped and the session keeps working
    server.send(json!({"jsonrpc": "2.0", "id": 1, "result": {}})).await;
    let caller = client.clone();
    let ping = tokio::spawn(async move { caller.ping().await });
    let request = server.next_frame().await;
    assert_eq!(request["id"], 2);
    server.send(json!({"jsonrpc": "2.0", "id": 2, "result": {}})).await;
    assert_ok!(ping.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_server_cancellation() {
    let config = ClientConfig {
        cancel_on_timeout: false,
        default_timeout_ms: 20,
        ..ClientConfig::default()
    };
    let (client, mut server) = connect_with(config, None, Arc::new(TracingErrorReporter));

    let caller = client.clone();
    let call = tokio::spawn(async move { caller.ping().await });
    server.next_frame().await;

    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_timeout());

    // Nothing else was written; the next frame is the following request
    let caller = client.clone();
    let _next = tokio::spawn(async move { caller.ping().await });
    assert_eq!(server.next_frame().await["method"], "ping");
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let (client, mut server) = connect();

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(
            client
                .start_request(ClientMethod::ToolsCall, &json!({"name": "long"}), None)
                .await
                .unwrap(),
        );
    }
    for _ in 0..3 {
        server.next_frame().await;
    }

    let third = handles.pop().unwrap();
    assert_eq!(third.id(), 3);
    assert!(client.cancel(3, Some("user abort")));

    match third.response().await {
        Err(McpError::Cancelled { id, reason }) => {
            assert_eq!(id, 3);
            assert_eq!(reason.as_deref(), Some("user abort"));
        }
        other => panic!("Expected cancellation, got {:?}", other),
    }

    let notification = server.next_frame().await;
    assert_eq!(
        notification,
        json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": "3", "reason": "user abort"}
        })
    );

    // Cancelling again is a no-op and sends nothing
    assert!(!client.cancel(3, None));

    // A late response for the cancelled request is ignored; the others still resolve
    server.send(json!({"jsonrpc": "2.0", "id": 3, "result": {}})).await;
    for handle in &handles {
        server.send(json!({"jsonrpc": "2.0", "id": handle.id(), "result": {"done": true}})).await;
    }
    for handle in handles {
        assert_eq!(handle.response().await.unwrap(), json!({"done": true}));
    }
}

#[tokio::test]
async fn test_cancel_unknown_id_sends_nothing() {
    let (client, mut server) = connect();
    assert!(!client.cancel(42, Some("stale")));

    let caller = client.clone();
    let _ping = tokio::spawn(async move { caller.ping().await });
    assert_eq!(server.next_frame().await["method"], "ping");
}

#[tokio::test]
async fn test_server_eof_fails_all_pending_requests() {
    let (client, mut server) = connect();

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(client.start_request(ClientMethod::Ping, &(), None).await.unwrap());
    }
    for _ in 0..3 {
        server.next_frame().await;
    }
    drop(server);

    for handle in handles {
        let err = handle.response().await.unwrap_err();
        assert!(matches!(err, McpError::Transport(TransportError::Disconnected(_))));
    }
    assert_eq!(client.pending_requests(), 0);
    assert!(!client.is_connected());

    let late = client.send_request(ClientMethod::Ping, &(), None).await;
    assert!(matches!(late, Err(McpError::Transport(_))));
}

#[tokio::test]
async fn test_disconnect_fails_pending_and_closes_transport() {
    let (client, mut server) = connect();

    let handle = client.start_request(ClientMethod::ToolsList, &(), None).await.unwrap();
    server.next_frame().await;

    assert_ok!(client.disconnect().await);
    assert!(handle.response().await.unwrap_err().is_transport());
    assert!(!client.is_connected());

    // The server sees end of input
    assert!(server.try_next_frame().await.is_none());
    assert!(client.send_notification(ClientMethod::NotificationInitialized, &()).await.is_err());
}

#[tokio::test]
async fn test_dropped_handle_leaves_no_entry() {
    let (client, mut server) = connect();

    let handle = client.start_request(ClientMethod::Ping, &(), None).await.unwrap();
    assert_eq!(client.pending_requests(), 1);
    drop(handle);
    assert_eq!(client.pending_requests(), 0);

    // The abandoned request is never written
    let caller = client.clone();
    let ping = tokio::spawn(async move { caller.ping().await });
    let request = server.next_frame().await;
    assert_eq!(request["id"], 2);

    // A stray response for it is harmless
    server.send(json!({"jsonrpc": "2.0", "id": 1, "result": {}})).await;
    server.send(json!({"jsonrpc": "2.0", "id": 2, "result": {}})).await;
    assert_ok!(ping.await.unwrap());
}

#[tokio::test]
async fn test_encoding_error_sends_nothing() {
    let (client, mut server) = connect();

    let result = client
        .send_request(ClientMethod::ToolsCall, &json!(["not", "an", "object"]), None)
        .await;
    assert!(matches!(result, Err(McpError::Encoding(_))));
    assert_eq!(client.pending_requests(), 0);

    let caller = client.clone();
    let _ping = tokio::spawn(async move { caller.ping().await });
    assert_eq!(server.next_frame().await["method"], "ping");
}

#[tokio::test]
async fn test_notifications_are_never_correlated() {
    let (client, mut server) = connect();

    assert_ok!(
        client
            .send_notification(ClientMethod::NotificationInitialized, &())
            .await
    );
    assert_eq!(client.pending_requests(), 0);

    let frame = server.next_frame().await;
    assert_eq!(frame, json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
}

#[tokio::test]
async fn test_initialize_handshake() {
    let (client, mut server) = connect();

    let caller = client.clone();
    let handshake = tokio::spawn(async move { caller.initialize().await });

    let request = server.next_frame().await;
    assert_eq!(request["method"], "initialize");
    assert_eq!(request["params"]["protocolVersion"], "2025-03-26");
    assert_eq!(request["params"]["clientInfo"]["name"], env!("CARGO_PKG_NAME"));

    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "result": {
                "protocolVersion": "2025-03-26",
                "capabilities": {"logging": {}},
                "serverInfo": {"name": "fake", "version": "0.0.1"}
            }
        }))
        .await;

    let initialized = server.next_frame().await;
    assert_eq!(initialized["method"], "notifications/initialized");

    let result = handshake.await.unwrap().unwrap();
    assert_eq!(result.server_info.name, "fake");
    assert_eq!(client.server_info(), Some(result));
}

#[tokio::test]
async fn test_call_tool_and_set_log_level() {
    let (client, mut server) = connect();

    let caller = client.clone();
    let call = tokio::spawn(async move { caller.call_tool("echo", json!({"text": "hi"})).await });
    let request = server.next_frame().await;
    assert_eq!(request["method"], "tools/call");
    assert_eq!(request["params"], json!({"name": "echo", "arguments": {"text": "hi"}}));
    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "result": {"content": [{"type": "text", "text": "hi"}]}
        }))
        .await;
    assert_eq!(call.await.unwrap().unwrap().text(), "hi");

    let caller = client.clone();
    let set_level = tokio::spawn(async move {
        caller
            .set_log_level(crate::protocol::jsonrpc::LogLevel::Warning)
            .await
    });
    let request = server.next_frame().await;
    assert_eq!(request["method"], "logging/setLevel");
    assert_eq!(request["params"], json!({"level": "warning"}));
    server.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {}})).await;
    assert_ok!(set_level.await.unwrap());
}

#[tokio::test]
async fn test_interrupt_cancels_request_and_notifies_server() {
    let (client, mut server) = connect();
    let (interrupt, interrupted) = oneshot::channel::<()>();

    let caller = client.clone();
    let call = tokio::spawn(async move {
        caller
            .send_request_until(
                ClientMethod::ToolsCall,
                &json!({"name": "slow"}),
                None,
                async move {
                    let _ = interrupted.await;
                },
                "Interrupted",
            )
            .await
    });

    let request = server.next_frame().await;
    assert_eq!(request["id"], 1);
    interrupt.send(()).unwrap();

    let notification = server.next_frame().await;
    assert_eq!(
        notification,
        json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": "1", "reason": "Interrupted"}
        })
    );
    match call.await.unwrap() {
        Err(McpError::Cancelled { id: 1, reason }) => {
            assert_eq!(reason.as_deref(), Some("Interrupted"))
        }
        other => panic!("Expected cancellation, got {:?}", other),
    }
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_response_wins_over_idle_interrupt() {
    let (client, mut server) = connect();

    let caller = client.clone();
    let call = tokio::spawn(async move {
        caller
            .send_request_until(
                ClientMethod::ToolsList,
                &(),
                None,
                std::future::pending::<()>(),
                "Interrupted",
            )
            .await
    });

    let request = server.next_frame().await;
    server.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": {"tools": []}})).await;
    assert_eq!(call.await.unwrap().unwrap(), json!({"tools": []}));
}

/// Params large enough to never fit through the stalled pipe.
fn large_params() -> Value {
    json!({"name": "upload", "arguments": {"blob": "x".repeat(4096)}})
}

#[tokio::test]
async fn test_cancel_unblocks_caller_when_server_stops_reading() {
    let (client, _server) = connect_stalled(ClientConfig::default());

    let caller = client.clone();
    let call = tokio::spawn(async move {
        caller
            .send_request(ClientMethod::ToolsCall, &large_params(), None)
            .await
    });
    wait_for_pending(&client, 1).await;

    assert!(client.cancel(1, Some("user abort")));
    let outcome = timeout(Duration::from_secs(2), call)
        .await
        .expect("caller still blocked after cancel")
        .unwrap();
    assert!(matches!(outcome, Err(McpError::Cancelled { id: 1, .. })));

    let disconnected = timeout(Duration::from_secs(2), client.disconnect()).await;
    assert!(disconnected.expect("disconnect blocked").is_ok());
}

#[tokio::test]
async fn test_timeout_fires_when_server_stops_reading() {
    let (client, _server) = connect_stalled(ClientConfig::default());

    let outcome = timeout(
        Duration::from_secs(2),
        client.send_request(
            ClientMethod::ToolsCall,
            &large_params(),
            Some(Duration::from_millis(50)),
        ),
    )
    .await
    .expect("deadline was not enforced");
    assert!(matches!(outcome, Err(ref e) if e.is_timeout()));
    assert_eq!(client.pending_requests(), 0);

    let disconnected = timeout(Duration::from_secs(2), client.disconnect()).await;
    assert!(disconnected.expect("disconnect blocked").is_ok());
}

#[tokio::test]
async fn test_disconnect_while_write_is_blocked() {
    let (client, _server) = connect_stalled(ClientConfig::default());

    let caller = client.clone();
    let call = tokio::spawn(async move {
        caller
            .send_request(ClientMethod::ToolsCall, &large_params(), None)
            .await
    });
    wait_for_pending(&client, 1).await;
    // Let the writer start on the frame and block
    tokio::time::sleep(Duration::from_millis(20)).await;

    let disconnected = timeout(Duration::from_secs(2), client.disconnect()).await;
    assert!(disconnected.expect("disconnect blocked").is_ok());
    assert!(!client.is_connected());

    let outcome = timeout(Duration::from_secs(2), call)
        .await
        .expect("caller still blocked after disconnect")
        .unwrap();
    assert!(matches!(outcome, Err(McpError::Transport(_))));

    // New work fails fast instead of queueing behind the stalled write
    let late = timeout(
        Duration::from_secs(2),
        client.send_request(ClientMethod::Ping, &(), None),
    )
    .await
    .expect("request after disconnect blocked");
    assert!(matches!(late, Err(McpError::Transport(_))));
}
