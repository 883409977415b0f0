//! Relay end-to-end tests
//!
//! Each test runs its own server on an ephemeral local port.
//!
//! Run with: cargo test -p integration-tests --test relay_tests

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use integration_tests::{
    assert_json, assert_status, next_event, rejection_status, send_event, send_message, test_config,
    wait_for_close, TestServer, ALLOWED_ORIGIN, RECV_TIMEOUT,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

// ============================================================================
// HTTP
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let server = TestServer::start().await.unwrap();

    for (username, password) in [("test", "wrong"), ("nobody", "123"), ("nobody", "wrong")] {
        let response = server
            .post("/login", &json!({"username": username, "password": password}))
            .await
            .unwrap();
        let body: Value = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
    }

    assert!(server.state.tokens().is_empty());
}

#[tokio::test]
async fn test_login_rejects_malformed_body() {
    let server = TestServer::start().await.unwrap();

    let response = server
        .client
        .post(format!("{}/login", server.base_url()))
        .header("content-type", "application/json")
        .body("{\"username\":")
        .send()
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let response = server.post("/login", &json!({"username": "test"})).await.unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

// ============================================================================
// Upgrade
// ============================================================================

#[tokio::test]
async fn test_token_is_single_use() {
    let server = TestServer::start().await.unwrap();
    let otp = server.login("test", "123").await.unwrap();

    let _ws = server.upgrade(&otp, Some(ALLOWED_ORIGIN)).await.unwrap();
    server.wait_for_connections(1).await.unwrap();

    let err = server.upgrade(&otp, Some(ALLOWED_ORIGIN)).await.unwrap_err();
    assert_eq!(rejection_status(&err), Some(401));
    assert_eq!(server.state.registry().connection_count(), 1);
}

#[tokio::test]
async fn test_upgrade_rejects_unknown_token() {
    let server = TestServer::start().await.unwrap();

    let err = server.upgrade("not-a-token", Some(ALLOWED_ORIGIN)).await.unwrap_err();
    assert_eq!(rejection_status(&err), Some(401));
}

#[tokio::test]
async fn test_upgrade_rejects_expired_token() {
    let mut config = test_config();
    config.tokens.retention_ms = 100;
    let server = TestServer::start_with_config(config).await.unwrap();

    let otp = server.login("test", "123").await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    let err = server.upgrade(&otp, Some(ALLOWED_ORIGIN)).await.unwrap_err();
    assert_eq!(rejection_status(&err), Some(401));
}

#[tokio::test]
async fn test_upgrade_rejects_bad_origin() {
    let server = TestServer::start().await.unwrap();

    let otp = server.login("test", "123").await.unwrap();
    let err = server.upgrade(&otp, Some("http://evil.example")).await.unwrap_err();
    assert_eq!(rejection_status(&err), Some(401));

    let otp = server.login("test", "123").await.unwrap();
    let err = server.upgrade(&otp, None).await.unwrap_err();
    assert_eq!(rejection_status(&err), Some(401));

    // Both tokens were spent by the failed attempts
    assert!(server.state.tokens().is_empty());
    assert_eq!(server.state.registry().connection_count(), 0);
}

// ============================================================================
// Relay
// ============================================================================

#[tokio::test]
async fn test_message_reaches_every_client() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect().await.unwrap();
    let mut b = server.connect().await.unwrap();
    server.wait_for_connections(2).await.unwrap();

    send_message(&mut a, "hi", "A").await.unwrap();

    for ws in [&mut a, &mut b] {
        let event = next_event(ws).await.unwrap();
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["payload"]["message"], "hi");
        assert_eq!(event["payload"]["from"], "A");

        let sent = event["payload"]["sent"].as_str().unwrap();
        assert!(sent.parse::<DateTime<Utc>>().is_ok(), "sent is not RFC 3339: {sent}");
    }
}

#[tokio::test]
async fn test_malformed_frames_do_not_close_connection() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect().await.unwrap();
    let mut b = server.connect().await.unwrap();
    server.wait_for_connections(2).await.unwrap();

    send_event(&mut a, &json!("just a string")).await.unwrap();
    send_event(&mut a, &json!({"type": "send_message", "payload": {"message": 5}}))
        .await
        .unwrap();
    send_event(&mut a, &json!({"type": "typing", "payload": {}})).await.unwrap();
    send_message(&mut a, "still here", "A").await.unwrap();

    // Only the well-formed message is relayed
    for ws in [&mut a, &mut b] {
        let event = next_event(ws).await.unwrap();
        assert_eq!(event["payload"]["message"], "still here");
    }
    assert_eq!(server.state.registry().connection_count(), 2);
}

#[tokio::test]
async fn test_oversized_frame_closes_only_that_connection() {
    let server = TestServer::start().await.unwrap();
    let mut big = server.connect().await.unwrap();
    let mut other = server.connect().await.unwrap();
    server.wait_for_connections(2).await.unwrap();

    send_message(&mut big, &"x".repeat(2048), "A").await.unwrap();
    assert!(wait_for_close(&mut big).await);
    server.wait_for_connections(1).await.unwrap();

    send_message(&mut other, "ok", "B").await.unwrap();
    let event = next_event(&mut other).await.unwrap();
    assert_eq!(event["payload"]["message"], "ok");
}

#[tokio::test]
async fn test_client_disconnect_is_cleaned_up() {
    let server = TestServer::start().await.unwrap();
    let mut a = server.connect().await.unwrap();
    let mut b = server.connect().await.unwrap();
    server.wait_for_connections(2).await.unwrap();

    a.close(None).await.unwrap();
    server.wait_for_connections(1).await.unwrap();

    send_message(&mut b, "alone", "B").await.unwrap();
    let event = next_event(&mut b).await.unwrap();
    assert_eq!(event["payload"]["message"], "alone");
}

// ============================================================================
// Keepalive and shutdown
// ============================================================================

#[tokio::test]
async fn test_silent_client_is_disconnected() {
    let mut config = test_config();
    config.relay.pong_wait_ms = 300;
    let server = TestServer::start_with_config(config).await.unwrap();

    // Never read, so pings go unanswered
    let mut silent = server.connect().await.unwrap();

    // Keeps reading, so the client library answers every ping
    let (mut writer, mut reader) = server.connect().await.unwrap().split();
    let (events_tx, mut events) = tokio::sync::mpsc::unbounded_channel::<Value>();
    let listener = tokio::spawn(async move {
        while let Some(Ok(frame)) = reader.next().await {
            if let Message::Text(text) = frame {
                if let Ok(event) = serde_json::from_str(&text) {
                    let _ = events_tx.send(event);
                }
            }
        }
    });
    server.wait_for_connections(2).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    server.wait_for_connections(1).await.unwrap();
    assert!(wait_for_close(&mut silent).await);

    // The responsive client is untouched and still receives broadcasts
    let frame = json!({"type": "send_message", "payload": {"message": "still alive", "from": "B"}});
    writer.send(Message::Text(frame.to_string())).await.unwrap();

    let event = tokio::time::timeout(RECV_TIMEOUT, events.recv())
        .await
        .expect("no broadcast received")
        .unwrap();
    assert_eq!(event["payload"]["message"], "still alive");
    assert_eq!(server.state.registry().connection_count(), 1);

    listener.abort();
}

#[tokio::test]
async fn test_responsive_client_stays_connected() {
    let mut config = test_config();
    config.relay.pong_wait_ms = 300;
    let server = TestServer::start_with_config(config).await.unwrap();

    let mut ws = server.connect().await.unwrap();
    server.wait_for_connections(1).await.unwrap();

    // Reading lets the client answer pings
    let deadline = tokio::time::Instant::now() + Duration::from_millis(1000);
    while tokio::time::Instant::now() < deadline {
        let _ = tokio::time::timeout_at(deadline, ws.next()).await;
    }

    assert_eq!(server.state.registry().connection_count(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let server = TestServer::start().await.unwrap();
    let mut ws = server.connect().await.unwrap();
    server.wait_for_connections(1).await.unwrap();

    server.shutdown();

    assert!(wait_for_close(&mut ws).await);
    assert_eq!(server.state.registry().connection_count(), 0);
}
