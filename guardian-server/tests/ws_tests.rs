use futures::{SinkExt, StreamExt};
use guardian_ingest::MemoryStore;
use guardian_server::{build_router, AppState};
use guardian_types::DeviceIdentity;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_test_server(auth_timeout: Duration) -> (SocketAddr, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.register_device(DeviceIdentity::new("abc123"));

    let state = AppState::new(store.clone(), store.clone()).with_auth_timeout(auth_timeout);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("test server");
    });
    (addr, store)
}

async fn connect(addr: SocketAddr, path: &str) -> WsClient {
    let (client, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("websocket connect");
    client
}

async fn next_json(client: &mut WsClient) -> Value {
    loop {
        let message = client
            .next()
            .await
            .expect("connection open")
            .expect("frame");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("server frame is JSON");
        }
    }
}

async fn send_json(client: &mut WsClient, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Reads until the server closes and returns the close code.
async fn expect_close(client: &mut WsClient) -> u16 {
    loop {
        match client.next().await {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}

fn location_frame() -> Value {
    json!({
        "type": "location",
        "data": {"timestamp": "2025-12-10T10:30:00Z", "latitude": 40.7128, "longitude": -74.006}
    })
}

// ── Direct path ──────────────────────────────────────────────────

#[tokio::test]
async fn known_credential_streams_and_acks_in_order() {
    let (addr, store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest/abc123").await;

    let established = next_json(&mut client).await;
    assert_eq!(established["type"], "connection_established");
    assert_eq!(established["child_hash"], "abc123");

    send_json(&mut client, location_frame()).await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["message_type"], "location");
    assert_eq!(ack["status"], "success");
    assert_eq!(ack["result"]["stored"], true);

    send_json(
        &mut client,
        json!({
            "type": "screen_time",
            "data": {"date": "2025-12-10", "total_screen_time": 3600}
        }),
    )
    .await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["message_type"], "screen_time");
    assert_eq!(ack["result"]["created"], true);

    assert_eq!(store.location_count(&DeviceIdentity::new("abc123")), 1);
}

#[tokio::test]
async fn unknown_credential_closes_4004_without_greeting() {
    let (addr, _store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest/stranger").await;

    // First and only frame from the server is the close.
    assert_eq!(expect_close(&mut client).await, 4004);
}

#[tokio::test]
async fn bad_frame_gets_error_reply_but_session_survives() {
    let (addr, store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest/abc123").await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "location", "data": {"latitude": 1.0}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "error");

    send_json(&mut client, location_frame()).await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(store.location_count(&DeviceIdentity::new("abc123")), 1);
}

#[tokio::test]
async fn unknown_message_type_is_soft_error() {
    let (addr, _store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest/abc123").await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "heartbeat", "data": {}})).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "error");
}

#[tokio::test]
async fn device_deleted_mid_session_closes_4004() {
    let (addr, store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest/abc123").await;
    next_json(&mut client).await;

    store.remove_device(&DeviceIdentity::new("abc123"));
    send_json(&mut client, location_frame()).await;
    assert_eq!(expect_close(&mut client).await, 4004);
}

// ── Handshake path ───────────────────────────────────────────────

#[tokio::test]
async fn handshake_prompts_then_establishes() {
    let (addr, _store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest-auth").await;

    let prompt = next_json(&mut client).await;
    assert_eq!(prompt["type"], "auth_required");

    send_json(&mut client, json!({"type": "auth", "child_hash": "abc123"})).await;
    let established = next_json(&mut client).await;
    assert_eq!(established["type"], "connection_established");
    assert_eq!(established["child_hash"], "abc123");

    send_json(&mut client, location_frame()).await;
    let ack = next_json(&mut client).await;
    assert_eq!(ack["type"], "ack");
}

#[tokio::test]
async fn handshake_rejects_unknown_credential_with_4004() {
    let (addr, _store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest-auth").await;
    next_json(&mut client).await;

    send_json(&mut client, json!({"type": "auth", "child_hash": "stranger"})).await;
    assert_eq!(expect_close(&mut client).await, 4004);
}

#[tokio::test]
async fn non_auth_first_frame_closes_4001() {
    let (addr, store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest-auth").await;
    next_json(&mut client).await;

    send_json(&mut client, location_frame()).await;
    assert_eq!(expect_close(&mut client).await, 4001);
    assert_eq!(store.location_count(&DeviceIdentity::new("abc123")), 0);
}

#[tokio::test]
async fn garbage_during_handshake_closes_4001() {
    let (addr, _store) = spawn_test_server(Duration::from_secs(30)).await;
    let mut client = connect(addr, "/ws/ingest-auth").await;
    next_json(&mut client).await;

    client
        .send(Message::Text("not json".into()))
        .await
        .expect("send frame");
    assert_eq!(expect_close(&mut client).await, 4001);
}

#[tokio::test]
async fn silent_client_times_out_with_4001() {
    let (addr, _store) = spawn_test_server(Duration::from_millis(100)).await;
    let mut client = connect(addr, "/ws/ingest-auth").await;
    next_json(&mut client).await;

    assert_eq!(expect_close(&mut client).await, 4001);
}
