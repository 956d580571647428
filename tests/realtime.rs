use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use school_messenger::chat::realtime::{ConnectionState, RealtimeChannel, RealtimeConfig};
use school_messenger::{LocalIdentity, Store};

const HANDSHAKE: &str = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return text,
            Some(Ok(_)) => continue,
            other => panic!("socket ended: {other:?}"),
        }
    }
}

/// Engine.IO open + Socket.IO connect; returns the join frame the client sent.
async fn handshake(ws: &mut WebSocketStream<TcpStream>) -> String {
    handshake_with(ws, HANDSHAKE).await
}

async fn handshake_with(ws: &mut WebSocketStream<TcpStream>, open: &str) -> String {
    ws.send(Message::Text(open.into())).await.unwrap();
    assert_eq!(next_text(ws).await, "40");
    ws.send(Message::Text(r#"40{"sid":"n1"}"#.into())).await.unwrap();
    next_text(ws).await
}

fn config(url: String) -> RealtimeConfig {
    RealtimeConfig {
        url,
        reconnect_base: Duration::from_millis(20),
        reconnect_max: Duration::from_millis(100),
        max_attempts: 0,
    }
}

fn event(name: &str, thread: serde_json::Value) -> Message {
    Message::Text(format!("42{}", json!([name, thread])))
}

#[tokio::test]
async fn joins_room_and_routes_pushes_into_store() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (join_tx, mut join_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        join_tx.send(handshake(&mut ws).await).unwrap();

        ws.send(Message::Text("2".into())).await.unwrap();
        assert_eq!(next_text(&mut ws).await, "3");

        // Addressed to another guardian: must be ignored.
        ws.send(event("new_request", json!({
            "id": "forged", "sender_id": "staff_9", "recipient_id": "guardian_other",
            "questions": ["?"], "status": "pending"
        })))
        .await
        .unwrap();
        ws.send(event("new_response", json!({
            "id": "t1", "sender_id": "guardian_jdoe", "recipient_id": "staff_42",
            "questions": ["When is the exam?"], "status": "pending",
            "responses": [{"answer": "Friday", "timestamp": "2024-01-02T08:00:00Z"}],
            "created_at": "2024-01-01T00:00:00Z"
        })))
        .await
        .unwrap();
        // Keep the socket open until the client hangs up.
        while ws.next().await.is_some() {}
    });

    let store = Store::new();
    let mut revisions = store.subscribe();
    let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
    let handle = RealtimeChannel::open(config(url), LocalIdentity::guardian("jdoe"), store.clone());

    let join = timeout(Duration::from_secs(5), join_rx.recv()).await.unwrap().unwrap();
    assert_eq!(join, r#"42["join","guardian_jdoe"]"#);

    timeout(Duration::from_secs(5), revisions.changed()).await.unwrap().unwrap();
    let threads = store.requests_by_user("staff_42");
    assert_eq!(threads.len(), 1);
    assert!(threads[0].has_responses());
    // Status is whatever the payload says; responses alone do not change it.
    assert_eq!(threads[0].status, school_messenger::ThreadStatus::Pending);
    assert!(store.requests_by_user("staff_9").is_empty());
    assert_eq!(store.counterparts(), ["staff_42"]);

    assert_eq!(handle.current_state(), ConnectionState::Open);
    let mut state = handle.state();
    handle.close();
    timeout(Duration::from_secs(5), state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn dropped_connection_is_retried_and_rejoined() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (join_tx, mut join_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for _ in 0..2 {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            join_tx.send(handshake(&mut ws).await).unwrap();
            let _ = ws.close(None).await;
        }
    });

    let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
    let handle = RealtimeChannel::open(config(url), LocalIdentity::staff("42"), Store::new());
    let mut state = handle.state();

    for _ in 0..2 {
        let join = timeout(Duration::from_secs(5), join_rx.recv()).await.unwrap().unwrap();
        assert_eq!(join, r#"42["join","staff_42"]"#);
    }
    timeout(Duration::from_secs(5), state.wait_for(|s| matches!(s, ConnectionState::Retrying { .. })))
        .await
        .unwrap()
        .unwrap();

    drop(handle);
    timeout(Duration::from_secs(5), state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn silent_server_is_dropped_and_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (join_tx, mut join_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let short = r#"0{"sid":"s1","upgrades":[],"pingInterval":100,"pingTimeout":100}"#;
        for _ in 0..2 {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            join_tx.send(handshake_with(&mut ws, short).await).unwrap();
            // Never ping; just wait for the client to give up on us.
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
    let slow_retry = RealtimeConfig { reconnect_base: Duration::from_millis(200), ..config(url) };
    let handle = RealtimeChannel::open(slow_retry, LocalIdentity::guardian("jdoe"), Store::new());
    let mut state = handle.state();

    timeout(Duration::from_secs(5), join_rx.recv()).await.unwrap().unwrap();
    timeout(Duration::from_secs(5), state.wait_for(|s| matches!(s, ConnectionState::Retrying { .. })))
        .await
        .unwrap()
        .unwrap();
    let rejoin = timeout(Duration::from_secs(5), join_rx.recv()).await.unwrap().unwrap();
    assert_eq!(rejoin, r#"42["join","guardian_jdoe"]"#);

    drop(handle);
    timeout(Duration::from_secs(5), state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .unwrap()
        .unwrap();
}
