// `Session` with the real-time channel enabled, against a local backend
// that answers the device listing over HTTP and upgrades `/socket.io/`
// requests to a WebSocket on the same port.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use slvctl_core::{AttributeValue, Session, SessionConfig};

type ServerSocket = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

// ── Fake backend ────────────────────────────────────────────────────

fn listing() -> Value {
    json!({
        "items": [{
            "deviceId": "et312-1",
            "deviceName": "ET312",
            "state": "READY",
            "attributes": {
                "levelA": { "name": "levelA", "type": "range", "modifier": "rw",
                            "min": 0, "max": 99, "incrementStep": 1, "value": 12 }
            }
        }]
    })
}

/// Accept connections forever, handing every upgraded socket to `sockets`.
async fn serve(listener: TcpListener, sockets: mpsc::UnboundedSender<ServerSocket>) {
    while let Ok((stream, _)) = listener.accept().await {
        let sockets = sockets.clone();
        tokio::spawn(async move {
            if request_head(&stream).await.contains("/socket.io/") {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let _ = sockets.send(ws);
            } else {
                answer_listing(stream).await;
            }
        });
    }
}

/// The request line, read without consuming it.
async fn request_head(stream: &TcpStream) -> String {
    let mut buf = [0u8; 512];
    loop {
        let n = stream.peek(&mut buf).await.unwrap();
        let head = String::from_utf8_lossy(&buf[..n]).into_owned();
        if n == 0 || n == buf.len() || head.contains("\r\n") {
            return head;
        }
        tokio::task::yield_now().await;
    }
}

async fn answer_listing(mut stream: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&buf[..n]);
    }

    let body = listing().to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    let _ = stream.shutdown().await;
}

async fn start_backend() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(serve(listener, tx));
    (base, rx)
}

async fn next_socket(sockets: &mut mpsc::UnboundedReceiver<ServerSocket>) -> ServerSocket {
    tokio::time::timeout(WAIT, sockets.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn next_text(ws: &mut ServerSocket) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn handshake(ws: &mut ServerSocket) {
    ws.send(Message::text(r#"0{"sid":"eio-1","upgrades":[]}"#))
        .await
        .unwrap();
    assert_eq!(next_text(ws).await, "40");
    ws.send(Message::text(r#"40{"sid":"sio-1"}"#)).await.unwrap();
}

async fn push(ws: &mut ServerSocket, name: &str, payload: Value) {
    let frame = format!("42{}", json!([name, payload]));
    ws.send(Message::text(frame)).await.unwrap();
}

fn level_of(session: &Session) -> Option<AttributeValue> {
    session.device("et312-1")?.attribute("levelA")?.value()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_pushes_and_writes_flow_through_the_channel() {
    let (base, mut sockets) = start_backend().await;
    let session = Session::new(SessionConfig {
        backend_url: Some(base),
        ..SessionConfig::default()
    })
    .unwrap();

    session.connect().await.unwrap();
    let mut ws = next_socket(&mut sockets).await;
    handshake(&mut ws).await;
    session.wait_realtime(WAIT).await.unwrap();

    let mut devices = session.devices();

    // Server push replaces the attribute map.
    push(
        &mut ws,
        "deviceRefreshed",
        json!({
            "deviceId": "et312-1",
            "lastRefresh": "2024-05-01T10:00:00Z",
            "attributes": {
                "levelA": { "name": "levelA", "type": "range", "min": 0, "max": 99, "value": 33 }
            }
        }),
    )
    .await;
    let changes = tokio::time::timeout(WAIT, devices.next_changes())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(changes[0].device_id(), "et312-1");
    assert_eq!(level_of(&session), Some(AttributeValue::Float(33.0)));

    push(&mut ws, "deviceConnected", json!({ "deviceId": "tts-2" })).await;
    tokio::time::timeout(WAIT, devices.next_changes())
        .await
        .unwrap()
        .unwrap();
    assert!(session.device("tts-2").is_some());

    // Local write reaches the backend.
    session
        .set_attribute("et312-1", "levelA", Some(AttributeValue::Int(40)))
        .await
        .unwrap();
    session.flush_writes(WAIT).await.unwrap();

    let frame = next_text(&mut ws).await;
    let args: Value = serde_json::from_str(frame.strip_prefix("42").unwrap()).unwrap();
    assert_eq!(
        args,
        json!(["deviceUpdate", { "deviceId": "et312-1", "data": { "levelA": 40 } }])
    );
    assert!(!session.device("et312-1").unwrap().receive_updates);

    // Disconnect inside the gate window still leaves the gate open.
    session.disconnect().await;
    assert!(session.device("et312-1").unwrap().receive_updates);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_connect_replaces_the_first_channel() {
    let (base, mut sockets) = start_backend().await;
    let session = Session::new(SessionConfig {
        backend_url: Some(base),
        ..SessionConfig::default()
    })
    .unwrap();

    session.connect().await.unwrap();
    let mut first = next_socket(&mut sockets).await;
    handshake(&mut first).await;
    session.wait_realtime(WAIT).await.unwrap();

    session.connect().await.unwrap();

    // The old channel says goodbye before the new one opens.
    assert_eq!(next_text(&mut first).await, "1");

    let mut second = next_socket(&mut sockets).await;
    handshake(&mut second).await;
    session.wait_realtime(WAIT).await.unwrap();

    session
        .set_attribute("et312-1", "levelA", Some(AttributeValue::Int(20)))
        .await
        .unwrap();
    session.flush_writes(WAIT).await.unwrap();
    assert!(next_text(&mut second).await.starts_with(r#"42["deviceUpdate""#));

    session.disconnect().await;
}
