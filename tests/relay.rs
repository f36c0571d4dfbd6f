//! End-to-end tests against a relay listening on a local port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use query_relay::{serve, ConversationId, MemoryStore, ParticipantId, Relay, RelaySettings, ServerMessage};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> (SocketAddr, Arc<Relay>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let relay = Arc::new(Relay::new(store.clone(), RelaySettings::default()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, relay.clone()));
    (addr, relay, store)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut WsClient, frame: &str) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut WsClient) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut WsClient) {
    assert!(
        timeout(Duration::from_millis(200), ws.next()).await.is_err(),
        "expected no frame"
    );
}

async fn auth(ws: &mut WsClient, query: &str, user: &str) {
    send(
        ws,
        &format!(r#"{{"type":"auth","queryId":"{query}","userId":"{user}","userType":"client"}}"#),
    )
    .await;
    assert_eq!(recv(ws).await, ServerMessage::auth_success());
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_message_reaches_peer_only() {
    let (addr, _relay, store) = start_relay().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    auth(&mut a, "room1", "A").await;
    auth(&mut b, "room1", "B").await;

    send(&mut a, r#"{"type":"message","queryId":"room1","userId":"A","message":"hi"}"#).await;

    let received = recv(&mut b).await;
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].conversation_id, ConversationId::from("room1"));
    assert_eq!(records[0].sender_id, ParticipantId::from("A"));
    assert_eq!(records[0].body, "hi");
    assert_eq!(
        received,
        ServerMessage::Message {
            sender_id: ParticipantId::from("A"),
            message: "hi".to_string(),
            created_at: records[0].created_at,
        }
    );
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_other_conversation_not_reached() {
    let (addr, _relay, _store) = start_relay().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    auth(&mut a, "room1", "A").await;
    auth(&mut b, "room1", "B").await;
    auth(&mut c, "room2", "C").await;

    send(&mut a, r#"{"type":"message","queryId":"room1","userId":"A","message":"hi"}"#).await;

    assert!(matches!(recv(&mut b).await, ServerMessage::Message { .. }));
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn test_bad_frames_keep_connection_open() {
    let (addr, _relay, store) = start_relay().await;
    let mut a = connect(addr).await;

    send(&mut a, "definitely not json").await;
    assert!(matches!(recv(&mut a).await, ServerMessage::Error { .. }));

    send(&mut a, r#"{"type":"presence"}"#).await;
    assert_silent(&mut a).await;

    // Still usable afterwards.
    auth(&mut a, "room1", "A").await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_disconnect_purges_registry() {
    let (addr, relay, _store) = start_relay().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    auth(&mut a, "room1", "A").await;
    auth(&mut b, "room2", "B").await;

    b.close(None).await.unwrap();
    let room2 = ConversationId::from("room2");
    wait_until(|| relay.registry().participant_count(&room2) == 0).await;

    assert_eq!(relay.registry().participant_count(&ConversationId::from("room1")), 1);
    assert_eq!(relay.registry().conversation_count(), 1);

    drop(a);
    wait_until(|| relay.registry().conversation_count() == 0).await;
}
