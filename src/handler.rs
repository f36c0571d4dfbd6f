//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, the read
//! loop feeding frames to a `Session`, the writer task draining the
//! connection's outbound queue, and teardown.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::error::AppError;
use crate::server::Relay;
use crate::session::Session;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake and runs the session until the client
/// goes away. The connection is always purged from the registry on exit.
pub async fn handle_connection(stream: TcpStream, relay: Arc<Relay>) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (connection, mut msg_rx) = Connection::new(relay.settings().outbound_buffer);
    let client_id = connection.id;
    info!("Client {} connected from {}", client_id, peer_addr);

    // Spawn write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for client");

        let _ = ws_sender.close().await;
    });

    let mut session = Session::new(relay, connection);

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    session.handle_frame(&text).await;
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Some(Ok(Message::Ping(_))) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", client_id);
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!("Pong from {}", client_id);
                }
                Some(Ok(_)) => {
                    // Binary or raw frames - ignore
                }
                Some(Err(e)) => {
                    warn!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
                None => {
                    debug!("Stream ended for {}", client_id);
                    break;
                }
            },
            _ = &mut write_task => {
                debug!("Write task completed for {}", client_id);
                break;
            }
        }
    }

    session.close();
    info!("Client {} disconnected", client_id);

    Ok(())
}
