//! Connection handle definition
//!
//! Represents one accepted client as seen by the registry and router:
//! its id plus the sending half of its outbound queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ConnectionId;

/// Outbound handle to a connected client
///
/// Cheap to clone. The session task owns the original; the registry holds
/// clones that refer to the same queue. The writer task on the other end of
/// the queue serializes each message into one text frame.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Server → Client message queue
    sender: mpsc::Sender<ServerMessage>,
}

impl Connection {
    /// Create a connection handle with a fresh id and a queue of `capacity`
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let connection = Self {
            id: ConnectionId::new(),
            sender,
        };
        (connection, receiver)
    }

    /// Queue a message for this client
    ///
    /// Gives up if the queue stays full for `timeout`, and fails at once if
    /// the queue is closed (client disconnected).
    pub async fn send_timeout(&self, msg: ServerMessage, timeout: Duration) -> Result<(), SendError> {
        self.sender
            .send_timeout(msg, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SendError::Timeout,
                SendTimeoutError::Closed(_) => SendError::ChannelClosed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_connection_send() {
        let (conn, mut rx) = Connection::new(4);

        conn.send_timeout(ServerMessage::auth_success(), TIMEOUT).await.unwrap();

        assert_eq!(rx.recv().await, Some(ServerMessage::auth_success()));
    }

    #[tokio::test]
    async fn test_send_to_closed_connection() {
        let (conn, rx) = Connection::new(4);
        drop(rx);

        let result = conn.send_timeout(ServerMessage::auth_success(), TIMEOUT).await;
        assert!(matches!(result, Err(SendError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_send_timeout_on_full_queue() {
        let (conn, _rx) = Connection::new(1);
        conn.send_timeout(ServerMessage::auth_success(), TIMEOUT).await.unwrap();

        let result = conn
            .send_timeout(ServerMessage::auth_success(), TIMEOUT)
            .await;
        assert!(matches!(result, Err(SendError::Timeout)));
    }

    #[test]
    fn test_clones_share_identity() {
        let (conn, _rx) = Connection::new(1);
        let clone = conn.clone();
        assert_eq!(conn.id, clone.id);
    }
}
