//! Message router
//!
//! Fans a stored message out to every other connection in its conversation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::message::ServerMessage;
use crate::registry::Registry;
use crate::types::{ConnectionId, ConversationId, ParticipantId};

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers messages to conversation peers
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<Registry>,
    send_timeout: Duration,
}

impl Router {
    pub fn new(registry: Arc<Registry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Send the message to every peer in `conversation` except `sender`
    ///
    /// Best effort: a peer that is gone or stays backed up past the send
    /// timeout is logged and counted, and the others still get the message.
    pub async fn route(
        &self,
        conversation: &ConversationId,
        sender: ConnectionId,
        sender_id: &ParticipantId,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> RouteReport {
        let peers = self.registry.peers_excluding(conversation, sender);
        if peers.is_empty() {
            debug!("No peers in conversation {}", conversation);
            return RouteReport::default();
        }

        let msg = ServerMessage::Message {
            sender_id: sender_id.clone(),
            message: body.to_string(),
            created_at,
        };

        let results = join_all(peers.iter().map(|peer| {
            let msg = msg.clone();
            async move { (peer.id, peer.send_timeout(msg, self.send_timeout).await) }
        }))
        .await;

        let mut report = RouteReport::default();
        for (peer_id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        "Delivery to {} in conversation {} failed: {}",
                        peer_id, conversation, e
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Routed message in conversation {}: {} delivered, {} failed",
            conversation, report.delivered, report.failed
        );
        report
    }
}
