//! Per-connection session
//!
//! Drives one client through `Unauthenticated → Active → Closed`. Every
//! inbound frame goes through a single dispatch point; any failure there
//! becomes an error event for this client and the session keeps running.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::{AuthRequest, ChatRequest, ClientMessage, ServerMessage};
use crate::server::Relay;
use crate::store::MessageRecord;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no `auth` accepted yet
    Unauthenticated,
    /// At least one `auth` accepted
    Active,
    /// Transport closed and registry purged
    Closed,
}

/// State for one accepted connection
pub struct Session {
    relay: Arc<Relay>,
    connection: Connection,
    state: SessionState,
}

impl Session {
    pub fn new(relay: Arc<Relay>, connection: Connection) -> Self {
        Self {
            relay,
            connection,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Handle one inbound text frame
    pub async fn handle_frame(&mut self, text: &str) {
        if self.state == SessionState::Closed {
            debug!("Dropping frame for closed connection {}", self.connection.id);
            return;
        }

        let reply = match self.dispatch(text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Error handling frame from {}: {}", self.connection.id, e);
                Some(e.into())
            }
        };

        if let Some(reply) = reply {
            self.reply(reply).await;
        }
    }

    /// Purge this connection from the registry
    ///
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let removed = self.relay.registry().unregister_connection(self.connection.id);
        self.state = SessionState::Closed;
        debug!(
            "Connection {} closed, {} registrations removed, {} conversations active",
            self.connection.id,
            removed,
            self.relay.registry().conversation_count()
        );
    }

    async fn dispatch(&mut self, text: &str) -> Result<Option<ServerMessage>, AppError> {
        match ClientMessage::parse(text)? {
            Some(ClientMessage::Auth(auth)) => Ok(Some(self.handle_auth(auth))),
            Some(ClientMessage::Message(chat)) => {
                self.handle_chat(chat).await?;
                Ok(None)
            }
            None => {
                debug!("Ignoring frame without a known type from {}", self.connection.id);
                Ok(None)
            }
        }
    }

    fn handle_auth(&mut self, auth: AuthRequest) -> ServerMessage {
        info!(
            "Connection {} joined conversation {} as {} ({})",
            self.connection.id, auth.conversation_id, auth.participant_id, auth.role
        );

        let registry = self.relay.registry();
        let replaced = registry.register(
            auth.conversation_id.clone(),
            auth.participant_id,
            auth.role,
            self.connection.clone(),
        );
        if let Some(previous) = replaced {
            debug!("Connection {} replaced {}", self.connection.id, previous);
        }
        debug!(
            "Conversation {} has {} participants",
            auth.conversation_id,
            registry.participant_count(&auth.conversation_id)
        );

        self.state = SessionState::Active;
        ServerMessage::auth_success()
    }

    async fn handle_chat(&self, chat: ChatRequest) -> Result<(), AppError> {
        let record = MessageRecord {
            conversation_id: chat.conversation_id,
            sender_id: chat.sender_id,
            body: chat.body,
            created_at: Utc::now(),
        };

        // Held until routing is done so peers see store order.
        let _ordered = self.relay.ordering().lock(&record.conversation_id).await;

        // Nothing is routed unless the write succeeded.
        self.relay.store().append(&record).await?;

        self.relay
            .router()
            .route(
                &record.conversation_id,
                self.connection.id,
                &record.sender_id,
                &record.body,
                record.created_at,
            )
            .await;
        Ok(())
    }

    async fn reply(&self, msg: ServerMessage) {
        if let Err(e) = self
            .connection
            .send_timeout(msg, self.relay.settings().send_timeout)
            .await
        {
            warn!("Failed to reply to {}: {}", self.connection.id, e);
        }
    }
}
