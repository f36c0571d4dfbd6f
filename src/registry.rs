//! Connection registry
//!
//! Tracks which connections are in which conversation. All state sits
//! behind one mutex; no operation awaits while holding it, so callers
//! snapshot what they need and do their I/O afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::connection::Connection;
use crate::types::{ConnectionId, ConversationId, ParticipantId, ParticipantRole};

/// A participant's registration inside one conversation
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection: Connection,
    pub role: ParticipantRole,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// ConversationId -> ParticipantId -> Participant
    conversations: HashMap<ConversationId, HashMap<ParticipantId, Participant>>,
    /// Reverse index for disconnect: ConnectionId -> keys it is bound to
    by_connection: HashMap<ConnectionId, HashSet<(ConversationId, ParticipantId)>>,
}

impl RegistryState {
    fn forget_key(&mut self, connection_id: ConnectionId, key: &(ConversationId, ParticipantId)) {
        if let Some(keys) = self.by_connection.get_mut(&connection_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_connection.remove(&connection_id);
            }
        }
    }
}

/// Process-wide map of conversations to their participants' connections
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `participant` in `conversation` to `connection`
    ///
    /// Last writer wins: an existing binding for the same key is replaced.
    /// Returns the id of the connection that was replaced, if any.
    pub fn register(
        &self,
        conversation: ConversationId,
        participant: ParticipantId,
        role: ParticipantRole,
        connection: Connection,
    ) -> Option<ConnectionId> {
        let mut state = self.lock();
        let connection_id = connection.id;
        let key = (conversation.clone(), participant.clone());

        let previous = state
            .conversations
            .entry(conversation)
            .or_default()
            .insert(participant, Participant { connection, role })
            .map(|p| p.connection.id);

        if let Some(previous_id) = previous {
            if previous_id != connection_id {
                state.forget_key(previous_id, &key);
            }
        }
        state.by_connection.entry(connection_id).or_default().insert(key);

        debug!(
            "Registry: {} conversations, {} connections",
            state.conversations.len(),
            state.by_connection.len()
        );

        previous.filter(|id| *id != connection_id)
    }

    /// Remove every binding held by `connection_id`
    ///
    /// Conversations left without participants are dropped. Returns the
    /// number of bindings removed; calling again for the same id is a no-op.
    pub fn unregister_connection(&self, connection_id: ConnectionId) -> usize {
        let mut state = self.lock();
        let Some(keys) = state.by_connection.remove(&connection_id) else {
            return 0;
        };

        let mut removed = 0;
        for (conversation, participant) in keys {
            let Some(participants) = state.conversations.get_mut(&conversation) else {
                continue;
            };
            // Only remove the entry if it still points at this connection.
            if participants
                .get(&participant)
                .is_some_and(|p| p.connection.id == connection_id)
            {
                participants.remove(&participant);
                removed += 1;
            }
            if participants.is_empty() {
                state.conversations.remove(&conversation);
                debug!("Conversation {} removed (empty)", conversation);
            }
        }

        removed
    }

    /// Snapshot of every connection in `conversation` except `excluded`
    pub fn peers_excluding(&self, conversation: &ConversationId, excluded: ConnectionId) -> Vec<Connection> {
        let state = self.lock();
        state
            .conversations
            .get(conversation)
            .map(|participants| {
                participants
                    .values()
                    .filter(|p| p.connection.id != excluded)
                    .map(|p| p.connection.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of conversations with at least one participant
    pub fn conversation_count(&self) -> usize {
        self.lock().conversations.len()
    }

    #[cfg(test)]
    pub(crate) fn contains_conversation(&self, conversation: &ConversationId) -> bool {
        self.lock().conversations.contains_key(conversation)
    }

    /// Number of participants registered in `conversation`
    pub fn participant_count(&self, conversation: &ConversationId) -> usize {
        self.lock()
            .conversations
            .get(conversation)
            .map_or(0, HashMap::len)
    }

    /// Connection currently bound to (`conversation`, `participant`)
    #[cfg(test)]
    pub(crate) fn connection_for(&self, conversation: &ConversationId, participant: &ParticipantId) -> Option<ConnectionId> {
        self.lock()
            .conversations
            .get(conversation)
            .and_then(|participants| participants.get(participant))
            .map(|p| p.connection.id)
    }
}
