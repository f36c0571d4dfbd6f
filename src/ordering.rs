//! Per-conversation ordering
//!
//! Store-then-route for one conversation runs under that conversation's
//! async mutex, so peers see messages in the order they were stored.
//! Different conversations never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::ConversationId;

/// Lazily created lock per conversation
///
/// An entry lives only while some task holds or waits on it.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<ConversationId, Arc<AsyncMutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<ConversationId, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive use of `conversation`
    pub async fn lock(&self, conversation: &ConversationId) -> ConversationGuard<'_> {
        let lock = self.map().entry(conversation.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        ConversationGuard {
            locks: self,
            conversation: conversation.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}

/// Held while a message for one conversation is stored and routed
#[derive(Debug)]
pub struct ConversationGuard<'a> {
    locks: &'a ConversationLocks,
    conversation: ConversationId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.locks.map();
        // Nobody else holds or waits on it once only the map references it.
        if map
            .get(&self.conversation)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.conversation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_entry_removed_after_release() {
        let locks = ConversationLocks::new();
        let room = ConversationId::from("room1");

        let guard = locks.lock(&room).await;
        assert_eq!(locks.len(), 1);
        drop(guard);

        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_same_conversation_waits() {
        let locks = ConversationLocks::new();
        let room = ConversationId::from("room1");

        let guard = locks.lock(&room).await;
        let blocked = tokio::time::timeout(Duration::from_millis(30), locks.lock(&room)).await;
        assert!(blocked.is_err());

        drop(guard);
        let _guard = locks.lock(&room).await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_other_conversation_does_not_wait() {
        let locks = ConversationLocks::new();

        let _room1 = locks.lock(&ConversationId::from("room1")).await;
        let room2 = tokio::time::timeout(
            Duration::from_millis(30),
            locks.lock(&ConversationId::from(2i64)),
        )
        .await;

        assert!(room2.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
