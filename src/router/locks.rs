//! Per-conversation turn serialization
//!
//! One async mutex per conversation id. Entries are created on demand and
//! dropped again once no turn holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;

type TurnLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
struct LockEntry {
    lock: TurnLock,
    /// Turns holding or waiting on `lock`
    users: usize,
}

#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, LockEntry>>,
}

impl ConversationLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        // The map holds no invariants a panicking holder could break
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until no other turn for `conversation_id` is running.
    ///
    /// The registration is owned by the returned guard from the start, so a
    /// caller dropped while still waiting releases it too.
    pub async fn acquire(&self, conversation_id: &str) -> ConversationGuard<'_> {
        let lock = {
            let mut map = self.map();
            let entry = map.entry(conversation_id.to_string()).or_default();
            entry.users += 1;
            Arc::clone(&entry.lock)
        };

        let mut guard = ConversationGuard {
            locks: self,
            conversation_id: conversation_id.to_string(),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    /// Conversations with a running or waiting turn
    #[must_use]
    pub fn active(&self) -> usize {
        self.map().len()
    }

    fn release(&self, conversation_id: &str) {
        let mut map = self.map();
        let Some(entry) = map.get_mut(conversation_id) else {
            return;
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users == 0 {
            map.remove(conversation_id);
        }
    }
}

/// Held for the duration of one turn
pub struct ConversationGuard<'a> {
    locks: &'a ConversationLocks,
    conversation_id: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        self.locks.release(&self.conversation_id);
    }
}
