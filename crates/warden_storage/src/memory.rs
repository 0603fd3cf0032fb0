use std::collections::BTreeMap;

use parking_lot::Mutex;
use warden_conversation::{ConversationState, PendingInterrupt, ThreadId};

use crate::{CheckpointStore, error::Result};

/// A [`CheckpointStore`] that keeps checkpoints in memory.
///
/// Checkpoints are cloned in and out, so callers never share mutable state
/// with the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: Mutex<BTreeMap<ThreadId, ConversationState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryStore {
    fn load(&self, thread: &ThreadId) -> Result<Option<ConversationState>> {
        Ok(self.threads.lock().get(thread).cloned())
    }

    fn persist(&self, thread: &ThreadId, state: &ConversationState) -> Result<()> {
        self.threads.lock().insert(thread.clone(), state.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<ThreadId>> {
        Ok(self.threads.lock().keys().cloned().collect())
    }

    fn take_pending_interrupt(
        &self,
        thread: &ThreadId,
    ) -> Result<Option<(ConversationState, PendingInterrupt)>> {
        let mut threads = self.threads.lock();
        let Some(state) = threads.get_mut(thread) else {
            return Ok(None);
        };

        Ok(state
            .take_pending_interrupt()
            .map(|interrupt| (state.clone(), interrupt)))
    }
}
