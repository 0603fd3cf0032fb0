//! Persistence of [`ConversationState`] keyed by [`ThreadId`].

pub mod error;
mod file;
mod memory;
pub mod value;

use std::fmt;

pub use error::Error;
pub use file::{FileStore, STATE_FILE, THREADS_DIR};
pub use memory::MemoryStore;
use warden_conversation::{ConversationState, PendingInterrupt, ThreadId};

use crate::error::Result;

/// Durable storage of conversation state.
///
/// A checkpoint is written whenever the turn controller reaches a stable
/// point (a user message appended, a tool result recorded, a turn suspended
/// on a confirmation). Loading a thread that was never persisted returns
/// `None`.
pub trait CheckpointStore: fmt::Debug + Send + Sync {
    /// Load the state of a thread.
    fn load(&self, thread: &ThreadId) -> Result<Option<ConversationState>>;

    /// Persist the state of a thread, replacing any previous checkpoint.
    fn persist(&self, thread: &ThreadId, state: &ConversationState) -> Result<()>;

    /// List all persisted threads, sorted by ID.
    fn list(&self) -> Result<Vec<ThreadId>>;

    /// Remove the pending interrupt of a thread and persist the result.
    ///
    /// The read, removal and write happen as one step with respect to every
    /// other user of the same store, including other processes sharing a
    /// [`FileStore`] root. Of two concurrent callers at most one receives
    /// the interrupt.
    ///
    /// Returns `None` if the thread does not exist or has nothing pending.
    fn take_pending_interrupt(
        &self,
        thread: &ThreadId,
    ) -> Result<Option<(ConversationState, PendingInterrupt)>>;
}
