use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{trace, warn};
use warden_conversation::{ConversationState, PendingInterrupt, ThreadId};

use crate::{
    CheckpointStore,
    error::{Error, Result},
    value::{read_json, write_json},
};

pub const THREADS_DIR: &str = "threads";
pub const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = ".lock";

/// A [`CheckpointStore`] that writes one JSON file per thread.
///
/// Layout: `<root>/threads/<thread-id>/state.json`.
///
/// Writes and interrupt removals hold an exclusive lock on
/// `<root>/threads/<thread-id>/.lock`, so several processes can share a root.
#[derive(Debug)]
pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    /// Open the store at `root`, creating the directory if needed.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Result<Self> {
        let root: Utf8PathBuf = root.into();
        if root.exists() {
            if !root.is_dir() {
                return Err(Error::NotDir(root));
            }
        } else {
            fs::create_dir_all(&root)?;
            trace!(path = %root, "Created storage directory.");
        }

        Ok(Self { root })
    }

    /// Returns the path to the storage directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    fn thread_dir(&self, thread: &ThreadId) -> Utf8PathBuf {
        self.root.join(THREADS_DIR).join(thread.as_str())
    }

    fn state_path(&self, thread: &ThreadId) -> Utf8PathBuf {
        self.thread_dir(thread).join(STATE_FILE)
    }

    /// Block until this handle holds the exclusive lock of a thread.
    ///
    /// The lock is released when the returned file is dropped.
    fn lock(&self, thread: &ThreadId) -> Result<fs::File> {
        let dir = self.thread_dir(thread);
        fs::create_dir_all(&dir)?;

        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        file.lock()?;

        Ok(file)
    }
}

impl CheckpointStore for FileStore {
    fn load(&self, thread: &ThreadId) -> Result<Option<ConversationState>> {
        let path = self.state_path(thread);
        trace!(%thread, path = %path, "Loading thread state.");

        read_json(&path)
    }

    fn persist(&self, thread: &ThreadId, state: &ConversationState) -> Result<()> {
        let path = self.state_path(thread);
        trace!(%thread, path = %path, messages = state.len(), "Persisting thread state.");

        let _lock = self.lock(thread)?;
        write_json(&path, state)
    }

    fn list(&self) -> Result<Vec<ThreadId>> {
        let dir = self.root.join(THREADS_DIR);
        if !dir.is_dir() {
            return Ok(vec![]);
        }

        let mut threads = vec![];
        for entry in dir.read_dir_utf8()? {
            let entry = entry?;
            if !entry.path().join(STATE_FILE).is_file() {
                continue;
            }

            match ThreadId::new(entry.file_name()) {
                Ok(id) => threads.push(id),
                Err(error) => warn!(path = %entry.path(), %error, "Skipping invalid thread directory."),
            }
        }

        threads.sort();
        Ok(threads)
    }

    fn take_pending_interrupt(
        &self,
        thread: &ThreadId,
    ) -> Result<Option<(ConversationState, PendingInterrupt)>> {
        let path = self.state_path(thread);
        if !path.is_file() {
            return Ok(None);
        }

        let _lock = self.lock(thread)?;
        let Some(mut state) = read_json::<ConversationState>(&path)? else {
            return Ok(None);
        };
        let Some(interrupt) = state.take_pending_interrupt() else {
            return Ok(None);
        };

        trace!(%thread, tool_call_id = interrupt.tool_call_id(), "Took pending interrupt.");
        write_json(&path, &state)?;

        Ok(Some((state, interrupt)))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use test_log::test;
    use warden_conversation::{PendingInterrupt, ToolCallRequest};

    use super::*;

    #[test]
    fn test_file_store_creates_missing_root() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("nested/store");

        let store = FileStore::new(&root).unwrap();
        assert!(store.path().is_dir());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_errors_on_file_root() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("file.txt");
        fs::write(&path, "").unwrap();

        assert_matches!(FileStore::new(&path), Err(Error::NotDir(p)) if p == path);
    }

    #[test]
    fn test_file_store_roundtrip_with_pending_interrupt() {
        let tmp = tempdir().unwrap();
        let store = FileStore::new(tmp.path()).unwrap();
        let thread = ThreadId::new("thread-1").unwrap();

        assert!(store.load(&thread).unwrap().is_none());

        let call = ToolCallRequest::new("call_1", "createSql", serde_json::Map::new());
        let mut state = ConversationState::new();
        state.add_user_message("insert a row");
        state.add_assistant_message("", vec![call.clone()]);
        state
            .set_pending_interrupt(PendingInterrupt::new(call, "Run the statement?", 1))
            .unwrap();

        store.persist(&thread, &state).unwrap();
        assert!(
            tmp.path()
                .join("threads/thread-1/state.json")
                .is_file()
        );

        // A fresh store over the same directory sees the same state.
        let reopened = FileStore::new(tmp.path()).unwrap();
        let loaded = reopened.load(&thread).unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.pending_interrupt().unwrap().tool_call_id(), "call_1");
    }

    #[test]
    fn test_file_store_lists_threads_sorted() {
        let tmp = tempdir().unwrap();
        let store = FileStore::new(tmp.path()).unwrap();

        for id in ["b", "a", "c"] {
            store
                .persist(&ThreadId::new(id).unwrap(), &ConversationState::new())
                .unwrap();
        }

        // Directories without a state file and invalid names are ignored.
        fs::create_dir_all(tmp.path().join("threads/empty")).unwrap();
        fs::create_dir_all(tmp.path().join("threads/bad name")).unwrap();
        fs::write(tmp.path().join("threads/bad name/state.json"), "{}").unwrap();

        let ids = store.list().unwrap();
        let ids = ids.iter().map(ThreadId::as_str).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_file_store_reports_corrupt_state() {
        let tmp = tempdir().unwrap();
        let store = FileStore::new(tmp.path()).unwrap();
        let thread = ThreadId::new("broken").unwrap();

        let path = tmp.path().join("threads/broken/state.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[]").unwrap();

        assert_matches!(store.load(&thread), Err(Error::Corrupt { .. }));
    }

    #[test]
    fn test_file_store_interrupt_taken_once_across_handles() {
        let tmp = tempdir().unwrap();
        let thread = ThreadId::new("shared").unwrap();

        let call = ToolCallRequest::new("call_1", "createSql", serde_json::Map::new());
        let mut state = ConversationState::new();
        state.add_assistant_message("", vec![call.clone()]);
        state
            .set_pending_interrupt(PendingInterrupt::new(call, "Run the statement?", 0))
            .unwrap();
        FileStore::new(tmp.path())
            .unwrap()
            .persist(&thread, &state)
            .unwrap();

        let handles = (0..8)
            .map(|_| {
                let store = FileStore::new(tmp.path()).unwrap();
                let thread = thread.clone();
                std::thread::spawn(move || store.take_pending_interrupt(&thread).unwrap())
            })
            .collect::<Vec<_>>();

        let taken = handles
            .into_iter()
            .filter_map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].1.tool_call_id(), "call_1");

        let loaded = FileStore::new(tmp.path())
            .unwrap()
            .load(&thread)
            .unwrap()
            .unwrap();
        assert!(loaded.pending_interrupt().is_none());
        assert_eq!(store_threads(tmp.path()), vec!["shared"]);
    }

    #[test]
    fn test_file_store_lock_excludes_other_handles() {
        let tmp = tempdir().unwrap();
        let thread = ThreadId::new("locked").unwrap();
        let first = FileStore::new(tmp.path()).unwrap();
        let second = FileStore::new(tmp.path()).unwrap();

        let held = first.lock(&thread).unwrap();
        let path = tmp.path().join("threads/locked/.lock");
        let other = fs::OpenOptions::new().write(true).open(&path).unwrap();
        assert!(other.try_lock().is_err());

        drop(held);
        drop(other);
        second.persist(&thread, &ConversationState::new()).unwrap();
        assert!(second.load(&thread).unwrap().is_some());
    }

    fn store_threads(root: &Utf8Path) -> Vec<String> {
        FileStore::new(root)
            .unwrap()
            .list()
            .unwrap()
            .into_iter()
            .map(|id| id.as_str().to_owned())
            .collect()
    }
}
