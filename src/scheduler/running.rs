use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::Result;

/// Whether an execution is in flight and whether to re-queue on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningEntry {
    pub running: bool,
    pub re_add: bool,
}

/// Tracks in-flight executions by qualified event name.
///
/// Entries double as tombstones: dropping or updating an event while it
/// runs flips `re_add` to false but keeps the entry, so the completion
/// path learns the definition is stale instead of resurrecting it.
pub struct RunningSet {
    entries: Mutex<HashMap<String, RunningEntry>>,
}

impl RunningSet {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, qualified_name: &str, running: bool, re_add: bool) -> Result<()> {
        let mut entries = self.entries.lock()?;
        entries.insert(qualified_name.to_string(), RunningEntry { running, re_add });
        Ok(())
    }

    pub fn get(&self, qualified_name: &str) -> Option<RunningEntry> {
        let entries = self.entries.lock().ok()?;
        entries.get(qualified_name).copied()
    }

    pub fn clear(&self, qualified_name: &str) -> Result<()> {
        self.entries.lock()?.remove(qualified_name);
        Ok(())
    }

    /// Marks every running event of `database` as not-to-be-requeued.
    ///
    /// Entries stay in the set: the completion handler must still find the
    /// tombstone after the database itself is gone.
    pub fn clear_database(&self, database: &str) -> Result<()> {
        let prefix = format!("{}.", database);
        let mut entries = self.entries.lock()?;
        for (name, entry) in entries.iter_mut() {
            if name.starts_with(&prefix) {
                entry.re_add = false;
            }
        }
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        self.entries.lock()?.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunningSet {
    fn default() -> Self {
        Self::new()
    }
}
