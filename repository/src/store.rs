//! Entry storage.
//!
//! The `EntryStore` trait is the contract the repository decorates. Stores own
//! the entries and hand out copies; callers edit a copy and save it back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entry::{LexEntry, RepositoryId};
use crate::error::{LexiconError, Result};
use crate::query::Query;
use crate::result_set::ResultSet;

/// Storage backend for lexical entries.
pub trait EntryStore {
    /// Create a new, dirty entry with a fresh id. The entry is resident
    /// immediately but not persisted until saved.
    fn create_item(&mut self) -> Result<LexEntry>;

    /// Get a copy of an entry.
    fn get_item(&self, id: RepositoryId) -> Result<LexEntry>;

    /// The id of a resident entry.
    fn get_id(&self, entry: &LexEntry) -> Result<RepositoryId>;

    /// Ids of all entries in creation order.
    fn get_all_items(&self) -> Vec<RepositoryId>;

    fn count_all_items(&self) -> usize;

    /// Whether an entry with this id is resident, without copying it.
    fn contains(&self, id: RepositoryId) -> bool;

    /// Persist an entry.
    fn save_item(&mut self, entry: &LexEntry) -> Result<()>;

    /// Persist several entries at once.
    fn save_items(&mut self, entries: &[LexEntry]) -> Result<()> {
        for entry in entries {
            self.save_item(entry)?;
        }
        Ok(())
    }

    fn delete_item(&mut self, id: RepositoryId) -> Result<()>;

    fn delete_all_items(&mut self) -> Result<()>;

    /// Run a query over every entry.
    fn run_query(&self, query: &Query) -> Result<ResultSet>;

    fn can_query(&self) -> bool;

    fn can_persist(&self) -> bool;

    /// When the store content last changed.
    fn last_modified(&self) -> DateTime<Utc>;
}

/// In-memory entry store.
#[derive(Debug, Clone)]
pub struct MemoryEntryStore {
    entries: BTreeMap<RepositoryId, LexEntry>,
    next_id: u64,
    last_modified: DateTime<Utc>,
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
            last_modified: Utc::now(),
        }
    }

    /// Build a store from previously saved entries.
    ///
    /// An entry holding the largest possible id leaves no fresh ids, so
    /// `create_item` fails on the rebuilt store instead of reusing one.
    pub fn from_entries(entries: impl IntoIterator<Item = LexEntry>) -> Self {
        let mut store = Self::new();
        for mut entry in entries {
            entry.clean();
            store.next_id = store.next_id.max(entry.repository_id().get().saturating_add(1));
            store.entries.insert(entry.repository_id(), entry);
        }
        store
    }

    /// Next id the store will assign.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Never assign ids below `next_id`, even if they are free.
    pub(crate) fn reserve_ids_below(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    /// Iterate over the resident entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &LexEntry> {
        self.entries.values()
    }

    fn resident(&self, id: RepositoryId) -> Result<&LexEntry> {
        self.entries
            .get(&id)
            .ok_or_else(|| LexiconError::NotFound(format!("entry {id} is not in the repository")))
    }

    fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

impl EntryStore for MemoryEntryStore {
    fn create_item(&mut self) -> Result<LexEntry> {
        let id = RepositoryId::new(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| {
            LexiconError::InvariantViolation(format!("no repository ids left after {id}"))
        })?;

        let entry = LexEntry::new(id);
        let mut resident = entry.clone();
        resident.clean();
        self.entries.insert(id, resident);
        self.touch();

        debug!("Created entry {id}");
        Ok(entry)
    }

    fn get_item(&self, id: RepositoryId) -> Result<LexEntry> {
        self.resident(id).cloned()
    }

    fn get_id(&self, entry: &LexEntry) -> Result<RepositoryId> {
        self.resident(entry.repository_id())
            .map(LexEntry::repository_id)
    }

    fn get_all_items(&self) -> Vec<RepositoryId> {
        self.entries.keys().copied().collect()
    }

    fn count_all_items(&self) -> usize {
        self.entries.len()
    }

    fn contains(&self, id: RepositoryId) -> bool {
        self.entries.contains_key(&id)
    }

    fn save_item(&mut self, entry: &LexEntry) -> Result<()> {
        let id = self.get_id(entry)?;
        let mut saved = entry.clone();
        saved.clean();
        self.entries.insert(id, saved);
        self.touch();
        Ok(())
    }

    fn save_items(&mut self, entries: &[LexEntry]) -> Result<()> {
        // Validate first so a bad id leaves the store untouched.
        for entry in entries {
            self.get_id(entry)?;
        }
        for entry in entries {
            let mut saved = entry.clone();
            saved.clean();
            self.entries.insert(saved.repository_id(), saved);
        }
        self.touch();
        Ok(())
    }

    fn delete_item(&mut self, id: RepositoryId) -> Result<()> {
        self.entries
            .remove(&id)
            .ok_or_else(|| LexiconError::NotFound(format!("entry {id} is not in the repository")))?;
        self.touch();
        debug!("Deleted entry {id}");
        Ok(())
    }

    fn delete_all_items(&mut self) -> Result<()> {
        self.entries.clear();
        self.touch();
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Result<ResultSet> {
        Ok(query.execute(self.entries.values()))
    }

    fn can_query(&self) -> bool {
        true
    }

    fn can_persist(&self) -> bool {
        false
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}
