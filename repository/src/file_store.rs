//! JSON snapshot entry store.
//!
//! Entries live in memory and the whole collection is rewritten to a single
//! JSON file after every save or delete. Writes go through a temporary file
//! and a rename so a crash never leaves a half-written snapshot behind.
//! Changes are applied to a staged copy and only become visible once the
//! snapshot is on disk, so a failed write leaves memory matching the file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entry::{LexEntry, RepositoryId};
use crate::error::{Result, StorageError};
use crate::query::Query;
use crate::result_set::ResultSet;
use crate::store::{EntryStore, MemoryEntryStore};

/// On-disk layout of the snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    entries: Vec<LexEntry>,
}

/// Entry store persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileEntryStore {
    path: PathBuf,
    inner: MemoryEntryStore,
}

impl JsonFileEntryStore {
    /// Open the store at `path`, loading the snapshot if one exists.
    ///
    /// Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::CreateDirectory(format!("{}: {e}", parent.display()))
            })?;
        }

        let inner = if path.exists() {
            Self::load(&path)?
        } else {
            debug!("No snapshot at {}, starting empty", path.display());
            MemoryEntryStore::new()
        };

        Ok(Self { path, inner })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<MemoryEntryStore> {
        let content = fs::read_to_string(path)
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        let mut store = MemoryEntryStore::from_entries(snapshot.entries);
        store.reserve_ids_below(snapshot.next_id);
        info!(
            "Loaded {} entries from {}",
            store.count_all_items(),
            path.display()
        );
        Ok(store)
    }

    /// Apply `change` to a copy of the entries, write it, then adopt it.
    fn commit(&mut self, change: impl FnOnce(&mut MemoryEntryStore) -> Result<()>) -> Result<()> {
        let mut staged = self.inner.clone();
        change(&mut staged)?;
        Self::flush(&self.path, &staged)?;
        self.inner = staged;
        Ok(())
    }

    fn flush(path: &Path, store: &MemoryEntryStore) -> Result<()> {
        let snapshot = Snapshot {
            next_id: store.next_id(),
            entries: store.entries().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, path)
            .map_err(|e| StorageError::WriteFile(format!("{}: {e}", path.display())))?;

        debug!(
            "Wrote {} entries to {}",
            snapshot.entries.len(),
            path.display()
        );
        Ok(())
    }
}

impl EntryStore for JsonFileEntryStore {
    fn create_item(&mut self) -> Result<LexEntry> {
        self.inner.create_item()
    }

    fn get_item(&self, id: RepositoryId) -> Result<LexEntry> {
        self.inner.get_item(id)
    }

    fn get_id(&self, entry: &LexEntry) -> Result<RepositoryId> {
        self.inner.get_id(entry)
    }

    fn get_all_items(&self) -> Vec<RepositoryId> {
        self.inner.get_all_items()
    }

    fn count_all_items(&self) -> usize {
        self.inner.count_all_items()
    }

    fn contains(&self, id: RepositoryId) -> bool {
        self.inner.contains(id)
    }

    fn save_item(&mut self, entry: &LexEntry) -> Result<()> {
        self.commit(|store| store.save_item(entry))
    }

    fn save_items(&mut self, entries: &[LexEntry]) -> Result<()> {
        self.commit(|store| store.save_items(entries))
    }

    fn delete_item(&mut self, id: RepositoryId) -> Result<()> {
        self.commit(|store| store.delete_item(id))
    }

    fn delete_all_items(&mut self) -> Result<()> {
        self.commit(|store| store.delete_all_items())
    }

    fn run_query(&self, query: &Query) -> Result<ResultSet> {
        self.inner.run_query(query)
    }

    fn can_query(&self) -> bool {
        true
    }

    fn can_persist(&self) -> bool {
        true
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.inner.last_modified()
    }
}
