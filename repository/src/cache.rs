//! Live caches of query results.
//!
//! Each cache holds one query and its materialized, sorted result set. Writes
//! through the repository are broadcast to every cache, which patches only
//! the rows of the affected entry instead of re-running the query.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::{LexEntry, RepositoryId};
use crate::query::Query;
use crate::result_set::ResultSet;

/// A cached result set that can be patched incrementally.
pub trait CacheHandle {
    /// Add the rows of a new entry.
    fn apply_insert(&mut self, entry: &LexEntry);

    /// Replace the rows of an existing entry with its current projection.
    fn apply_update(&mut self, entry: &LexEntry);

    /// Drop every row of an entry.
    fn apply_delete(&mut self, id: RepositoryId);

    /// Drop every row.
    fn apply_clear(&mut self);

    fn result_set(&self) -> &ResultSet;

    /// Mutable access for computed fields that do not affect row order.
    fn result_set_mut(&mut self) -> &mut ResultSet;

    fn query(&self) -> &Query;
}

/// A query together with its live result set.
#[derive(Debug, Clone)]
pub struct ResultSetCache {
    query: Query,
    results: ResultSet,
}

impl ResultSetCache {
    /// Wrap an already executed result set. The rows must be in the query's
    /// sort order.
    pub fn new(query: Query, results: ResultSet) -> Self {
        Self { query, results }
    }

    fn insert_rows(&mut self, entry: &LexEntry) {
        let query = &self.query;
        let tokens = self.results.tokens_mut();
        for row in query.rows_for(entry) {
            let at = query.insertion_point(tokens, &row);
            tokens.insert(at, row);
        }
    }
}

impl CacheHandle for ResultSetCache {
    fn apply_insert(&mut self, entry: &LexEntry) {
        self.insert_rows(entry);
    }

    fn apply_update(&mut self, entry: &LexEntry) {
        self.apply_delete(entry.repository_id());
        self.insert_rows(entry);
    }

    fn apply_delete(&mut self, id: RepositoryId) {
        self.results
            .tokens_mut()
            .retain(|token| token.repository_id() != id);
    }

    fn apply_clear(&mut self) {
        self.results.tokens_mut().clear();
    }

    fn result_set(&self) -> &ResultSet {
        &self.results
    }

    fn result_set_mut(&mut self) -> &mut ResultSet {
        &mut self.results
    }

    fn query(&self) -> &Query {
        &self.query
    }
}

/// Diagnostics about the installed caches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of installed caches.
    pub caches: usize,

    /// Rows held across all caches.
    pub total_rows: usize,

    /// Row count per query label.
    pub sizes: BTreeMap<String, usize>,
}

/// Registry of live caches keyed by query label.
#[derive(Default)]
pub struct ResultSetCacheManager {
    caches: HashMap<String, Box<dyn CacheHandle>>,
}

impl ResultSetCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&dyn CacheHandle> {
        self.caches.get(label).map(|cache| cache.as_ref())
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut (dyn CacheHandle + 'static)> {
        self.caches.get_mut(label).map(|cache| cache.as_mut())
    }

    /// Install a live cache for `query`, replacing any cache with the same
    /// label.
    pub fn add(&mut self, query: Query, results: ResultSet) {
        let label = query.label();
        debug!("Caching {} rows for {label}", results.len());
        self.caches
            .insert(label, Box::new(ResultSetCache::new(query, results)));
    }

    pub fn add_item_to_caches(&mut self, entry: &LexEntry) {
        debug!(
            "Adding entry {} to {} caches",
            entry.repository_id(),
            self.caches.len()
        );
        for cache in self.caches.values_mut() {
            cache.apply_insert(entry);
        }
    }

    pub fn update_item_in_caches(&mut self, entry: &LexEntry) {
        debug!(
            "Updating entry {} in {} caches",
            entry.repository_id(),
            self.caches.len()
        );
        for cache in self.caches.values_mut() {
            cache.apply_update(entry);
        }
    }

    pub fn delete_item_from_caches(&mut self, id: RepositoryId) {
        debug!("Removing entry {id} from {} caches", self.caches.len());
        for cache in self.caches.values_mut() {
            cache.apply_delete(id);
        }
    }

    pub fn delete_all_items_from_caches(&mut self) {
        for cache in self.caches.values_mut() {
            cache.apply_clear();
        }
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Labels of the installed caches, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.caches.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn stats(&self) -> CacheStats {
        let sizes: BTreeMap<String, usize> = self
            .caches
            .iter()
            .map(|(label, cache)| (label.clone(), cache.result_set().len()))
            .collect();
        CacheStats {
            caches: sizes.len(),
            total_rows: sizes.values().sum(),
            sizes,
        }
    }
}
