//! The lexicon repository.
//!
//! `LexEntryRepository` decorates an [`EntryStore`] with cached, sorted views
//! of the entries. Every view is produced by a [`Query`]; its result set is
//! materialized on first use and afterwards patched by every create, save
//! and delete that goes through the repository.
//!
//! All operations take `&self` so that event handlers holding the
//! repository can call back into it. A save issued while another save is
//! running on the same call stack is ignored.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Utc};
use lexicon_matcher::{MatchOptions, find_closest_forms};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheHandle, CacheStats, ResultSetCacheManager};
use crate::config::LexiconConfig;
use crate::entry::{LanguageForm, LexEntry, RepositoryId, UNKNOWN_LABEL};
use crate::error::{LexiconError, Result};
use crate::events::{EntryEvent, EventBus};
use crate::file_store::JsonFileEntryStore;
use crate::query::Query;
use crate::query::fields::{
    FORM, GLOSS, GLOSS_WRITING_SYSTEM, GUID, HAS_HOMOGRAPH, HOMOGRAPH_NUMBER, ID,
};
use crate::result_set::{RecordToken, ResultSet};
use crate::store::EntryStore;
use crate::writing_system::WritingSystem;

/// Marks a save as running for as long as it is alive.
struct SaveGuard<'a>(&'a Cell<bool>);

impl<'a> SaveGuard<'a> {
    /// `None` if a save is already running.
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Repository of lexical entries with cached sorted views.
pub struct LexEntryRepository<S: EntryStore> {
    store: RefCell<S>,
    caches: RefCell<ResultSetCacheManager>,
    events: EventBus,
    saving: Cell<bool>,
    default_writing_system: WritingSystem,
    match_options: MatchOptions,
}

impl LexEntryRepository<JsonFileEntryStore> {
    /// Open the file-backed repository described by `config`.
    pub fn open(config: &LexiconConfig) -> Result<Self> {
        config.validate()?;
        let store = JsonFileEntryStore::open(&config.data_path)?;
        Ok(Self::new(store)
            .with_default_writing_system(config.default_writing_system.clone())
            .with_match_options(config.matcher))
    }
}

impl<S: EntryStore> LexEntryRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: RefCell::new(store),
            caches: RefCell::new(ResultSetCacheManager::new()),
            events: EventBus::new(),
            saving: Cell::new(false),
            default_writing_system: WritingSystem::new("en"),
            match_options: MatchOptions::default(),
        }
    }

    pub fn with_default_writing_system(mut self, writing_system: WritingSystem) -> Self {
        self.default_writing_system = writing_system;
        self
    }

    pub fn with_match_options(mut self, options: MatchOptions) -> Self {
        self.match_options = options;
        self
    }

    /// Configured writing system for callers that have none of their own.
    /// Lookups never fall back to it; they take the writing system explicitly.
    pub fn default_writing_system(&self) -> &WritingSystem {
        &self.default_writing_system
    }

    /// Configured options to pass to `get_entries_with_similar_lexical_form`.
    pub fn match_options(&self) -> MatchOptions {
        self.match_options
    }

    /// Give back the underlying store.
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    // Store operations

    /// Create a new entry. It shows up in every cached view immediately but
    /// is only persisted once saved.
    pub fn create_item(&self) -> Result<LexEntry> {
        let entry = self.store.borrow_mut().create_item()?;
        self.caches.borrow_mut().add_item_to_caches(&entry);
        Ok(entry)
    }

    pub fn get_all_items(&self) -> Vec<RepositoryId> {
        self.store.borrow().get_all_items()
    }

    pub fn count_all_items(&self) -> usize {
        self.store.borrow().count_all_items()
    }

    pub fn get_id(&self, entry: &LexEntry) -> Result<RepositoryId> {
        self.store.borrow().get_id(entry)
    }

    pub fn get_item(&self, id: RepositoryId) -> Result<LexEntry> {
        self.store.borrow().get_item(id)
    }

    /// Run a query directly against the store, bypassing the caches.
    pub fn get_items_matching(&self, query: &Query) -> Result<ResultSet> {
        self.store.borrow().run_query(query)
    }

    pub fn can_query(&self) -> bool {
        self.store.borrow().can_query()
    }

    pub fn can_persist(&self) -> bool {
        self.store.borrow().can_persist()
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.store.borrow().last_modified()
    }

    /// Persist an entry if it is dirty, then announce it.
    ///
    /// Saving a clean entry does nothing. A save requested from inside a
    /// running save (typically from an event handler) is ignored.
    pub fn save_item(&self, entry: &mut LexEntry) -> Result<()> {
        let Some(_guard) = SaveGuard::acquire(&self.saving) else {
            debug!(
                "Ignoring re-entrant save of entry {}",
                entry.repository_id()
            );
            return Ok(());
        };

        if !entry.is_dirty() {
            return Ok(());
        }

        self.store.borrow_mut().save_item(entry)?;
        self.caches.borrow_mut().update_item_in_caches(entry);
        entry.clean();

        self.events.emit(&EntryEvent::modified(entry.display_label()));
        Ok(())
    }

    /// Persist the dirty entries among `entries` in one store call.
    ///
    /// No events are emitted.
    pub fn save_items(&self, entries: &mut [LexEntry]) -> Result<()> {
        let dirty: Vec<LexEntry> = entries.iter().filter(|e| e.is_dirty()).cloned().collect();
        if dirty.is_empty() {
            return Ok(());
        }

        self.store.borrow_mut().save_items(&dirty)?;
        {
            let mut caches = self.caches.borrow_mut();
            for entry in &dirty {
                caches.update_item_in_caches(entry);
            }
        }
        for entry in entries.iter_mut().filter(|e| e.is_dirty()) {
            entry.clean();
        }
        debug!("Saved {} entries", dirty.len());
        Ok(())
    }

    pub fn delete_item(&self, entry: &LexEntry) -> Result<()> {
        let id = self.get_id(entry)?;
        self.delete(id, entry.display_label())
    }

    /// Delete by id without loading the entry. The event label is `"?"`.
    pub fn delete_item_by_id(&self, id: RepositoryId) -> Result<()> {
        if !self.store.borrow().contains(id) {
            return Err(LexiconError::NotFound(format!(
                "entry {id} is not in the repository"
            )));
        }
        self.delete(id, UNKNOWN_LABEL)
    }

    fn delete(&self, id: RepositoryId, label: &str) -> Result<()> {
        self.store.borrow_mut().delete_item(id)?;
        self.caches.borrow_mut().delete_item_from_caches(id);
        self.events.emit(&EntryEvent::deleted(label));
        Ok(())
    }

    pub fn delete_all_items(&self) -> Result<()> {
        self.store.borrow_mut().delete_all_items()?;
        self.caches.borrow_mut().delete_all_items_from_caches();
        Ok(())
    }

    /// Push the current state of an unsaved entry into the cached views.
    pub fn notify_that_lex_entry_has_been_updated(&self, entry: &LexEntry) -> Result<()> {
        self.get_id(entry)?;
        self.caches.borrow_mut().update_item_in_caches(entry);
        Ok(())
    }

    // Events

    /// Register a handler called synchronously after every save and delete.
    pub fn on_entry_event(&self, handler: impl Fn(&EntryEvent) + 'static) {
        self.events.on_entry_event(handler);
    }

    /// Open a channel receiving every later event.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EntryEvent> {
        self.events.subscribe()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.borrow().stats()
    }

    // Sorted views

    /// Run `f` on the live cache of `query`, installing it on a miss.
    fn with_cache<R>(&self, query: &Query, f: impl FnOnce(&mut dyn CacheHandle) -> R) -> Result<R> {
        let label = query.label();
        let cached = self.caches.borrow().get(&label).is_some();
        if !cached {
            debug!("Cache miss for {label}");
            let results = self.store.borrow().run_query(query)?;
            self.caches.borrow_mut().add(query.clone(), results);
        }

        let mut caches = self.caches.borrow_mut();
        let cache = caches
            .get_mut(&label)
            .ok_or_else(|| LexiconError::NotFound(format!("no cache for {label}")))?;
        Ok(f(cache))
    }

    fn cached_results(&self, query: &Query) -> Result<ResultSet> {
        self.with_cache(query, |cache| cache.result_set().clone())
    }

    /// Every entry, sorted by headword, with homograph numbers.
    ///
    /// Rows carry `Form`, `WritingSystem`, `HasHomograph` and
    /// `HomographNumber`. Entries without a headword come first with
    /// `HasHomograph = false` and `HomographNumber = 0`.
    pub fn get_all_entries_sorted_by_headword(&self, ws: &WritingSystem) -> Result<ResultSet> {
        ws.validate()?;
        self.with_cache(&Query::headword(ws), |cache| {
            number_homographs(cache.result_set_mut().tokens_mut());
            cache.result_set().clone()
        })
    }

    /// The homograph number of an entry, or 0 if its headword is unique.
    pub fn get_homograph_number(&self, entry: &LexEntry, ws: &WritingSystem) -> Result<u32> {
        let results = self.get_all_entries_sorted_by_headword(ws)?;
        let token = results.find_first(entry).ok_or_else(|| {
            LexiconError::NotFound(format!(
                "entry {} is missing from the headword view",
                entry.repository_id()
            ))
        })?;

        if token[HAS_HOMOGRAPH].as_bool() != Some(true) {
            return Ok(0);
        }
        Ok(token[HOMOGRAPH_NUMBER]
            .as_int()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0))
    }

    pub fn get_all_entries_sorted_by_lexical_form(&self, ws: &WritingSystem) -> Result<ResultSet> {
        ws.validate()?;
        self.cached_results(&Query::lexical_form(ws))
    }

    /// Sorted by lexical form, falling back to the first alternative in any
    /// writing system. `WritingSystem` names the one used.
    pub fn get_all_entries_sorted_by_lexical_form_or_alternative(
        &self,
        ws: &WritingSystem,
    ) -> Result<ResultSet> {
        ws.validate()?;
        self.cached_results(&Query::lexical_form_or_alternative(ws))
    }

    /// One `Form` row per distinct definition or gloss of each entry.
    pub fn get_all_entries_sorted_by_definition_or_gloss(
        &self,
        ws: &WritingSystem,
    ) -> Result<ResultSet> {
        ws.validate()?;
        self.cached_results(&Query::definition_or_gloss(ws))
    }

    /// One row per semantic domain. Entries without domains are left out.
    pub fn get_entries_with_semantic_domain_sorted_by_semantic_domain(&self) -> Result<ResultSet> {
        self.cached_results(&Query::semantic_domain())
    }

    /// Entries having a gloss exactly equal to `gloss`, sorted by lexical
    /// form in `ws`.
    pub fn get_entries_with_matching_gloss_sorted_by_lexical_form(
        &self,
        gloss: &LanguageForm,
        ws: &WritingSystem,
    ) -> Result<ResultSet> {
        if gloss.form.is_empty() {
            return Err(LexiconError::InvalidArgument(
                "gloss form should not be empty".to_string(),
            ));
        }
        ws.validate()?;

        let results = self.cached_results(&Query::lexical_forms_with_glosses(ws))?;
        Ok(results.filter(|token| {
            token.text(GLOSS) == Some(gloss.form.as_str())
                && token.text(GLOSS_WRITING_SYSTEM) == Some(gloss.writing_system_id.as_str())
        }))
    }

    /// Entries whose lexical form in `ws` is exactly `lexical_form`.
    pub fn get_entries_with_matching_lexical_form(
        &self,
        lexical_form: &str,
        ws: &WritingSystem,
    ) -> Result<ResultSet> {
        let results = self.get_all_entries_sorted_by_lexical_form(ws)?;
        Ok(results.filter(|token| token.text(FORM) == Some(lexical_form)))
    }

    /// Entries whose lexical form in `ws` is closest to `lexical_form`.
    pub fn get_entries_with_similar_lexical_form(
        &self,
        lexical_form: &str,
        ws: &WritingSystem,
        options: MatchOptions,
    ) -> Result<ResultSet> {
        let results = self.get_all_entries_sorted_by_lexical_form(ws)?;
        Ok(find_closest_forms(
            results,
            |token: &RecordToken| token.text(FORM),
            lexical_form,
            options,
        )
        .into_iter()
        .collect())
    }

    /// The entry with the given LIFT id.
    pub fn get_lex_entry_with_matching_id(&self, id: &str) -> Result<Option<LexEntry>> {
        if id.is_empty() {
            return Err(LexiconError::InvalidArgument(
                "id should not be empty".to_string(),
            ));
        }
        let results = self.cached_results(&Query::id())?;
        let matches = results.filter(|token| token.text(ID) == Some(id));
        self.single_entry(&matches, || format!("id {id}"))
    }

    /// The entry with the given guid.
    pub fn get_lex_entry_with_matching_guid(&self, guid: Uuid) -> Result<Option<LexEntry>> {
        if guid.is_nil() {
            return Err(LexiconError::InvalidArgument(
                "guid should not be nil".to_string(),
            ));
        }
        let results = self.cached_results(&Query::guid())?;
        let matches = results.filter(|token| token[GUID].as_guid() == Some(guid));
        self.single_entry(&matches, || format!("guid {guid}"))
    }

    fn single_entry(
        &self,
        matches: &ResultSet,
        describe: impl Fn() -> String,
    ) -> Result<Option<LexEntry>> {
        match matches.tokens() {
            [] => Ok(None),
            [token] => self.get_item(token.repository_id()).map(Some),
            tokens => {
                let what = describe();
                warn!("{} entries share {what}", tokens.len());
                Err(LexiconError::InvariantViolation(format!(
                    "{} entries share {what}",
                    tokens.len()
                )))
            }
        }
    }
}

/// Number runs of identical headwords in rows sorted by headword.
///
/// Rows without a headword get `HasHomograph = false` and number 0. Within a
/// run the rows are numbered from 1; a lone row has `HasHomograph = false`.
fn number_homographs(tokens: &mut [RecordToken]) {
    let mut previous: Option<(usize, String)> = None;
    let mut number: i64 = 0;

    for index in 0..tokens.len() {
        let Some(form) = tokens[index].text(FORM).map(str::to_string) else {
            tokens[index].set(HAS_HOMOGRAPH, false);
            tokens[index].set(HOMOGRAPH_NUMBER, 0_i64);
            continue;
        };

        match &previous {
            Some((previous_index, previous_form)) if *previous_form == form => {
                number += 1;
                tokens[*previous_index].set(HAS_HOMOGRAPH, true);
                tokens[index].set(HAS_HOMOGRAPH, true);
            }
            _ => {
                number = 1;
                tokens[index].set(HAS_HOMOGRAPH, false);
            }
        }
        tokens[index].set(HOMOGRAPH_NUMBER, number);
        previous = Some((index, form));
    }
}
