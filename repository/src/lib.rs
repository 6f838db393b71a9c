//! # Lexicon Repository
//!
//! Cached, sorted views over a mutable collection of lexical entries.
//!
//! - **Entries**: multilingual lexical forms, citation forms and senses
//! - **Queries**: composable projections of entries into sorted rows
//! - **Live Caches**: query results patched in place on every write
//! - **Homographs**: numbering of identical headwords in headword order
//! - **Events**: synchronous handlers and channel subscribers for changes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      LexEntryRepository                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  caller ──► get_all_entries_sorted_by_* ──► Query ──► label     │
//! │                                                 │               │
//! │                                                 ▼               │
//! │  EntryStore::run_query ◄── miss ── ResultSetCacheManager        │
//! │                                                 ▲               │
//! │  create / save / delete ──► EntryStore ─────────┘ patch         │
//! │          │                                                      │
//! │          ▼                                                      │
//! │      EventBus ──► handlers, channel subscribers                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod file_store;
pub mod query;
pub mod repository;
pub mod result_set;
pub mod store;
pub mod writing_system;

pub use cache::{CacheHandle, CacheStats, ResultSetCache, ResultSetCacheManager};
pub use config::LexiconConfig;
pub use entry::{
    EntryMetadata, LanguageForm, LexEntry, LexSense, MultiText, RepositoryId, UNKNOWN_LABEL,
};
pub use error::{LexiconError, Result, StorageError};
pub use events::{EntryEvent, EntryEventHandler, EntryEventKind, EventBus};
pub use file_store::JsonFileEntryStore;
pub use query::{Coverage, FieldQuery, KeyMap, Query};
pub use repository::LexEntryRepository;
pub use result_set::{FieldValue, RecordToken, ResultSet};
pub use store::{EntryStore, MemoryEntryStore};
pub use writing_system::{SortRules, WritingSystem};

pub use lexicon_matcher::MatchOptions;
