//! Lexical entries and their multilingual content.
//!
//! A `LexEntry` is one record of the lexicon. Every content mutator marks
//! the entry dirty; the repository persists dirty entries and cleans them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label used when an entry has no lexical form to show.
pub const UNKNOWN_LABEL: &str = "?";

/// Stable identity of an entry within a store.
///
/// Ids are assigned by the store in creation order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(u64);

impl RepositoryId {
    /// Wrap a raw id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<&LexEntry> for RepositoryId {
    fn from(entry: &LexEntry) -> Self {
        entry.repository_id
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A form in one writing system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageForm {
    /// Writing system the form is written in.
    pub writing_system_id: String,

    /// The text.
    pub form: String,
}

impl LanguageForm {
    pub fn new(writing_system_id: impl Into<String>, form: impl Into<String>) -> Self {
        Self {
            writing_system_id: writing_system_id.into(),
            form: form.into(),
        }
    }
}

/// Text with one alternative per writing system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiText {
    forms: Vec<LanguageForm>,
}

impl MultiText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MultiText::set`].
    pub fn with(mut self, writing_system_id: &str, form: impl Into<String>) -> Self {
        self.set(writing_system_id, form);
        self
    }

    /// The non-empty form in a writing system.
    pub fn get(&self, writing_system_id: &str) -> Option<&str> {
        self.forms
            .iter()
            .find(|f| f.writing_system_id == writing_system_id)
            .map(|f| f.form.as_str())
            .filter(|form| !form.is_empty())
    }

    /// Set the form for a writing system. An empty form removes it.
    pub fn set(&mut self, writing_system_id: &str, form: impl Into<String>) {
        let form = form.into();
        if form.is_empty() {
            self.forms.retain(|f| f.writing_system_id != writing_system_id);
            return;
        }
        match self
            .forms
            .iter_mut()
            .find(|f| f.writing_system_id == writing_system_id)
        {
            Some(existing) => existing.form = form,
            None => self.forms.push(LanguageForm::new(writing_system_id, form)),
        }
    }

    /// The first non-empty alternative, in insertion order.
    pub fn first_alternative(&self) -> Option<&LanguageForm> {
        self.forms.iter().find(|f| !f.form.is_empty())
    }

    /// Iterate over all alternatives.
    pub fn iter(&self) -> impl Iterator<Item = &LanguageForm> {
        self.forms.iter().filter(|f| !f.form.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.first_alternative().is_none()
    }
}

/// One sense of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexSense {
    /// Short translation equivalents.
    #[serde(default)]
    pub gloss: MultiText,

    /// Full definitions.
    #[serde(default)]
    pub definition: MultiText,

    /// Semantic domain tags, e.g. `"1.1 Sky"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_domains: Vec<String>,
}

impl LexSense {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gloss(mut self, writing_system_id: &str, gloss: impl Into<String>) -> Self {
        self.gloss.set(writing_system_id, gloss);
        self
    }

    pub fn with_definition(
        mut self,
        writing_system_id: &str,
        definition: impl Into<String>,
    ) -> Self {
        self.definition.set(writing_system_id, definition);
        self
    }

    pub fn with_semantic_domain(mut self, domain: impl Into<String>) -> Self {
        self.semantic_domains.push(domain.into());
        self
    }
}

/// Timestamps of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// When the entry was created.
    pub created: DateTime<Utc>,

    /// When the entry content last changed.
    pub last_updated: DateTime<Utc>,
}

/// A lexicon entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexEntry {
    repository_id: RepositoryId,

    /// LIFT-style identifier, unique within a lexicon when non-empty.
    #[serde(default)]
    id: String,

    guid: Uuid,

    #[serde(default)]
    lexical_form: MultiText,

    #[serde(default)]
    citation_form: MultiText,

    #[serde(default)]
    senses: Vec<LexSense>,

    metadata: EntryMetadata,

    /// Never persisted; loaded entries start clean.
    #[serde(skip)]
    dirty: bool,
}

impl LexEntry {
    /// Create a new, dirty entry with a fresh guid.
    pub fn new(repository_id: RepositoryId) -> Self {
        let now = Utc::now();
        Self {
            repository_id,
            id: String::new(),
            guid: Uuid::new_v4(),
            lexical_form: MultiText::new(),
            citation_form: MultiText::new(),
            senses: Vec::new(),
            metadata: EntryMetadata {
                created: now,
                last_updated: now,
            },
            dirty: true,
        }
    }

    pub fn repository_id(&self) -> RepositoryId {
        self.repository_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn lexical_form(&self) -> &MultiText {
        &self.lexical_form
    }

    pub fn citation_form(&self) -> &MultiText {
        &self.citation_form
    }

    pub fn senses(&self) -> &[LexSense] {
        &self.senses
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// The citation form in a writing system, else the lexical form.
    pub fn headword(&self, writing_system_id: &str) -> Option<&str> {
        self.citation_form
            .get(writing_system_id)
            .or_else(|| self.lexical_form.get(writing_system_id))
    }

    /// Human-readable label: the first lexical form alternative.
    pub fn display_label(&self) -> &str {
        self.lexical_form
            .first_alternative()
            .map_or(UNKNOWN_LABEL, |f| f.form.as_str())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
        self.touch();
    }

    pub fn set_guid(&mut self, guid: Uuid) {
        self.guid = guid;
        self.touch();
    }

    pub fn set_lexical_form(&mut self, writing_system_id: &str, form: impl Into<String>) {
        self.lexical_form.set(writing_system_id, form);
        self.touch();
    }

    pub fn set_citation_form(&mut self, writing_system_id: &str, form: impl Into<String>) {
        self.citation_form.set(writing_system_id, form);
        self.touch();
    }

    pub fn add_sense(&mut self, sense: LexSense) {
        self.senses.push(sense);
        self.touch();
    }

    /// Mutable access to the senses. Marks the entry dirty.
    pub fn senses_mut(&mut self) -> &mut Vec<LexSense> {
        self.touch();
        &mut self.senses
    }

    /// Record a modification.
    pub fn touch(&mut self) {
        self.metadata.last_updated = Utc::now();
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the entry as persisted.
    pub fn clean(&mut self) {
        self.dirty = false;
    }
}
