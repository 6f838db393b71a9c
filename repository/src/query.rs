//! Composable queries over lexical entries.
//!
//! A `Query` describes how each entry is projected into rows and how those
//! rows are ordered. Queries are plain values: two equal queries have equal
//! labels and share one cache.
//!
//! ```text
//!   FieldQuery ──► rows per entry ──► sort ──► ResultSet
//!        │
//!        ├── alternative(other, keys)   fall back to `other` when empty
//!        ├── merge(other, keys)         union with `other`
//!        └── strip_duplicates()         drop identical rows of an entry
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::entry::LexEntry;
use crate::result_set::{FieldValue, RecordToken, ResultSet};
use crate::writing_system::{SortRules, WritingSystem};

/// Field names used in rows.
pub mod fields {
    pub const FORM: &str = "Form";
    pub const WRITING_SYSTEM: &str = "WritingSystem";
    pub const GLOSS: &str = "Gloss";
    pub const GLOSS_WRITING_SYSTEM: &str = "GlossWritingSystem";
    pub const SEMANTIC_DOMAIN: &str = "SemanticDomain";
    pub const ID: &str = "Id";
    pub const GUID: &str = "Guid";
    pub const HAS_HOMOGRAPH: &str = "HasHomograph";
    pub const HOMOGRAPH_NUMBER: &str = "HomographNumber";
}

use fields::*;

/// Whether every entry is represented in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Entries lacking the attribute still get one row with a null primary field.
    AtLeastOne,

    /// Only entries with the attribute produce rows.
    MatchingOnly,
}

/// Renaming of row fields used when composing queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyMap(BTreeMap<String, String>);

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping from `from` to `to`.
    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.0.insert(from.into(), to.into());
        self
    }

    /// The name a field is renamed to.
    pub fn map_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.0.get(key).map_or(key, String::as_str)
    }

    /// Rename the fields of a row. Renamed fields win over existing ones.
    fn apply(&self, mut token: RecordToken) -> RecordToken {
        if self.0.is_empty() {
            return token;
        }
        let original = std::mem::take(token.fields_mut());
        let (renamed, kept): (Vec<_>, Vec<_>) = original
            .into_iter()
            .partition(|(key, _)| self.0.contains_key(key));
        let target = token.fields_mut();
        target.extend(kept);
        for (key, value) in renamed {
            target.insert(self.map_key(&key).to_string(), value);
        }
        token
    }
}

impl fmt::Display for KeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.0.iter().map(|(from, to)| format!("{from}->{to}")).collect();
        write!(f, "{{{}}}", pairs.join(","))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        )
    }
}

/// The concrete query kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldQuery {
    /// `Form` = citation form, falling back to lexical form.
    Headword(WritingSystem),

    /// `Form` = lexical form.
    LexicalForm(WritingSystem),

    /// `Form` = lexical form, falling back to its first alternative in any
    /// writing system; `WritingSystem` names the one used.
    LexicalFormOrAlternative(WritingSystem),

    /// One `Form` row per sense definition.
    Definition(WritingSystem),

    /// One `Gloss` row per sense gloss.
    Gloss(WritingSystem),

    /// One row per gloss in any writing system, sorted by lexical form.
    LexicalFormsWithGlosses(WritingSystem),

    /// One row per distinct semantic domain.
    SemanticDomain,

    /// The LIFT id.
    Id,

    /// The entry guid.
    Guid,

    /// Every entry in insertion order, no fields.
    AllEntries,
}

impl FieldQuery {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Headword(_) => "HeadwordQuery",
            Self::LexicalForm(_) => "LexicalFormQuery",
            Self::LexicalFormOrAlternative(_) => "LexicalFormOrAlternativeQuery",
            Self::Definition(_) => "DefinitionQuery",
            Self::Gloss(_) => "GlossQuery",
            Self::LexicalFormsWithGlosses(_) => "LexicalFormsWithGlossesQuery",
            Self::SemanticDomain => "SemanticDomainQuery",
            Self::Id => "IdQuery",
            Self::Guid => "GuidQuery",
            Self::AllEntries => "AllEntriesQuery",
        }
    }

    pub fn writing_system(&self) -> Option<&WritingSystem> {
        match self {
            Self::Headword(ws)
            | Self::LexicalForm(ws)
            | Self::LexicalFormOrAlternative(ws)
            | Self::Definition(ws)
            | Self::Gloss(ws)
            | Self::LexicalFormsWithGlosses(ws) => Some(ws),
            Self::SemanticDomain | Self::Id | Self::Guid | Self::AllEntries => None,
        }
    }

    fn label(&self) -> String {
        match self.writing_system() {
            Some(ws) => match ws.sort_rules {
                SortRules::Ordinal => format!("{}:{}", self.kind_name(), ws.id),
                SortRules::CaseInsensitive => format!("{}:{}~ci", self.kind_name(), ws.id),
            },
            None => self.kind_name().to_string(),
        }
    }

    /// The field rows are sorted by.
    pub fn primary_field(&self) -> Option<&'static str> {
        match self {
            Self::Headword(_)
            | Self::LexicalForm(_)
            | Self::LexicalFormOrAlternative(_)
            | Self::Definition(_)
            | Self::LexicalFormsWithGlosses(_) => Some(FORM),
            Self::Gloss(_) => Some(GLOSS),
            Self::SemanticDomain => Some(SEMANTIC_DOMAIN),
            Self::Id => Some(ID),
            Self::Guid => Some(GUID),
            Self::AllEntries => None,
        }
    }

    pub fn coverage(&self) -> Coverage {
        match self {
            Self::LexicalFormsWithGlosses(_) | Self::SemanticDomain => Coverage::MatchingOnly,
            _ => Coverage::AtLeastOne,
        }
    }

    /// Project one entry into rows.
    fn project(&self, entry: &LexEntry) -> Vec<RecordToken> {
        let row = || RecordToken::new(entry.repository_id());
        let form_row = |field: &str, form: Option<&str>, ws_id: Option<&str>| {
            row()
                .with_field(field, form)
                .with_field(WRITING_SYSTEM, form.and(ws_id))
        };

        match self {
            Self::Headword(ws) => {
                vec![form_row(FORM, entry.headword(&ws.id), Some(ws.id.as_str()))]
            }
            Self::LexicalForm(ws) => {
                vec![form_row(FORM, entry.lexical_form().get(&ws.id), Some(ws.id.as_str()))]
            }
            Self::LexicalFormOrAlternative(ws) => {
                let row = match entry.lexical_form().get(&ws.id) {
                    Some(form) => form_row(FORM, Some(form), Some(ws.id.as_str())),
                    None => {
                        let alternative = entry.lexical_form().first_alternative();
                        form_row(
                            FORM,
                            alternative.map(|f| f.form.as_str()),
                            alternative.map(|f| f.writing_system_id.as_str()),
                        )
                    }
                };
                vec![row]
            }
            Self::Definition(ws) => {
                let rows: Vec<RecordToken> = entry
                    .senses()
                    .iter()
                    .filter_map(|sense| sense.definition.get(&ws.id))
                    .map(|definition| form_row(FORM, Some(definition), Some(ws.id.as_str())))
                    .collect();
                at_least_one(rows, || form_row(FORM, None, None))
            }
            Self::Gloss(ws) => {
                let rows: Vec<RecordToken> = entry
                    .senses()
                    .iter()
                    .filter_map(|sense| sense.gloss.get(&ws.id))
                    .map(|gloss| form_row(GLOSS, Some(gloss), Some(ws.id.as_str())))
                    .collect();
                at_least_one(rows, || form_row(GLOSS, None, None))
            }
            Self::LexicalFormsWithGlosses(ws) => {
                let form = entry.lexical_form().get(&ws.id);
                entry
                    .senses()
                    .iter()
                    .flat_map(|sense| sense.gloss.iter())
                    .map(|gloss| {
                        row()
                            .with_field(FORM, form)
                            .with_field(GLOSS, gloss.form.as_str())
                            .with_field(GLOSS_WRITING_SYSTEM, gloss.writing_system_id.as_str())
                    })
                    .collect()
            }
            Self::SemanticDomain => {
                let mut seen: Vec<&str> = Vec::new();
                for sense in entry.senses() {
                    for domain in &sense.semantic_domains {
                        if !domain.is_empty() && !seen.contains(&domain.as_str()) {
                            seen.push(domain);
                        }
                    }
                }
                seen.into_iter()
                    .map(|domain| row().with_field(SEMANTIC_DOMAIN, domain))
                    .collect()
            }
            Self::Id => {
                let id = Some(entry.id()).filter(|id| !id.is_empty());
                vec![row().with_field(ID, id)]
            }
            Self::Guid => vec![row().with_field(GUID, entry.guid())],
            Self::AllEntries => vec![row()],
        }
    }
}

fn at_least_one(
    rows: Vec<RecordToken>,
    sentinel: impl FnOnce() -> RecordToken,
) -> Vec<RecordToken> {
    if rows.is_empty() { vec![sentinel()] } else { rows }
}

/// A query over lexical entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// A concrete projection.
    Field(FieldQuery),

    /// `primary`, or `fallback` with renamed keys for entries where the
    /// primary field is absent.
    Alternative {
        primary: Box<Query>,
        fallback: Box<Query>,
        key_map: KeyMap,
    },

    /// Rows of `primary` followed by rows of `other` with renamed keys.
    Merge {
        primary: Box<Query>,
        other: Box<Query>,
        key_map: KeyMap,
    },

    /// Rows of the inner query without per-entry duplicates.
    StripDuplicates(Box<Query>),
}

impl From<FieldQuery> for Query {
    fn from(query: FieldQuery) -> Self {
        Self::Field(query)
    }
}

impl Query {
    pub fn headword(ws: &WritingSystem) -> Self {
        FieldQuery::Headword(ws.clone()).into()
    }

    pub fn lexical_form(ws: &WritingSystem) -> Self {
        FieldQuery::LexicalForm(ws.clone()).into()
    }

    pub fn lexical_form_or_alternative(ws: &WritingSystem) -> Self {
        FieldQuery::LexicalFormOrAlternative(ws.clone()).into()
    }

    pub fn definition(ws: &WritingSystem) -> Self {
        FieldQuery::Definition(ws.clone()).into()
    }

    pub fn gloss(ws: &WritingSystem) -> Self {
        FieldQuery::Gloss(ws.clone()).into()
    }

    pub fn lexical_forms_with_glosses(ws: &WritingSystem) -> Self {
        FieldQuery::LexicalFormsWithGlosses(ws.clone()).into()
    }

    pub fn semantic_domain() -> Self {
        FieldQuery::SemanticDomain.into()
    }

    pub fn id() -> Self {
        FieldQuery::Id.into()
    }

    pub fn guid() -> Self {
        FieldQuery::Guid.into()
    }

    pub fn all_entries() -> Self {
        FieldQuery::AllEntries.into()
    }

    /// Definitions, with glosses standing in for missing definitions and
    /// gloss-only entries kept. One `Form` row per distinct value.
    pub fn definition_or_gloss(ws: &WritingSystem) -> Self {
        let definition = Self::definition(ws);
        let gloss = Self::gloss(ws);
        let gloss_to_form = KeyMap::new().with(GLOSS, FORM);
        let form_to_gloss = KeyMap::new().with(FORM, GLOSS);

        let definition_or_gloss = definition
            .clone()
            .alternative(gloss.clone(), gloss_to_form.clone());
        let gloss_or_definition = gloss.alternative(definition, form_to_gloss);
        definition_or_gloss
            .merge(gloss_or_definition, gloss_to_form)
            .strip_duplicates()
    }

    pub fn alternative(self, fallback: Query, key_map: KeyMap) -> Self {
        Self::Alternative {
            primary: Box::new(self),
            fallback: Box::new(fallback),
            key_map,
        }
    }

    pub fn merge(self, other: Query, key_map: KeyMap) -> Self {
        Self::Merge {
            primary: Box::new(self),
            other: Box::new(other),
            key_map,
        }
    }

    pub fn strip_duplicates(self) -> Self {
        Self::StripDuplicates(Box::new(self))
    }

    /// The cache key of this query.
    pub fn label(&self) -> String {
        match self {
            Self::Field(query) => query.label(),
            Self::Alternative {
                primary,
                fallback,
                key_map,
            } => format!("{}.Alternative({}, {key_map})", primary.label(), fallback.label()),
            Self::Merge {
                primary,
                other,
                key_map,
            } => format!("{}.Merge({}, {key_map})", primary.label(), other.label()),
            Self::StripDuplicates(inner) => format!("{}.StripDuplicates()", inner.label()),
        }
    }

    /// The field rows are sorted by.
    pub fn primary_field(&self) -> Option<&'static str> {
        self.sort_query().primary_field()
    }

    pub fn coverage(&self) -> Coverage {
        match self {
            Self::Field(query) => query.coverage(),
            Self::Alternative { primary, .. } => primary.coverage(),
            Self::Merge { primary, other, .. } => {
                if primary.coverage() == Coverage::AtLeastOne
                    || other.coverage() == Coverage::AtLeastOne
                {
                    Coverage::AtLeastOne
                } else {
                    Coverage::MatchingOnly
                }
            }
            Self::StripDuplicates(inner) => inner.coverage(),
        }
    }

    /// The concrete query whose sort definition this query uses.
    fn sort_query(&self) -> &FieldQuery {
        match self {
            Self::Field(query) => query,
            Self::Alternative { primary, .. } | Self::Merge { primary, .. } => primary.sort_query(),
            Self::StripDuplicates(inner) => inner.sort_query(),
        }
    }

    /// Project one entry into rows, unsorted.
    pub fn rows_for(&self, entry: &LexEntry) -> Vec<RecordToken> {
        match self {
            Self::Field(query) => query.project(entry),
            Self::Alternative {
                primary,
                fallback,
                key_map,
            } => {
                let field = primary.primary_field();
                let has_value =
                    |row: &RecordToken| field.is_none_or(|field| !row[field].is_null());

                let primary_rows = primary.rows_for(entry);
                if primary_rows.iter().any(has_value) {
                    return primary_rows.into_iter().filter(has_value).collect();
                }

                let fallback_rows: Vec<RecordToken> = fallback
                    .rows_for(entry)
                    .into_iter()
                    .map(|row| key_map.apply(row))
                    .filter(has_value)
                    .collect();
                if fallback_rows.is_empty() {
                    primary_rows
                } else {
                    fallback_rows
                }
            }
            Self::Merge {
                primary,
                other,
                key_map,
            } => {
                let mut rows = primary.rows_for(entry);
                rows.extend(other.rows_for(entry).into_iter().map(|row| key_map.apply(row)));
                rows
            }
            Self::StripDuplicates(inner) => {
                let mut rows: Vec<RecordToken> = Vec::new();
                for row in inner.rows_for(entry) {
                    if !rows.iter().any(|kept| kept.row_eq(&row)) {
                        rows.push(row);
                    }
                }
                rows
            }
        }
    }

    /// Total order of rows: sort field, then entry, then row content.
    pub fn compare(&self, a: &RecordToken, b: &RecordToken) -> Ordering {
        let sort = self.sort_query();
        let by_field = match sort.primary_field() {
            Some(field) => compare_values(&a[field], &b[field], sort.writing_system()),
            None => Ordering::Equal,
        };
        by_field
            .then_with(|| a.repository_id().cmp(&b.repository_id()))
            .then_with(|| a.fields().cmp(b.fields()))
    }

    /// Where a row belongs in rows already sorted by this query.
    pub fn insertion_point(&self, rows: &[RecordToken], row: &RecordToken) -> usize {
        rows.partition_point(|existing| self.compare(existing, row) == Ordering::Less)
    }

    /// Run the query over a set of entries.
    pub fn execute<'a>(&self, entries: impl IntoIterator<Item = &'a LexEntry>) -> ResultSet {
        let mut rows: Vec<RecordToken> = entries
            .into_iter()
            .flat_map(|entry| self.rows_for(entry))
            .collect();
        rows.sort_by(|a, b| self.compare(a, b));
        ResultSet::new(rows)
    }
}

fn compare_values(a: &FieldValue, b: &FieldValue, ws: Option<&WritingSystem>) -> Ordering {
    match (a, b, ws) {
        (FieldValue::Text(a), FieldValue::Text(b), Some(ws)) => ws.compare(a, b),
        _ => a.cmp(b),
    }
}
