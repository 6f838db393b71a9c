//! Query results: rows of named fields pointing back at their entries.

use std::collections::BTreeMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entry::RepositoryId;

/// A single field value of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// The entry has no value for this field.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Guid(Uuid),
}

static NULL: FieldValue = FieldValue::Null;

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Self::Guid(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(text: Option<&str>) -> Self {
        text.map_or(Self::Null, Self::from)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

/// One row of a query result.
///
/// The token refers to its entry by id only; the entry itself stays owned by
/// the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordToken {
    repository_id: RepositoryId,
    fields: BTreeMap<String, FieldValue>,
}

impl RecordToken {
    /// Create a row without fields.
    pub fn new(repository_id: RepositoryId) -> Self {
        Self {
            repository_id,
            fields: BTreeMap::new(),
        }
    }

    /// Builder form of [`RecordToken::set`].
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// The entry this row was derived from.
    pub fn repository_id(&self) -> RepositoryId {
        self.repository_id
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text value of a field, if the field holds text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut BTreeMap<String, FieldValue> {
        &mut self.fields
    }

    /// Whether both rows carry the same field values.
    pub fn row_eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Index<&str> for RecordToken {
    type Output = FieldValue;

    /// Missing fields read as [`FieldValue::Null`].
    fn index(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&NULL)
    }
}

/// An ordered sequence of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    tokens: Vec<RecordToken>,
}

impl ResultSet {
    pub fn new(tokens: Vec<RecordToken>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RecordToken> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordToken> {
        self.tokens.iter()
    }

    pub fn tokens(&self) -> &[RecordToken] {
        &self.tokens
    }

    pub(crate) fn tokens_mut(&mut self) -> &mut Vec<RecordToken> {
        &mut self.tokens
    }

    pub fn into_tokens(self) -> Vec<RecordToken> {
        self.tokens
    }

    /// The first row derived from the given entry.
    pub fn find_first(&self, entry: impl Into<RepositoryId>) -> Option<&RecordToken> {
        let id = entry.into();
        self.tokens.iter().find(|t| t.repository_id == id)
    }

    /// Position of the first row derived from the given entry.
    pub fn find_first_index(&self, entry: impl Into<RepositoryId>) -> Option<usize> {
        let id = entry.into();
        self.tokens.iter().position(|t| t.repository_id == id)
    }

    /// All rows derived from the given entry, in order.
    pub fn rows_for(&self, entry: impl Into<RepositoryId>) -> Vec<&RecordToken> {
        let id = entry.into();
        self.tokens
            .iter()
            .filter(|t| t.repository_id == id)
            .collect()
    }

    /// Keep the rows matching a predicate, preserving order.
    pub fn filter(&self, predicate: impl Fn(&RecordToken) -> bool) -> ResultSet {
        self.tokens
            .iter()
            .filter(|t| predicate(t))
            .cloned()
            .collect()
    }

    /// Entry ids in row order (repeated for multi-row entries).
    pub fn repository_ids(&self) -> Vec<RepositoryId> {
        self.tokens.iter().map(RecordToken::repository_id).collect()
    }
}

impl FromIterator<RecordToken> for ResultSet {
    fn from_iter<I: IntoIterator<Item = RecordToken>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ResultSet {
    type Item = RecordToken;
    type IntoIter = std::vec::IntoIter<RecordToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a RecordToken;
    type IntoIter = std::slice::Iter<'a, RecordToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
