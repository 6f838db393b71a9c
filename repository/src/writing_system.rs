//! Writing systems as seen by the repository.
//!
//! The repository only needs two things from a writing system: a stable
//! identifier used to pick forms out of a `MultiText`, and a deterministic
//! ordering of text written in it.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{LexiconError, Result};

/// How text in a writing system is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortRules {
    /// Compare code point by code point.
    #[default]
    Ordinal,

    /// Compare lowercased text, falling back to ordinal order on ties.
    CaseInsensitive,
}

/// A writing system definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WritingSystem {
    /// Language tag, e.g. `"en"` or `"qaa-x-vernacular"`.
    pub id: String,

    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Ordering used when sorting forms in this writing system.
    #[serde(default)]
    pub sort_rules: SortRules,
}

impl WritingSystem {
    /// Create a writing system with ordinal sorting.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            sort_rules: SortRules::default(),
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the sort rules.
    pub fn with_sort_rules(mut self, sort_rules: SortRules) -> Self {
        self.sort_rules = sort_rules;
        self
    }

    /// The name to show for this writing system.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// The key text is sorted by.
    pub fn sort_key<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.sort_rules {
            SortRules::Ordinal => Cow::Borrowed(text),
            SortRules::CaseInsensitive => Cow::Owned(text.to_lowercase()),
        }
    }

    /// Compare two strings according to this writing system.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.sort_key(a)
            .cmp(&self.sort_key(b))
            .then_with(|| a.cmp(b))
    }

    /// Reject writing systems without an identifier.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LexiconError::InvalidArgument(
                "writing system id should not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
