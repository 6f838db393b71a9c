//! Configuration for opening a file-backed lexicon.

use std::fs;
use std::path::{Path, PathBuf};

use lexicon_matcher::MatchOptions;
use serde::{Deserialize, Serialize};

use crate::error::{LexiconError, Result, StorageError};
use crate::writing_system::WritingSystem;

/// Configuration for a lexicon repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LexiconConfig {
    /// JSON snapshot holding the entries.
    pub data_path: PathBuf,

    /// Writing system exposed as `LexEntryRepository::default_writing_system`.
    pub default_writing_system: WritingSystem,

    /// Similar-form options exposed as `LexEntryRepository::match_options`.
    pub matcher: MatchOptions,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("lexicon/entries.json"))
    }
}

impl LexiconConfig {
    /// Create a configuration storing entries at `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            default_writing_system: WritingSystem::new("en"),
            matcher: MatchOptions::default(),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| StorageError::ReadFile(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn with_data_path(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.data_path = data_path.into();
        self
    }

    pub fn with_default_writing_system(mut self, writing_system: WritingSystem) -> Self {
        self.default_writing_system = writing_system;
        self
    }

    pub fn with_matcher(mut self, options: MatchOptions) -> Self {
        self.matcher = options;
        self
    }

    /// Check values serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(LexiconError::Config("data_path should not be empty".to_string()));
        }
        self.default_writing_system
            .validate()
            .map_err(|e| LexiconError::Config(format!("default_writing_system: {e}")))
    }
}
