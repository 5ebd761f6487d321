//! Sidecar index of processed articles.
//!
//! `.docwiki/index.json` under the knowledge-base root maps each article key
//! to the source modification instant it was last generated from. The change
//! detector consults it before falling back to an article's front matter.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::ArticleKey;

const INDEX_DIR: &str = ".docwiki";
const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Article path relative to the knowledge-base root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_modified: Option<DateTime<Utc>>,
    pub source_document: String,
    pub date_updated: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ArticleIndex {
    #[serde(default)]
    articles: BTreeMap<String, IndexEntry>,
    #[serde(skip)]
    location: PathBuf,
}

impl ArticleIndex {
    /// Location of the index for a knowledge-base root.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(INDEX_DIR).join(INDEX_FILE)
    }

    /// Load the index; a missing or corrupt file yields an empty index.
    ///
    /// A corrupt index only costs reprocessing (front matter is the fallback),
    /// so it is logged rather than treated as fatal.
    pub fn load(root: &Path) -> Self {
        let location = Self::path_for(root);
        let mut index = match std::fs::read_to_string(&location) {
            Ok(text) => match serde_json::from_str::<ArticleIndex>(&text) {
                Ok(index) => index,
                Err(e) => {
                    warn!(path = %location.display(), error = %e, "ignoring unreadable article index");
                    ArticleIndex::default()
                }
            },
            Err(_) => ArticleIndex::default(),
        };
        index.location = location;
        index
    }

    pub fn get(&self, key: &ArticleKey) -> Option<&IndexEntry> {
        self.articles.get(&key.index_key())
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Source document of any recorded article under `dir`, a `/`-separated
    /// path relative to the root.
    pub fn source_under(&self, dir: &str) -> Option<&str> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.articles
            .values()
            .find(|entry| entry.path.starts_with(&prefix))
            .map(|entry| entry.source_document.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.articles.iter()
    }

    /// Record an entry and persist the index (temp file + rename).
    pub fn record(&mut self, key: &ArticleKey, entry: IndexEntry) -> Result<()> {
        self.articles.insert(key.index_key(), entry);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(dir) = self.location.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let tmp = self.location.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.location)
            .with_context(|| format!("Failed to replace {}", self.location.display()))?;
        Ok(())
    }
}
