//! Markdown article writer.
//!
//! Renders front matter and body, writes the file at the path derived from
//! the article key, and records the write in the sidecar index. The stored
//! `source_document_modified` never decreases for a key: a rewrite from an
//! older document (forced, or because the stored value could not be read)
//! keeps the later instant.

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::frontmatter::{FrontMatter, SOURCE_MODIFIED_FIELD};
use crate::index::{ArticleIndex, IndexEntry};
use crate::models::{format_timestamp, ArticleKey, ArticleKind, SourceDocumentMetadata};

/// Everything needed to write one article.
#[derive(Debug, Clone)]
pub struct Article<'a> {
    pub key: ArticleKey,
    pub title: String,
    pub body: String,
    pub source: &'a SourceDocumentMetadata,
    /// File name of the source document.
    pub source_file: String,
    /// Reference-material category (document guides only).
    pub category: Option<String>,
    pub tags: Vec<String>,
}

pub struct MarkdownWriter {
    root: PathBuf,
    index: ArticleIndex,
}

impl MarkdownWriter {
    /// Writer for the knowledge base at `root`; loads its index.
    pub fn open(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            index: ArticleIndex::load(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &ArticleIndex {
        &self.index
    }

    /// Absolute path of the article for `key`.
    pub fn path_for(&self, key: &ArticleKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Write `article`, overwriting any previous file for its key.
    ///
    /// `previous` is the instant recorded for the existing article, if any.
    pub fn write(
        &mut self,
        article: &Article<'_>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<PathBuf> {
        let now = Utc::now().trunc_subsecs(0);
        let stored = match (article.source.modified_at, previous) {
            (Some(new), Some(prev)) => Some(new.max(prev)),
            (new, prev) => new.or(prev),
        };

        let content = render(article, stored, now);
        let path = self.path_for(&article.key);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(article = %article.key, path = %path.display(), "article written");

        let rel = article
            .key
            .relative_path()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        self.index.record(
            &article.key,
            IndexEntry {
                path: rel,
                source_document_modified: stored,
                source_document: article.source_file.clone(),
                date_updated: now,
            },
        )?;
        Ok(path)
    }
}

/// Full file content for an article.
pub fn render(article: &Article<'_>, stored: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let key = &article.key;
    let source = article.source;

    let mut fm = FrontMatter::new();
    fm.set("title", article.title.as_str())
        .set("type", key.kind.label());
    match key.kind {
        ArticleKind::ProductKnowledge => {
            fm.set("product", key.entity.as_str());
        }
        ArticleKind::ClientInfo => {
            fm.set("client", key.entity.as_str())
                .set_opt("topic", key.topic.as_deref());
        }
        ArticleKind::Overview | ArticleKind::Chapter | ArticleKind::BestPractices => {
            fm.set("document", key.entity.as_str());
        }
    }
    fm.set("date_updated", format_timestamp(&now))
        .set_opt("source_document_author", source.author.as_deref())
        .set_opt(SOURCE_MODIFIED_FIELD, stored.as_ref().map(format_timestamp))
        .set("source_document_title", source.title.as_str());
    if key.kind.is_reference_material() {
        fm.set("category", article.category.as_deref().unwrap_or("General"))
            .set("source_document", article.source_file.as_str())
            .set("date_extracted", now.format("%Y-%m-%d").to_string())
            .set_list("tags", article.tags.clone());
    }

    format!(
        "{}# {}\n\n{}\n",
        fm.render(),
        article.title,
        article.body.trim()
    )
}
