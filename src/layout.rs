//! Existing knowledge-base layout.
//!
//! A snapshot of what is already under the output root: product folders,
//! client folders with their topic files, and document folders. It is
//! rendered into prompts so the model reuses existing spellings, and used by
//! the quality gate to canonicalize discovered entity names.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::frontmatter::{read_field, SOURCE_MODIFIED_FIELD};

const PRODUCTS_DIR: &str = "Products";
const CLIENTS_DIR: &str = "Clients";
const DOCUMENTS_DIR: &str = "Documents";

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseLayout {
    root: PathBuf,
    products: Vec<String>,
    clients: Vec<ClientFolder>,
    documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFolder {
    pub name: String,
    pub files: Vec<String>,
}

/// One markdown article found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    /// Path relative to the root, `/`-separated.
    pub path: String,
    pub title: Option<String>,
    /// Raw `source_document_modified` value, as stored.
    pub source_modified: Option<String>,
}

impl KnowledgeBaseLayout {
    /// Scan `root`. A missing root is an empty layout.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut layout = KnowledgeBaseLayout {
            root: root.to_path_buf(),
            ..Default::default()
        };
        if !root.is_dir() {
            return Ok(layout);
        }
        layout.products = subdirs(&root.join(PRODUCTS_DIR))?;
        layout.documents = subdirs(&root.join(DOCUMENTS_DIR))?;
        for name in subdirs(&root.join(CLIENTS_DIR))? {
            let dir = root.join(CLIENTS_DIR).join(&name);
            let mut files = Vec::new();
            for entry in std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?
            {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    files.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            files.sort();
            layout.clients.push(ClientFolder { name, files });
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn clients(&self) -> &[ClientFolder] {
        &self.clients
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.clients.is_empty() && self.documents.is_empty()
    }

    /// Names an extracted entity may be canonicalized to.
    pub fn known_entities(&self) -> Vec<String> {
        self.products
            .iter()
            .cloned()
            .chain(self.clients.iter().map(|c| c.name.clone()))
            .collect()
    }

    /// Plain-text summary for prompts.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "EXISTING KNOWLEDGE BASE STRUCTURE: Empty (this is the first document)"
                .to_string();
        }
        let mut lines = vec!["EXISTING KNOWLEDGE BASE STRUCTURE:".to_string()];
        if !self.products.is_empty() {
            lines.push("\nProducts:".to_string());
            for p in &self.products {
                lines.push(format!("  - {}", p));
            }
        }
        if !self.clients.is_empty() {
            lines.push("\nClients:".to_string());
            for c in &self.clients {
                lines.push(format!("  - {}", c.name));
                if !c.files.is_empty() {
                    lines.push(format!("      Files: {}", c.files.join(", ")));
                }
            }
        }
        if !self.documents.is_empty() {
            lines.push("\nDocuments:".to_string());
            for d in &self.documents {
                lines.push(format!("  - {}", d));
            }
        }
        lines.join("\n")
    }

    /// Every article under the root with its stored source timestamp.
    pub fn articles(&self) -> Result<Vec<ArticleSummary>> {
        let mut out = Vec::new();
        if !self.root.is_dir() {
            return Ok(out);
        }
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            let rel = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            out.push(ArticleSummary {
                path: rel,
                title: read_field(&content, "title"),
                source_modified: read_field(&content, SOURCE_MODIFIED_FIELD),
            });
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

fn subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.is_dir() {
        return Ok(names);
    }
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}
