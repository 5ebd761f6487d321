//! Core data models used throughout docwiki.
//!
//! These types represent the documents read from disk, the results returned
//! by the extraction service, and the articles written to the knowledge base.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Core properties of a Word document (`docProps/core.xml`).
///
/// Read once per document and never persisted on its own; selected fields are
/// embedded in the front matter of every article generated from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDocumentMetadata {
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub title: String,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
}

/// One heading-delimited section of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSection {
    /// 1-based position in the outline; 0 is the untitled preamble.
    pub index: usize,
    pub heading: String,
    /// Heading level (1..=9); 0 for the preamble.
    pub level: u8,
    pub content: String,
}

/// A document as returned by a [`DocumentReader`](crate::traits::DocumentReader).
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub path: PathBuf,
    pub metadata: SourceDocumentMetadata,
    pub sections: Vec<DocumentSection>,
    /// Full paragraph text, paragraphs separated by blank lines.
    pub full_text: String,
}

impl ParsedDocument {
    /// File name used in reports and the `source_document` field.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Indented outline of the document headings, one per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for section in self.sections.iter().filter(|s| s.level > 0) {
            let indent = "  ".repeat(section.level.saturating_sub(1) as usize);
            out.push_str(&format!(
                "{}{}. {} (Level {})\n",
                indent, section.index, section.heading, section.level
            ));
        }
        out
    }

    /// Top-level sections (the shallowest heading level present), which become chapters.
    pub fn chapters(&self) -> Vec<&DocumentSection> {
        let top = self
            .sections
            .iter()
            .filter(|s| s.level > 0)
            .map(|s| s.level)
            .min();
        match top {
            Some(level) => self.sections.iter().filter(|s| s.level == level).collect(),
            None => Vec::new(),
        }
    }

    /// A section together with all deeper sections that follow it.
    pub fn chapter_text(&self, chapter: &DocumentSection) -> String {
        let mut out = String::new();
        let mut inside = false;
        for section in &self.sections {
            if section.index == chapter.index {
                inside = true;
            } else if inside && section.level <= chapter.level {
                break;
            }
            if inside {
                out.push_str(&format!("# {}\n\n{}\n\n", section.heading, section.content));
            }
        }
        out.trim_end().to_string()
    }
}

/// Result of one extraction call.
///
/// The "nothing worth writing" signal is a variant, not text: providers map
/// their wire-level marker onto [`ExtractionResult::InsufficientInformation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult<T = String> {
    Content(T),
    InsufficientInformation,
}

impl<T> ExtractionResult<T> {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, ExtractionResult::InsufficientInformation)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExtractionResult<U> {
        match self {
            ExtractionResult::Content(value) => ExtractionResult::Content(f(value)),
            ExtractionResult::InsufficientInformation => ExtractionResult::InsufficientInformation,
        }
    }
}

/// Discovery output for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentAnalysis {
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default, alias = "client")]
    pub client_name: Option<String>,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    #[serde(default = "default_document_category")]
    pub document_category: String,
}

fn default_document_type() -> String {
    "Unknown".to_string()
}

fn default_document_category() -> String {
    "General".to_string()
}

/// A single topic of a client profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientTopic {
    Text(String),
    Items(Vec<String>),
}

impl ClientTopic {
    /// Markdown body for this topic.
    pub fn to_markdown(&self) -> String {
        match self {
            ClientTopic::Text(text) => text.trim().to_string(),
            ClientTopic::Items(items) => items
                .iter()
                .map(|i| i.trim())
                .filter(|i| !i.is_empty())
                .map(|i| format!("- {}", i))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Client information grouped by topic, well-known topics first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProfile {
    pub topics: Vec<(String, ClientTopic)>,
}

/// Topics every client profile is asked for, in output order.
pub const CLIENT_TOPICS: [&str; 5] = ["overview", "locations", "hardware", "configuration", "contacts"];

/// Which document-structure guide to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuideRequest {
    Overview,
    Chapter { heading: String, text: String },
    BestPractices,
}

/// Category of a generated article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArticleKind {
    Overview,
    Chapter,
    BestPractices,
    ProductKnowledge,
    ClientInfo,
}

impl ArticleKind {
    /// Value written to the front-matter `type` field.
    pub fn label(&self) -> &'static str {
        match self {
            ArticleKind::Overview => "Document Overview",
            ArticleKind::Chapter => "Document Chapter",
            ArticleKind::BestPractices => "Best Practices",
            ArticleKind::ProductKnowledge => "Product Overview",
            ArticleKind::ClientInfo => "Client Information",
        }
    }

    /// Document-structure guides carry the reference-material front-matter fields.
    pub fn is_reference_material(&self) -> bool {
        matches!(
            self,
            ArticleKind::Overview | ArticleKind::Chapter | ArticleKind::BestPractices
        )
    }

    fn slug(&self) -> &'static str {
        match self {
            ArticleKind::Overview => "overview",
            ArticleKind::Chapter => "chapter",
            ArticleKind::BestPractices => "best-practices",
            ArticleKind::ProductKnowledge => "product",
            ArticleKind::ClientInfo => "client",
        }
    }
}

/// Identity of one article: at most one file exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleKey {
    pub kind: ArticleKind,
    pub entity: String,
    pub topic: Option<String>,
}

impl ArticleKey {
    pub fn new(kind: ArticleKind, entity: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            topic: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Path of the article relative to the knowledge-base root.
    pub fn relative_path(&self) -> PathBuf {
        let entity = safe_segment(&self.entity);
        let topic = self.topic.as_deref().map(safe_segment);
        match self.kind {
            ArticleKind::Overview => Path::new("Documents").join(entity).join("overview.md"),
            ArticleKind::Chapter => Path::new("Documents")
                .join(entity)
                .join("chapters")
                .join(format!("{}.md", topic.unwrap_or_else(|| "chapter".to_string()))),
            ArticleKind::BestPractices => Path::new("Documents")
                .join(entity)
                .join("best-practices.md"),
            ArticleKind::ProductKnowledge => {
                Path::new("Products").join(entity).join("overview.md")
            }
            ArticleKind::ClientInfo => Path::new("Clients")
                .join(entity)
                .join(format!("{}.md", topic.unwrap_or_else(|| "overview".to_string()))),
        }
    }

    /// Stable string form used as the sidecar index key.
    pub fn index_key(&self) -> String {
        match &self.topic {
            Some(topic) => format!("{}:{}:{}", self.kind.slug(), self.entity, topic),
            None => format!("{}:{}", self.kind.slug(), self.entity),
        }
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.topic {
            Some(topic) => write!(f, "{} / {} ({})", self.entity, topic, self.kind.label()),
            None => write!(f, "{} ({})", self.entity, self.kind.label()),
        }
    }
}

/// Replace characters that are unsafe in file names.
///
/// Alphanumerics, spaces, `-` and `_` are kept; everything else becomes `_`.
pub fn safe_segment(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Lowercase, hyphenated slug for chapter and topic file names.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Parse a stored or document-supplied timestamp into a UTC instant.
///
/// Accepts RFC 3339 (offset-qualified, converted to UTC), naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` or `YYYY-MM-DD HH:MM:SS` (taken as UTC), and
/// bare dates (midnight UTC). Sub-second precision is dropped so that a value
/// survives a round trip through front matter unchanged.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).trunc_subsecs(0));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().trunc_subsecs(0));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format an instant the way it is stored in front matter.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}
