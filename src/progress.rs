//! Build progress reporting.
//!
//! Reports what `docwiki build` does with each document and article: which
//! document is being read, which articles are skipped and why, which are
//! written, and which extractions failed. Progress is emitted on **stderr**
//! so stdout keeps only the run summary.

use std::io::Write;
use std::path::PathBuf;

/// A single progress event of a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Document `n` of `total` is being read.
    Document { file: String, n: u64, total: u64 },
    /// Entities accepted by discovery for the current document.
    Discovered {
        file: String,
        products: Vec<String>,
        client: Option<String>,
    },
    /// The change detector found the article current; no request was made.
    UpToDate { article: String, notice: String },
    /// The quality gate discarded a result.
    Rejected { article: String, reason: String },
    /// An article was written.
    Written { article: String, path: PathBuf },
    /// The extraction request for an article failed.
    ExtractionFailed { article: String, error: String },
    /// The document could not be read or analyzed.
    DocumentFailed { file: String, error: String },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the pipeline.
    fn report(&self, event: PipelineEvent);
}

/// One human-readable line for an event, without trailing newline.
pub fn human_line(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::Document { file, n, total } => format!("[{}/{}] {}", n, total, file),
        PipelineEvent::Discovered {
            products, client, ..
        } => format!(
            "  found  {} product(s){}",
            products.len(),
            client
                .as_deref()
                .map(|c| format!(", client {}", c))
                .unwrap_or_default()
        ),
        PipelineEvent::UpToDate { notice, .. } => format!("  skip   {}", notice),
        PipelineEvent::Rejected { article, reason } => {
            format!("  skip   {}: {}", article, reason)
        }
        PipelineEvent::Written { path, .. } => format!("  wrote  {}", path.display()),
        PipelineEvent::ExtractionFailed { article, error } => {
            format!("  error  {}: extraction failed: {}", article, error)
        }
        PipelineEvent::DocumentFailed { file, error } => {
            format!("  error  {}: {}", file, error)
        }
    }
}

/// JSON form of an event, as written by [`ProgressMode::Json`].
pub fn json_event(event: &PipelineEvent) -> serde_json::Value {
    match event {
        PipelineEvent::Document { file, n, total } => serde_json::json!({
            "event": "document",
            "file": file,
            "n": n,
            "total": total
        }),
        PipelineEvent::Discovered {
            file,
            products,
            client,
        } => serde_json::json!({
            "event": "discovered",
            "file": file,
            "products": products,
            "client": client
        }),
        PipelineEvent::UpToDate { article, notice } => serde_json::json!({
            "event": "skipped",
            "article": article,
            "reason": "up-to-date",
            "notice": notice
        }),
        PipelineEvent::Rejected { article, reason } => serde_json::json!({
            "event": "skipped",
            "article": article,
            "reason": reason
        }),
        PipelineEvent::Written { article, path } => serde_json::json!({
            "event": "written",
            "article": article,
            "path": path.display().to_string()
        }),
        PipelineEvent::ExtractionFailed { article, error } => serde_json::json!({
            "event": "failed",
            "article": article,
            "reason": "extraction failed",
            "error": error
        }),
        PipelineEvent::DocumentFailed { file, error } => serde_json::json!({
            "event": "failed",
            "file": file,
            "error": error
        }),
    }
}

/// How `build` reports progress on stderr.
///
/// `Human` is the default whether or not stderr is a terminal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    #[default]
    Human,
    Json,
}

impl ProgressMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }
}

impl ProgressReporter for ProgressMode {
    fn report(&self, event: PipelineEvent) {
        let line = match self {
            ProgressMode::Off => return,
            ProgressMode::Human => human_line(&event),
            ProgressMode::Json => json_event(&event).to_string(),
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}
