//! Change detection: is an existing article already current?
//!
//! Runs before every extraction call. An article is regenerated only when the
//! source document's `modified` core property is strictly later than the
//! instant recorded for that article. Whenever the answer cannot be
//! determined the detector fails open and asks for reprocessing.
//!
//! The recorded instant comes from the sidecar [`ArticleIndex`] when it has
//! an entry for the key, otherwise from the article's
//! `source_document_modified` front-matter field.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::frontmatter::{read_field, SOURCE_MODIFIED_FIELD};
use crate::index::ArticleIndex;
use crate::models::{format_timestamp, parse_timestamp, ArticleKey, SourceDocumentMetadata};

/// Why an article must be (re)generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessReason {
    NoArticle,
    NoStoredTimestamp,
    UnparsableStoredTimestamp,
    UnreadableArticle,
    NoSourceTimestamp,
    SourceNewer,
    Forced,
}

impl fmt::Display for ProcessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessReason::NoArticle => "no existing article",
            ProcessReason::NoStoredTimestamp => "existing article has no source timestamp",
            ProcessReason::UnparsableStoredTimestamp => "existing source timestamp is unparsable",
            ProcessReason::UnreadableArticle => "existing article could not be read",
            ProcessReason::NoSourceTimestamp => "document has no modification timestamp",
            ProcessReason::SourceNewer => "document is newer than article",
            ProcessReason::Forced => "forced",
        };
        f.write_str(s)
    }
}

/// Outcome of [`ChangeDetector::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDecision {
    Process {
        reason: ProcessReason,
        /// Instant recorded for the existing article, when one could be parsed.
        existing: Option<DateTime<Utc>>,
    },
    Skip {
        existing: DateTime<Utc>,
    },
}

impl ChangeDecision {
    pub fn should_process(&self) -> bool {
        matches!(self, ChangeDecision::Process { .. })
    }

    /// Recorded instant of the existing article, if known.
    pub fn existing(&self) -> Option<DateTime<Utc>> {
        match self {
            ChangeDecision::Process { existing, .. } => *existing,
            ChangeDecision::Skip { existing } => Some(*existing),
        }
    }

    /// Human-readable skip notice naming the entity and the existing timestamp.
    pub fn skip_notice(&self, key: &ArticleKey) -> Option<String> {
        match self {
            ChangeDecision::Skip { existing } => Some(format!(
                "{} is up-to-date (source: {})",
                key,
                format_timestamp(existing)
            )),
            ChangeDecision::Process { .. } => None,
        }
    }
}

/// Decides whether an article needs regenerating.
pub struct ChangeDetector<'a> {
    index: &'a ArticleIndex,
    force: bool,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(index: &'a ArticleIndex) -> Self {
        Self {
            index,
            force: false,
        }
    }

    /// Always process, while still reporting the existing instant so the
    /// writer can keep it monotonic.
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Decide for the article with `key` stored at `path`.
    pub fn decide(
        &self,
        key: &ArticleKey,
        path: &Path,
        source: &SourceDocumentMetadata,
    ) -> ChangeDecision {
        if !path.is_file() {
            return ChangeDecision::Process {
                reason: ProcessReason::NoArticle,
                existing: None,
            };
        }

        let stored = match self.stored_timestamp(key, path) {
            Ok(stored) => stored,
            Err(reason) => {
                return ChangeDecision::Process {
                    reason: if self.force { ProcessReason::Forced } else { reason },
                    existing: None,
                }
            }
        };

        if self.force {
            return ChangeDecision::Process {
                reason: ProcessReason::Forced,
                existing: Some(stored),
            };
        }

        match source.modified_at {
            None => ChangeDecision::Process {
                reason: ProcessReason::NoSourceTimestamp,
                existing: Some(stored),
            },
            Some(new) if new > stored => ChangeDecision::Process {
                reason: ProcessReason::SourceNewer,
                existing: Some(stored),
            },
            Some(_) => ChangeDecision::Skip { existing: stored },
        }
    }

    fn stored_timestamp(
        &self,
        key: &ArticleKey,
        path: &Path,
    ) -> Result<DateTime<Utc>, ProcessReason> {
        if let Some(ts) = self
            .index
            .get(key)
            .and_then(|entry| entry.source_document_modified)
        {
            debug!(article = %key, "stored timestamp from index");
            return Ok(ts);
        }
        let content = std::fs::read_to_string(path).map_err(|_| ProcessReason::UnreadableArticle)?;
        let raw = read_field(&content, SOURCE_MODIFIED_FIELD).ok_or(ProcessReason::NoStoredTimestamp)?;
        parse_timestamp(&raw).ok_or(ProcessReason::UnparsableStoredTimestamp)
    }
}

/// Convenience form of [`ChangeDetector::decide`] without an index.
pub fn should_process(existing_article_path: &Path, source: &SourceDocumentMetadata) -> bool {
    let index = ArticleIndex::default();
    let key = ArticleKey::new(crate::models::ArticleKind::Overview, "");
    ChangeDetector::new(&index)
        .decide(&key, existing_article_path, source)
        .should_process()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use crate::models::ArticleKind;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn meta(modified: Option<&str>) -> SourceDocumentMetadata {
        SourceDocumentMetadata {
            modified_at: modified.and_then(parse_timestamp),
            title: "Spec".into(),
            ..Default::default()
        }
    }

    fn article(dir: &TempDir, front: &str) -> std::path::PathBuf {
        let path = dir.path().join("overview.md");
        std::fs::write(&path, format!("---\n{}\n---\n\n## Overview\n", front)).unwrap();
        path
    }

    #[test]
    fn missing_article_is_processed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.md");
        assert!(should_process(&path, &meta(Some("2020-07-15T14:30:00"))));
        assert!(should_process(&path, &meta(None)));
    }

    #[test]
    fn strict_greater_than() {
        let tmp = TempDir::new().unwrap();
        let path = article(&tmp, "source_document_modified: \"2020-07-15T14:30:00\"");
        assert!(!should_process(&path, &meta(Some("2020-07-15T14:30:00"))));
        assert!(!should_process(&path, &meta(Some("2019-01-01T00:00:00"))));
        assert!(should_process(&path, &meta(Some("2020-07-15T14:30:01"))));
        assert!(should_process(&path, &meta(Some("2024-03-20T14:45:00"))));
    }

    #[test]
    fn fails_open_on_missing_or_bad_timestamps() {
        let tmp = TempDir::new().unwrap();
        let path = article(&tmp, "title: \"x\"");
        assert!(should_process(&path, &meta(Some("2020-07-15T14:30:00"))));

        let path = article(&tmp, "source_document_modified: \"last tuesday\"");
        assert!(should_process(&path, &meta(Some("2020-07-15T14:30:00"))));

        let path = article(&tmp, "source_document_modified: \"2020-07-15T14:30:00\"");
        assert!(should_process(&path, &meta(None)));
    }

    #[test]
    fn unquoted_and_offset_values_compare_as_instants() {
        let tmp = TempDir::new().unwrap();
        let path = article(&tmp, "source_document_modified: 2020-07-15T16:30:00+02:00");
        assert!(!should_process(&path, &meta(Some("2020-07-15T14:30:00"))));
        assert!(should_process(&path, &meta(Some("2020-07-15T14:31:00Z"))));
    }

    #[test]
    fn index_takes_precedence_over_front_matter() {
        let tmp = TempDir::new().unwrap();
        let path = article(&tmp, "source_document_modified: \"2020-07-15T14:30:00\"");
        let key = ArticleKey::new(ArticleKind::ProductKnowledge, "QMS");
        let mut index = ArticleIndex::load(tmp.path());
        index
            .record(
                &key,
                IndexEntry {
                    path: "overview.md".into(),
                    source_document_modified: Some(
                        Utc.with_ymd_and_hms(2024, 3, 20, 14, 45, 0).unwrap(),
                    ),
                    source_document: "spec.docx".into(),
                    date_updated: Utc::now(),
                },
            )
            .unwrap();

        let decision = ChangeDetector::new(&index).decide(
            &key,
            &path,
            &meta(Some("2022-01-01T00:00:00")),
        );
        assert!(!decision.should_process());
        let notice = decision.skip_notice(&key).unwrap();
        assert!(notice.contains("QMS"));
        assert!(notice.contains("2024-03-20T14:45:00"));
    }

    #[test]
    fn forced_reports_existing_instant() {
        let tmp = TempDir::new().unwrap();
        let path = article(&tmp, "source_document_modified: \"2024-03-20T14:45:00\"");
        let index = ArticleIndex::default();
        let key = ArticleKey::new(ArticleKind::ProductKnowledge, "QMS");
        let decision = ChangeDetector::new(&index).forced(true).decide(
            &key,
            &path,
            &meta(Some("2020-07-15T14:30:00")),
        );
        assert_eq!(
            decision,
            ChangeDecision::Process {
                reason: ProcessReason::Forced,
                existing: Some(Utc.with_ymd_and_hms(2024, 3, 20, 14, 45, 0).unwrap()),
            }
        );
    }
}
