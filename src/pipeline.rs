//! Build pipeline: documents in, articles out.
//!
//! For each document:
//!
//! ```text
//! read ─▶ discover ─▶ Checkpoint A ─▶ for each article:
//!                                       detect ─▶ extract ─▶ Checkpoint B ─▶ write
//! ```
//!
//! The change detector runs before every extraction request, so an unchanged
//! document costs one discovery request and writes nothing. A failed request
//! affects only the article it was for; a document that cannot be read or
//! analyzed is counted as failed and the run moves on.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::detect::{ChangeDecision, ChangeDetector};
use crate::frontmatter::read_field;
use crate::gate::{accept, filter_candidate_entities, GateContent, RejectReason, Verdict};
use crate::layout::KnowledgeBaseLayout;
use crate::llm::ServiceError;
use crate::models::{
    safe_segment, slugify, ArticleKey, ArticleKind, ClientProfile, DocumentAnalysis,
    ExtractionResult, GuideRequest, ParsedDocument,
};
use crate::progress::{PipelineEvent, ProgressReporter};
use crate::traits::{DocumentReader, ExtractionService};
use crate::writer::{Article, MarkdownWriter};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub documents: u64,
    pub documents_failed: u64,
    pub written: u64,
    pub up_to_date: u64,
    pub insufficient: u64,
    pub empty: u64,
    pub failed: u64,
}

pub struct Pipeline<'a> {
    reader: &'a dyn DocumentReader,
    service: &'a dyn ExtractionService,
    writer: MarkdownWriter,
    reporter: &'a dyn ProgressReporter,
    force: bool,
    stats: RunStats,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        reader: &'a dyn DocumentReader,
        service: &'a dyn ExtractionService,
        output_dir: &Path,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            reader,
            service,
            writer: MarkdownWriter::open(output_dir),
            reporter,
            force: false,
            stats: RunStats::default(),
        }
    }

    /// Regenerate articles even when they are up to date.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process `documents` in order and return the run's counters.
    pub async fn run(&mut self, documents: &[PathBuf]) -> Result<RunStats> {
        let total = documents.len() as u64;
        for (i, path) in documents.iter().enumerate() {
            self.process_document(path, i as u64 + 1, total).await?;
        }
        Ok(self.stats.clone())
    }

    /// Process one document. Only write failures are returned as errors.
    pub async fn process_document(&mut self, path: &Path, n: u64, total: u64) -> Result<()> {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.stats.documents += 1;
        self.reporter.report(PipelineEvent::Document {
            file: file.clone(),
            n,
            total,
        });

        let doc = match self.reader.read(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(file = %file, error = %e, "cannot read document");
                self.document_failed(file, e.to_string());
                return Ok(());
            }
        };

        let layout = KnowledgeBaseLayout::scan(self.writer.root())?;
        let analysis = match self.service.analyze_document(&doc, &layout).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(file = %file, error = %e, "discovery failed");
                self.document_failed(file, format!("discovery failed: {}", e));
                return Ok(());
            }
        };

        let known = layout.known_entities();
        let products = filter_candidate_entities(&analysis.products, &known);
        let client = analysis
            .client_name
            .as_ref()
            .map(|c| filter_candidate_entities(std::slice::from_ref(c), &known))
            .and_then(|mut names| names.pop());
        info!(
            file = %file,
            products = products.len(),
            client = client.as_deref().unwrap_or("-"),
            "entities discovered"
        );
        self.reporter.report(PipelineEvent::Discovered {
            file,
            products: products.clone(),
            client: client.clone(),
        });

        self.process_guides(&doc, &analysis).await?;
        for product in &products {
            self.process_product(&doc, product, &layout).await?;
        }
        if let Some(client) = client {
            self.process_client(&doc, &client, &layout).await?;
        }
        Ok(())
    }

    /// Folder name for a document's guides.
    ///
    /// Normally the document title. When `Documents/<title>/` already holds
    /// guides from a different source file, the file stem is appended so two
    /// documents sharing a title never share guides or stored timestamps.
    fn guide_entity(&self, doc: &ParsedDocument) -> String {
        let title = doc.metadata.title.clone();
        let dir = format!("Documents/{}", safe_segment(&title));
        let owner = self
            .writer
            .index()
            .source_under(&dir)
            .map(str::to_string)
            .or_else(|| {
                let overview = self.writer.root().join(&dir).join("overview.md");
                let text = std::fs::read_to_string(overview).ok()?;
                read_field(&text, "source_document")
            });
        match owner {
            Some(owner) if owner != doc.file_name() => {
                let stem = doc
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                debug!(title = %title, owner = %owner, "guide folder taken, using file stem");
                format!("{} - {}", title, stem)
            }
            _ => title,
        }
    }

    async fn process_guides(&mut self, doc: &ParsedDocument, analysis: &DocumentAnalysis) -> Result<()> {
        let entity = self.guide_entity(doc);
        let tags = guide_tags(doc, analysis);

        let mut requests = vec![(
            ArticleKey::new(ArticleKind::Overview, entity.as_str()),
            format!("{} - Overview", entity),
            GuideRequest::Overview,
        )];
        for (i, chapter) in doc.chapters().into_iter().enumerate() {
            let topic = format!("{:02}-{}", i + 1, slugify(&chapter.heading));
            requests.push((
                ArticleKey::new(ArticleKind::Chapter, entity.as_str()).with_topic(topic),
                chapter.heading.clone(),
                GuideRequest::Chapter {
                    heading: chapter.heading.clone(),
                    text: doc.chapter_text(chapter),
                },
            ));
        }
        requests.push((
            ArticleKey::new(ArticleKind::BestPractices, entity.as_str()),
            format!("{} - Best Practices", entity),
            GuideRequest::BestPractices,
        ));

        for (key, title, request) in requests {
            let Some(decision) = self.check(&key, doc) else {
                continue;
            };
            let result = self
                .service
                .extract_document_guide(doc, &request, analysis)
                .await;
            if let Some(body) = self.gate(&key, result) {
                let article = Article {
                    key,
                    title,
                    body,
                    source: &doc.metadata,
                    source_file: doc.file_name(),
                    category: Some(analysis.document_category.clone()),
                    tags: tags.clone(),
                };
                self.write(&article, &decision)?;
            }
        }
        Ok(())
    }

    async fn process_product(
        &mut self,
        doc: &ParsedDocument,
        product: &str,
        layout: &KnowledgeBaseLayout,
    ) -> Result<()> {
        let key = ArticleKey::new(ArticleKind::ProductKnowledge, product);
        let Some(decision) = self.check(&key, doc) else {
            return Ok(());
        };
        let result = self
            .service
            .extract_product_knowledge(doc, product, layout)
            .await;
        if let Some(body) = self.gate(&key, result) {
            let article = Article {
                key,
                title: product.to_string(),
                body,
                source: &doc.metadata,
                source_file: doc.file_name(),
                category: None,
                tags: Vec::new(),
            };
            self.write(&article, &decision)?;
        }
        Ok(())
    }

    /// Client profiles are detected and gated as one unit keyed on the
    /// client's `overview.md`, then written as one file per topic.
    async fn process_client(
        &mut self,
        doc: &ParsedDocument,
        client: &str,
        layout: &KnowledgeBaseLayout,
    ) -> Result<()> {
        let hub = ArticleKey::new(ArticleKind::ClientInfo, client);
        let Some(decision) = self.check(&hub, doc) else {
            return Ok(());
        };
        let result = self.service.extract_client_profile(doc, client, layout).await;
        let Some(profile) = self.gate(&hub, result) else {
            return Ok(());
        };

        for (topic, key, title, body) in client_articles(client, &profile) {
            let topic_decision = if topic == "overview" {
                decision.clone()
            } else {
                ChangeDetector::new(self.writer.index())
                    .forced(true)
                    .decide(&key, &self.writer.path_for(&key), &doc.metadata)
            };
            let article = Article {
                key,
                title,
                body,
                source: &doc.metadata,
                source_file: doc.file_name(),
                category: None,
                tags: Vec::new(),
            };
            self.write(&article, &topic_decision)?;
        }
        Ok(())
    }

    /// Run the change detector; `None` means the article is current.
    fn check(&mut self, key: &ArticleKey, doc: &ParsedDocument) -> Option<ChangeDecision> {
        let path = self.writer.path_for(key);
        let decision = ChangeDetector::new(self.writer.index())
            .forced(self.force)
            .decide(key, &path, &doc.metadata);
        if let Some(notice) = decision.skip_notice(key) {
            info!("{}", notice);
            self.stats.up_to_date += 1;
            self.reporter.report(PipelineEvent::UpToDate {
                article: key.to_string(),
                notice,
            });
            return None;
        }
        Some(decision)
    }

    /// Checkpoint B plus failure accounting; `Some` only for accepted content.
    fn gate<T: GateContent>(
        &mut self,
        key: &ArticleKey,
        result: std::result::Result<ExtractionResult<T>, ServiceError>,
    ) -> Option<T> {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(article = %key, service = self.service.name(), error = %e, "extraction failed");
                self.stats.failed += 1;
                self.reporter.report(PipelineEvent::ExtractionFailed {
                    article: key.to_string(),
                    error: e.to_string(),
                });
                return None;
            }
        };
        match accept(&result) {
            Verdict::Accept => match result {
                ExtractionResult::Content(body) => Some(body),
                ExtractionResult::InsufficientInformation => None,
            },
            Verdict::Reject(reason) => {
                info!(article = %key, %reason, "skipped");
                match reason {
                    RejectReason::InsufficientInformation => self.stats.insufficient += 1,
                    RejectReason::EmptyContent => self.stats.empty += 1,
                }
                self.reporter.report(PipelineEvent::Rejected {
                    article: key.to_string(),
                    reason: reason.to_string(),
                });
                None
            }
        }
    }

    fn write(&mut self, article: &Article<'_>, decision: &ChangeDecision) -> Result<()> {
        let path = self.writer.write(article, decision.existing())?;
        self.stats.written += 1;
        self.reporter.report(PipelineEvent::Written {
            article: article.key.to_string(),
            path,
        });
        Ok(())
    }

    fn document_failed(&mut self, file: String, error: String) {
        self.stats.documents_failed += 1;
        self.reporter.report(PipelineEvent::DocumentFailed { file, error });
    }
}

/// Tags for document guides: the document's keywords and its category.
pub fn guide_tags(doc: &ParsedDocument, analysis: &DocumentAnalysis) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let candidates = doc
        .metadata
        .keywords
        .iter()
        .map(|k| slugify(k))
        .chain(std::iter::once(slugify(&analysis.document_category)));
    for tag in candidates {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Split a profile into `(topic, key, title, body)` per file.
///
/// `overview.md` is always produced and links the other topic files.
pub fn client_articles(
    client: &str,
    profile: &ClientProfile,
) -> Vec<(String, ArticleKey, String, String)> {
    let mut overview_text = String::new();
    let mut others = Vec::new();
    for (topic, value) in &profile.topics {
        let slug = slugify(topic);
        if slug.is_empty() {
            continue;
        }
        if slug == "overview" {
            overview_text = value.to_markdown();
        } else {
            others.push((slug, topic_title(topic), value));
        }
    }

    let mut hub = overview_text;
    if !others.is_empty() {
        if !hub.is_empty() {
            hub.push_str("\n\n");
        }
        hub.push_str("## Topics\n\n");
        let links: Vec<String> = others
            .iter()
            .map(|(slug, title, _)| format!("- [{}]({}.md)", title, slug))
            .collect();
        hub.push_str(&links.join("\n"));
    }

    let mut out = vec![(
        "overview".to_string(),
        ArticleKey::new(ArticleKind::ClientInfo, client),
        format!("{} - Overview", client),
        hub,
    )];
    for (slug, title, value) in others {
        out.push((
            slug.clone(),
            ArticleKey::new(ArticleKind::ClientInfo, client).with_topic(slug),
            format!("{} - {}", client, title),
            value.to_markdown(),
        ));
    }
    out
}

fn topic_title(topic: &str) -> String {
    topic
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientTopic, SourceDocumentMetadata};

    #[test]
    fn tags_from_keywords_and_category() {
        let doc = ParsedDocument {
            path: PathBuf::from("spec.docx"),
            metadata: SourceDocumentMetadata {
                keywords: vec!["PLC".into(), "Version Control".into(), "plc".into()],
                ..Default::default()
            },
            sections: Vec::new(),
            full_text: String::new(),
        };
        let analysis = DocumentAnalysis {
            document_category: "Version Control".into(),
            ..Default::default()
        };
        assert_eq!(guide_tags(&doc, &analysis), ["plc", "version-control"]);
    }

    #[test]
    fn client_overview_links_topics() {
        let profile = ClientProfile {
            topics: vec![
                ("overview".into(), ClientTopic::Text("Iron ore.".into())),
                ("locations".into(), ClientTopic::Items(vec!["Port Hedland".into()])),
                ("network_design".into(), ClientTopic::Text("VLAN 20".into())),
            ],
        };
        let articles = client_articles("Roy Hill", &profile);
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].1.relative_path(), Path::new("Clients/Roy Hill/overview.md"));
        assert!(articles[0].3.starts_with("Iron ore.\n\n## Topics"));
        assert!(articles[0].3.contains("- [Locations](locations.md)"));
        assert_eq!(articles[2].2, "Roy Hill - Network Design");
        assert_eq!(
            articles[2].1.relative_path(),
            Path::new("Clients/Roy Hill/network-design.md")
        );
        assert_eq!(articles[1].3, "- Port Hedland");
    }

    #[test]
    fn client_without_overview_still_gets_hub() {
        let profile = ClientProfile {
            topics: vec![("hardware".into(), ClientTopic::Items(vec!["S7-1500".into()]))],
        };
        let articles = client_articles("Acme", &profile);
        assert_eq!(articles[0].0, "overview");
        assert_eq!(articles[0].3, "## Topics\n\n- [Hardware](hardware.md)");
    }
}
