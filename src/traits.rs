//! Extension traits for the two external collaborators of the pipeline.
//!
//! The pipeline never talks to Word files or the model backend directly:
//! it goes through [`DocumentReader`] and [`ExtractionService`], so tests and
//! alternative backends can be plugged in without touching the
//! change-detection and quality-gate logic.
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────┐
//! │DocumentReader│──▶│      Pipeline       │──▶│  Markdown    │
//! │  (DocxReader)│   │ detect → extract →  │   │  Writer      │
//! └──────────────┘   │ gate                │   └──────────────┘
//!                    └─────────┬──────────┘
//!                              ▼
//!                  ┌──────────────────────┐
//!                  │  ExtractionService   │
//!                  │ (ChatExtractionSvc)  │
//!                  └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use docwiki::layout::KnowledgeBaseLayout;
//! use docwiki::llm::ServiceError;
//! use docwiki::models::*;
//! use docwiki::traits::ExtractionService;
//!
//! struct Nothing;
//!
//! #[async_trait]
//! impl ExtractionService for Nothing {
//!     fn name(&self) -> &str { "nothing" }
//!     async fn analyze_document(&self, _: &ParsedDocument, _: &KnowledgeBaseLayout)
//!         -> Result<DocumentAnalysis, ServiceError> { Ok(DocumentAnalysis::default()) }
//!     async fn extract_product_knowledge(&self, _: &ParsedDocument, _: &str, _: &KnowledgeBaseLayout)
//!         -> Result<ExtractionResult, ServiceError> { Ok(ExtractionResult::InsufficientInformation) }
//!     async fn extract_client_profile(&self, _: &ParsedDocument, _: &str, _: &KnowledgeBaseLayout)
//!         -> Result<ExtractionResult<ClientProfile>, ServiceError> { Ok(ExtractionResult::InsufficientInformation) }
//!     async fn extract_document_guide(&self, _: &ParsedDocument, _: &GuideRequest, _: &DocumentAnalysis)
//!         -> Result<ExtractionResult, ServiceError> { Ok(ExtractionResult::InsufficientInformation) }
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;

use crate::extract::ReadError;
use crate::layout::KnowledgeBaseLayout;
use crate::llm::ServiceError;
use crate::models::{
    ClientProfile, DocumentAnalysis, ExtractionResult, GuideRequest, ParsedDocument,
};

/// Turns a document path into text, sections and core properties.
///
/// A failure aborts processing of that document only.
pub trait DocumentReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ParsedDocument, ReadError>;
}

/// The model backend, seen as an opaque function from document text and an
/// extraction intent to structured content.
///
/// Implementations must return [`ExtractionResult::InsufficientInformation`]
/// when the backend declines to produce content, and an `Err` only for
/// operational failures (network, auth, quota, undecodable responses). The
/// two are never conflated by the pipeline.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Short identifier used in logs (e.g. the model name).
    fn name(&self) -> &str;

    /// Entity discovery: products, client, document type and category.
    async fn analyze_document(
        &self,
        doc: &ParsedDocument,
        layout: &KnowledgeBaseLayout,
    ) -> Result<DocumentAnalysis, ServiceError>;

    /// Product-knowledge article body for one product.
    async fn extract_product_knowledge(
        &self,
        doc: &ParsedDocument,
        product: &str,
        layout: &KnowledgeBaseLayout,
    ) -> Result<ExtractionResult, ServiceError>;

    /// Client information grouped by topic.
    async fn extract_client_profile(
        &self,
        doc: &ParsedDocument,
        client: &str,
        layout: &KnowledgeBaseLayout,
    ) -> Result<ExtractionResult<ClientProfile>, ServiceError>;

    /// Document-structure guide (overview, one chapter, or best practices).
    async fn extract_document_guide(
        &self,
        doc: &ParsedDocument,
        request: &GuideRequest,
        analysis: &DocumentAnalysis,
    ) -> Result<ExtractionResult, ServiceError>;
}
