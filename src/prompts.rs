//! Request text for each extraction intent.
//!
//! Every prompt starts with the optional company context, then the existing
//! knowledge-base summary, then the (truncated) document material and the
//! instructions. Responses that would only produce a stub are asked to reply
//! with [`SENTINEL`] alone.

use crate::config::{CompanyConfig, LimitsConfig};
use crate::gate::SENTINEL;
use crate::models::{DocumentAnalysis, GuideRequest, ParsedDocument, CLIENT_TOPICS};

/// Builds prompts from configuration and per-request inputs.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    company: CompanyConfig,
    limits: LimitsConfig,
}

impl PromptBuilder {
    pub fn new(company: CompanyConfig, limits: LimitsConfig) -> Self {
        Self { company, limits }
    }

    /// `COMPANY CONTEXT:` preamble, or empty when nothing is configured.
    pub fn company_context(&self) -> String {
        let c = &self.company;
        let mut parts = Vec::new();
        if !c.name.is_empty() {
            parts.push(format!("COMPANY: {}", c.name));
            if !c.former_name.is_empty() {
                parts.push(format!("  (formerly {})", c.former_name));
            }
        }
        if !c.business.is_empty() {
            parts.push(format!("BUSINESS: {}", c.business));
        }
        if !c.industries.is_empty() {
            parts.push(format!("INDUSTRIES: {}", c.industries));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("COMPANY CONTEXT:\n{}\n\n", parts.join("\n"))
        }
    }

    pub fn discovery(&self, doc: &ParsedDocument, existing: &str) -> String {
        let us = if self.company.name.is_empty() {
            "us"
        } else {
            self.company.name.as_str()
        };
        format!(
            r###"{context}Analyze this document and extract its metadata.

{existing}

DOCUMENT CONTENT:
{content}

INSTRUCTIONS:
1. Products/Systems: list only products or systems the document discusses in substance
   (technical details, procedures, configuration). Skip passing mentions and examples.
   If a product already exists in the structure above, use exactly that name.
2. Client: the customer this document is for. Distinguish between {us}, the client and vendors.
   If the client already exists in the structure above, use exactly that name.
   Use null for internal documentation.
3. Document type, e.g. "User Manual", "Technical Specification", "How-To Guide".
4. Document category, e.g. "Version Control", "Controls Systems", "Electrical".

Return ONLY valid JSON in this exact format:
{{
    "products": ["Product1", "Product2"],
    "client_name": "ClientName or null",
    "document_type": "DocumentType",
    "document_category": "Category"
}}
"###,
            context = self.company_context(),
            existing = existing,
            content = truncate_chars(&doc.full_text, self.limits.discovery_chars),
            us = us,
        )
    }

    pub fn product(&self, doc: &ParsedDocument, product: &str, existing: &str) -> String {
        format!(
            r###"{context}You are extracting knowledge about {product} from a technical document.

{existing}

If {product} already exists in the structure above, focus on information that complements it.

DOCUMENT STRUCTURE:
{outline}
DOCUMENT CONTENT:
{content}

TASK: Write a wiki article about {product}.

If {product} is only mentioned in passing, has no technical information in this document,
or only appears as an example or in a table, return ONLY this text: "{sentinel}"
Do not write a stub article.

Otherwise write directly as a wiki article in present tense with no commentary about the
document or your process. Start immediately with "## Overview". Use only the sections
that have content:

## Overview
## Features & Capabilities
## Integration & Interfaces
## Configuration & Setup
## Usage & Operations
## Technical Details
## Engineering Notes
"###,
            context = self.company_context(),
            product = product,
            existing = existing,
            outline = doc.outline(),
            content = truncate_chars(&doc.full_text, self.limits.product_chars),
            sentinel = SENTINEL,
        )
    }

    pub fn client(&self, doc: &ParsedDocument, client: &str, existing: &str) -> String {
        format!(
            r###"{context}Extract information about {client} from this document and organize it into categories.

{existing}

If {client} already exists in the structure above, reuse its existing categories where they fit.

DOCUMENT CONTENT:
{content}

If the document holds no substantive information about {client}, return ONLY this text: "{sentinel}"

Otherwise return ONLY valid JSON in this exact format:
{{
    "{t0}": "Brief overview of the client and project",
    "{t1}": ["Location 1 with details", "Location 2 with details"],
    "{t2}": ["Hardware item 1", "Hardware item 2"],
    "{t3}": ["Config detail 1", "Config detail 2"],
    "{t4}": ["Contact 1", "Contact 2"]
}}

Additional categories are allowed (e.g. "software", "network", "security").
"###,
            context = self.company_context(),
            client = client,
            existing = existing,
            content = truncate_chars(&doc.full_text, self.limits.client_chars),
            sentinel = SENTINEL,
            t0 = CLIENT_TOPICS[0],
            t1 = CLIENT_TOPICS[1],
            t2 = CLIENT_TOPICS[2],
            t3 = CLIENT_TOPICS[3],
            t4 = CLIENT_TOPICS[4],
        )
    }

    pub fn guide(
        &self,
        doc: &ParsedDocument,
        request: &GuideRequest,
        analysis: &DocumentAnalysis,
    ) -> String {
        let title = &doc.metadata.title;
        let (task, material) = match request {
            GuideRequest::Overview => (
                format!(
                    "Write an overview of the document \"{}\": its purpose, audience, scope and \
                     how its chapters fit together. Start with \"## Overview\".",
                    title
                ),
                truncate_chars(&doc.full_text, self.limits.guide_chars),
            ),
            GuideRequest::Chapter { heading, text } => (
                format!(
                    "Write a reference article for the chapter \"{}\" of \"{}\". Keep the \
                     technical content complete (procedures, tables, settings), not a summary. \
                     Start with \"## {}\".",
                    heading, title, heading
                ),
                truncate_chars(text, self.limits.guide_chars),
            ),
            GuideRequest::BestPractices => (
                format!(
                    "Collect the recommended approaches, lessons learned and pitfalls that \
                     \"{}\" documents. Start with \"## Best Practices\".",
                    title
                ),
                truncate_chars(&doc.full_text, self.limits.guide_chars),
            ),
        };
        format!(
            r###"{context}We are building a technical knowledge base from our documents.

DOCUMENT: {title}
TYPE: {doc_type}
CATEGORY: {category}

DOCUMENT STRUCTURE:
{outline}
MATERIAL:
{material}

TASK: {task}

Write clean wiki markdown in present tense with no commentary about the document or your
process. If the material holds nothing worth keeping for this task, return ONLY this text:
"{sentinel}"
"###,
            context = self.company_context(),
            title = title,
            doc_type = analysis.document_type,
            category = analysis.document_category,
            outline = doc.outline(),
            material = material,
            task = task,
            sentinel = SENTINEL,
        )
    }
}

/// First `max` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
