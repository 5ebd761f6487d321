//! # docwiki
//!
//! Turns Word documents into a markdown knowledge base.
//!
//! docwiki reads `.docx` files, asks an OpenAI-compatible chat model to
//! extract document guides, product knowledge and client information, and
//! writes the results as front-matter markdown articles. Before every
//! request it checks whether the existing article is already current, and
//! after every request it checks whether the answer is worth keeping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │  .docx      │──▶│        Pipeline           │──▶│  Markdown    │
//! │ DocxReader  │   │ detect → extract → gate   │   │  + index     │
//! └─────────────┘   └────────────┬─────────────┘   └──────────────┘
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │ chat/completions API │
//!                     └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export MOONSHOT_API_KEY=sk-...
//! docwiki ping                          # check endpoint and key
//! docwiki build spec.docx               # one document
//! docwiki build --dir ./docs -r         # pick documents interactively
//! docwiki status                        # what the knowledge base holds
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Core data types and article paths |
//! | [`extract`] | DOCX reader |
//! | [`discover`] | Finding `.docx` files in a directory |
//! | [`layout`] | Existing knowledge-base structure |
//! | [`prompts`] | Request text per extraction intent |
//! | [`llm`] | Chat-completions extraction service |
//! | [`detect`] | Change detector |
//! | [`gate`] | Quality gate (Checkpoints A and B) |
//! | [`frontmatter`] | Front-matter rendering and parsing |
//! | [`index`] | Sidecar article index |
//! | [`writer`] | Markdown writer |
//! | [`pipeline`] | Per-document orchestration |
//! | [`progress`] | Build progress reporting |
//! | [`build_cmd`] | `build`, `status` and `ping` commands |
//! | [`traits`] | Reader and extraction-service seams |

pub mod build_cmd;
pub mod config;
pub mod detect;
pub mod discover;
pub mod extract;
pub mod frontmatter;
pub mod gate;
pub mod index;
pub mod layout;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod traits;
pub mod writer;
