//! # DocuSec
//!
//! Compliance control coverage for policy documents.
//!
//! DocuSec ingests policy documents (PDF, DOCX, text), chunks them by
//! policy section, and indexes the chunks. Given a compliance framework's
//! controls it finds, for every control, the policy excerpts that best
//! support it and quotes the closest sentence.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Documents  │──▶│ Chunk+Embed  │──▶│ PolicyIndex  │
//! │ PDF/DOCX   │   │ (Indexer)    │   │ vector/kw    │
//! └────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │
//! ┌────────────┐   ┌──────────────┐          │
//! │ Controls   │──▶│ Coverage     │◀─────────┘
//! │ (SQLite)   │   │ engine       │
//! └────────────┘   └──────┬───────┘
//!                         ▼
//!                 ┌──────────────┐
//!                 │  CLI / HTTP  │
//!                 └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docusec init
//! docusec controls import controls.csv
//! docusec ingest ./policies --name Policies
//! docusec coverage --framework "ISO 27001" --index Policies
//! docusec serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`controls`] | Control store and CSV import |
//! | [`frameworks`] | Framework catalogue and clause indexes |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`documents`] | Filesystem discovery |
//! | [`embedding`] / [`llm`] | OpenAI clients |
//! | [`persist`] | Named index persistence |
//! | [`session`] | Ingestion state |
//! | [`server`] | HTTP API |

pub mod config;
pub mod controls;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod frameworks;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod persist;
pub mod report;
pub mod server;
pub mod session;
