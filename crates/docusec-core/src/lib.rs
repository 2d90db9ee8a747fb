//! # DocuSec Core
//!
//! Shared, synchronous logic for DocuSec: data models, retrieved-fragment
//! adapters, search provider capabilities, the control coverage engine,
//! quote extraction, naive control mapping, policy chunking, and the
//! in-memory indexes.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP clients.
//! Embedding and text-generation backends are injected through the
//! [`embedding::Embedder`] and [`rag::TextGenerator`] traits.

pub mod chunk;
pub mod clauses;
pub mod coverage;
pub mod embedding;
pub mod fragment;
pub mod mapper;
pub mod models;
pub mod provider;
pub mod quote;
pub mod rag;
pub mod store;
pub mod validation;
