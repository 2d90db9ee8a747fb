//! Request-scoped ingestion state.
//!
//! A [`Session`] owns the chunks ingested so far, the raw document texts
//! (for naive control mapping), and the index built over the chunks. The
//! CLI builds one per invocation; the HTTP server keeps one in its
//! `AppState` behind a lock.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use docusec_core::chunk::chunk_document;
use docusec_core::coverage::check_coverage;
use docusec_core::embedding::Embedder;
use docusec_core::mapper::{map_controls, FrameworkControls};
use docusec_core::models::{Control, CoverageResult, PolicyChunk};
use docusec_core::provider::SearchProvider;
use docusec_core::rag::{answer_query, TextGenerator};
use docusec_core::store::{KeywordIndex, PolicyIndex, VectorIndex};

use crate::config::{ChunkingConfig, Config};
use crate::documents::PolicyDocument;

/// Chunks documents and builds indexes with the configured embedder.
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    batch_size: usize,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig, batch_size: usize) -> Self {
        Self {
            embedder,
            chunking,
            batch_size,
        }
    }

    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            embedder,
            config.chunking.clone(),
            config.embedding.batch_size,
        )
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn chunk(&self, documents: &[PolicyDocument]) -> Vec<PolicyChunk> {
        documents
            .iter()
            .flat_map(|doc| {
                chunk_document(
                    &doc.text,
                    &doc.name,
                    self.chunking.max_tokens,
                    self.chunking.overlap_tokens,
                )
            })
            .collect()
    }

    /// A vector index when embeddings are enabled, otherwise a keyword index.
    pub fn build(&self, chunks: Vec<PolicyChunk>) -> Result<PolicyIndex> {
        if self.embedder.is_enabled() {
            Ok(PolicyIndex::Vector(VectorIndex::build(
                self.embedder.clone(),
                chunks,
                self.batch_size,
            )?))
        } else {
            Ok(PolicyIndex::Keyword(KeywordIndex::new(chunks)))
        }
    }
}

#[derive(Clone, Default)]
pub struct Session {
    chunks: Vec<PolicyChunk>,
    documents: Vec<String>,
    index: Option<Arc<PolicyIndex>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved index. Mapping runs over its chunk texts.
    pub fn from_index(index: PolicyIndex) -> Self {
        let chunks: Vec<PolicyChunk> = index.chunks().into_iter().cloned().collect();
        let documents = chunks.iter().map(|c| c.text.clone()).collect();
        Self {
            chunks,
            documents,
            index: Some(Arc::new(index)),
        }
    }

    /// Add documents and rebuild the index over all chunks.
    ///
    /// Returns the total number of chunks. On failure the session is
    /// left unchanged.
    pub fn ingest(&mut self, documents: &[PolicyDocument], indexer: &Indexer) -> Result<usize> {
        let mut chunks = self.chunks.clone();
        chunks.extend(indexer.chunk(documents));
        let index = indexer.build(chunks.clone())?;

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            kind = index.kind(),
            "session index rebuilt"
        );
        self.documents
            .extend(documents.iter().map(|d| d.text.clone()));
        self.chunks = chunks;
        self.index = Some(Arc::new(index));
        Ok(self.chunks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[PolicyChunk] {
        &self.chunks
    }

    pub fn index(&self) -> Option<Arc<PolicyIndex>> {
        self.index.clone()
    }

    pub fn map(&self, frameworks: &FrameworkControls) -> std::collections::BTreeMap<String, Vec<String>> {
        map_controls(frameworks, &self.documents)
    }

    pub fn coverage(&self, controls: &[Control], max_candidates: usize) -> Vec<CoverageResult> {
        let provider = self.index.as_deref().map(|i| i as &dyn SearchProvider);
        check_coverage(provider, controls, max_candidates)
    }

    pub fn answer(&self, generator: &dyn TextGenerator, question: &str, k: usize) -> Result<String> {
        let index = self
            .index
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No documents ingested"))?;
        answer_query(index, generator, question, k)
    }
}
