//! Searchable policy indexes.
//!
//! [`PolicyIndex`] is what a session queries: either an embedding-backed
//! [`VectorIndex`] or a term-overlap [`KeywordIndex`]. Both are immutable
//! once built; re-ingesting documents builds a new index.
//!
//! An index can be flattened into an [`IndexSnapshot`] for persistence and
//! restored against whatever embedder is configured at load time. When the
//! snapshot's vectors were produced by a different model, or embeddings are
//! disabled, the restored index falls back to keyword search over the same
//! chunks.

pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;
use crate::models::PolicyChunk;
use crate::provider::{ScoredSimilaritySearch, SearchProvider, SimilaritySearch};

pub use memory::{IndexedChunk, KeywordIndex, VectorIndex};

/// An index over ingested policy chunks.
pub enum PolicyIndex {
    Vector(VectorIndex),
    Keyword(KeywordIndex),
}

impl PolicyIndex {
    /// `"vector"` or `"keyword"`.
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyIndex::Vector(_) => "vector",
            PolicyIndex::Keyword(_) => "keyword",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PolicyIndex::Vector(v) => v.entries().len(),
            PolicyIndex::Keyword(k) => k.chunks().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The indexed chunks, in ingestion order.
    pub fn chunks(&self) -> Vec<&PolicyChunk> {
        match self {
            PolicyIndex::Vector(v) => v.entries().iter().map(|e| &e.chunk).collect(),
            PolicyIndex::Keyword(k) => k.chunks().iter().collect(),
        }
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        match self {
            PolicyIndex::Vector(v) => IndexSnapshot {
                kind: "vector".into(),
                model: Some(v.model_name().to_string()),
                dims: Some(v.dims()),
                chunks: v.entries().iter().map(|e| e.chunk.clone()).collect(),
                vectors: Some(v.entries().iter().map(|e| e.vector.clone()).collect()),
            },
            PolicyIndex::Keyword(k) => IndexSnapshot {
                kind: "keyword".into(),
                model: None,
                dims: None,
                chunks: k.chunks().to_vec(),
                vectors: None,
            },
        }
    }

    /// Rebuild an index from a snapshot without re-embedding.
    pub fn restore(snapshot: IndexSnapshot, embedder: Arc<dyn Embedder>) -> PolicyIndex {
        let vectors_usable = embedder.is_enabled()
            && snapshot.model.as_deref() == Some(embedder.model_name())
            && snapshot
                .vectors
                .as_ref()
                .is_some_and(|v| v.len() == snapshot.chunks.len());

        match snapshot.vectors {
            Some(vectors) if vectors_usable => {
                let entries = snapshot
                    .chunks
                    .into_iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexedChunk { chunk, vector })
                    .collect();
                PolicyIndex::Vector(VectorIndex::from_entries(embedder, entries))
            }
            _ => PolicyIndex::Keyword(KeywordIndex::new(snapshot.chunks)),
        }
    }
}

impl SearchProvider for PolicyIndex {
    fn scored(&self) -> Option<&dyn ScoredSimilaritySearch> {
        match self {
            PolicyIndex::Vector(v) => v.scored(),
            PolicyIndex::Keyword(k) => k.scored(),
        }
    }

    fn unscored(&self) -> Option<&dyn SimilaritySearch> {
        match self {
            PolicyIndex::Vector(v) => v.unscored(),
            PolicyIndex::Keyword(k) => k.unscored(),
        }
    }
}

/// Serializable form of a [`PolicyIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub kind: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    pub chunks: Vec<PolicyChunk>,
    #[serde(default)]
    pub vectors: Option<Vec<Vec<f32>>>,
}
