//! In-memory indexes over policy chunks.
//!
//! [`VectorIndex`] does brute-force cosine similarity over stored vectors
//! and answers scored queries. [`KeywordIndex`] ranks by the number of
//! query terms a chunk contains and answers unscored queries only; it is
//! the fallback when no embedder is configured.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, Embedder};
use crate::fragment::Fragment;
use crate::models::PolicyChunk;
use crate::provider::{ScoredSimilaritySearch, SearchProvider, SimilaritySearch};

/// A chunk with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: PolicyChunk,
    pub vector: Vec<f32>,
}

/// Embedding-backed index.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Embed `chunks` in batches of `batch_size` and index them.
    pub fn build(
        embedder: Arc<dyn Embedder>,
        chunks: Vec<PolicyChunk>,
        batch_size: usize,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed(&texts)?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexedChunk { chunk, vector }),
            );
        }
        Ok(Self { embedder, entries })
    }

    /// Rebuild from previously computed vectors without calling the embedder.
    pub fn from_entries(embedder: Arc<dyn Embedder>, entries: Vec<IndexedChunk>) -> Self {
        Self { embedder, entries }
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn dims(&self) -> usize {
        self.embedder.dims()
    }
}

impl ScoredSimilaritySearch for VectorIndex {
    fn similarity_search_with_scores(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Fragment, f64)>> {
        let query_vec = self.embedder.embed_query(query)?;
        let mut scored: Vec<(&IndexedChunk, f64)> = self
            .entries
            .iter()
            .map(|e| (e, cosine_similarity(&query_vec, &e.vector) as f64))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(e, score)| (Fragment::from(&e.chunk), score))
            .collect())
    }
}

impl SearchProvider for VectorIndex {
    fn scored(&self) -> Option<&dyn ScoredSimilaritySearch> {
        Some(self)
    }
}

/// Term-overlap index used when embeddings are disabled.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    chunks: Vec<PolicyChunk>,
}

impl KeywordIndex {
    pub fn new(chunks: Vec<PolicyChunk>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[PolicyChunk] {
        &self.chunks
    }
}

impl SimilaritySearch for KeywordIndex {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Fragment>> {
        let query_lower = query.to_lowercase();
        let mut terms: Vec<&str> = query_lower
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort_unstable();
        terms.dedup();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<(&PolicyChunk, usize)> = self
            .chunks
            .iter()
            .filter_map(|c| {
                let text_lower = c.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                (matches > 0).then_some((c, matches))
            })
            .collect();
        // Stable: equal counts keep ingestion order.
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.truncate(k);
        Ok(candidates
            .into_iter()
            .map(|(c, _)| Fragment::from(c))
            .collect())
    }
}

impl SearchProvider for KeywordIndex {
    fn unscored(&self) -> Option<&dyn SimilaritySearch> {
        Some(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chunk::chunk_document;

    /// Bag-of-letters embedder: one dimension per ASCII letter.
    pub(crate) struct LetterEmbedder;

    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes() {
                        if c.is_ascii_lowercase() {
                            v[(c - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            1
        }
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("embedding service unavailable")
        }
    }

    fn chunks() -> Vec<PolicyChunk> {
        chunk_document(
            "Security Policy\nzzz zzz zzz.\n\naaa bbb.\n\nzzz aaa.",
            "sec.txt",
            250,
            0,
        )
    }

    #[test]
    fn vector_index_ranks_by_cosine() {
        let index = VectorIndex::build(Arc::new(LetterEmbedder), chunks(), 2).unwrap();
        assert_eq!(index.entries().len(), 3);
        let hits = index.similarity_search_with_scores("zzzz", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 >= hits[1].1);
        assert!(hits[0].0.display_text().contains("zzz zzz zzz."));
    }

    #[test]
    fn vector_index_exposes_only_scored_mode() {
        let index = VectorIndex::build(Arc::new(LetterEmbedder), chunks(), 8).unwrap();
        assert!(index.scored().is_some());
        assert!(index.unscored().is_none());
    }

    #[test]
    fn vector_index_propagates_embedder_errors() {
        assert!(VectorIndex::build(Arc::new(FailingEmbedder), chunks(), 8).is_err());
        let index = VectorIndex::from_entries(Arc::new(FailingEmbedder), Vec::new());
        assert!(index.similarity_search_with_scores("q", 3).is_err());
    }

    /// Batch embedding always fails; queries count their calls.
    struct QueryOnlyEmbedder {
        query_calls: std::sync::atomic::AtomicUsize,
        fail_queries: bool,
    }

    impl Embedder for QueryOnlyEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("batch path used for a query")
        }
        fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            self.query_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.fail_queries {
                bail!("embedding service unavailable");
            }
            let mut vectors = LetterEmbedder.embed(&[text.to_string()])?;
            Ok(vectors.remove(0))
        }
    }

    #[test]
    fn searches_embed_through_the_single_query_path() {
        let entries = VectorIndex::build(Arc::new(LetterEmbedder), chunks(), 8)
            .unwrap()
            .entries()
            .to_vec();

        let embedder = Arc::new(QueryOnlyEmbedder {
            query_calls: Default::default(),
            fail_queries: false,
        });
        let index = VectorIndex::from_entries(embedder.clone(), entries.clone());
        assert_eq!(index.similarity_search_with_scores("zzzz", 1).unwrap().len(), 1);
        assert_eq!(embedder.query_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let failing = Arc::new(QueryOnlyEmbedder {
            query_calls: Default::default(),
            fail_queries: true,
        });
        let index = VectorIndex::from_entries(failing.clone(), entries);
        assert!(index.similarity_search_with_scores("zzzz", 1).is_err());
        assert_eq!(failing.query_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn keyword_index_orders_by_term_overlap() {
        let index = KeywordIndex::new(chunks());
        let hits = index.similarity_search("aaa, zzz!", 5).unwrap();
        // "Security Policy" is in every chunk but is not a query term.
        let texts: Vec<String> = hits.iter().map(|f| f.display_text()).collect();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].ends_with("zzz aaa."));
        assert!(index.unscored().is_some());
        assert!(index.scored().is_none());
    }

    #[test]
    fn keyword_index_ignores_blank_queries() {
        let index = KeywordIndex::new(chunks());
        assert!(index.similarity_search("  ?! ", 5).unwrap().is_empty());
    }
}
