//! Search provider capabilities.
//!
//! A provider may answer similarity queries with relevance scores, without
//! them, or both. Each mode is its own trait; [`SearchProvider`] advertises
//! which ones an implementation supports and [`RetrievalMode::select`]
//! applies the preference order (scored first).
//!
//! ```rust
//! use anyhow::Result;
//! use docusec_core::fragment::Fragment;
//! use docusec_core::provider::{SearchProvider, SimilaritySearch};
//!
//! struct Fixed;
//!
//! impl SimilaritySearch for Fixed {
//!     fn similarity_search(&self, query: &str, _k: usize) -> Result<Vec<Fragment>> {
//!         Ok(vec![Fragment::text(format!("match: {query}"))])
//!     }
//! }
//!
//! impl SearchProvider for Fixed {
//!     fn unscored(&self) -> Option<&dyn SimilaritySearch> {
//!         Some(self)
//!     }
//! }
//! ```

use anyhow::Result;

use crate::fragment::Fragment;

/// Unscored retrieval: fragments in provider-chosen order.
pub trait SimilaritySearch {
    fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Fragment>>;
}

/// Scored retrieval: `(fragment, relevance)` pairs, higher is more relevant.
pub trait ScoredSimilaritySearch {
    fn similarity_search_with_scores(&self, query: &str, k: usize)
        -> Result<Vec<(Fragment, f64)>>;
}

/// A similarity search service exposing one or both retrieval modes.
pub trait SearchProvider {
    fn scored(&self) -> Option<&dyn ScoredSimilaritySearch> {
        None
    }

    fn unscored(&self) -> Option<&dyn SimilaritySearch> {
        None
    }
}

/// The retrieval mode chosen for a provider.
pub enum RetrievalMode<'a> {
    Scored(&'a dyn ScoredSimilaritySearch),
    Unscored(&'a dyn SimilaritySearch),
}

impl<'a> RetrievalMode<'a> {
    /// Scored mode if available, otherwise unscored, otherwise `None`.
    pub fn select(provider: &'a dyn SearchProvider) -> Option<Self> {
        provider
            .scored()
            .map(RetrievalMode::Scored)
            .or_else(|| provider.unscored().map(RetrievalMode::Unscored))
    }

    /// Retrieve up to `limit` fragments for `query`, most relevant first.
    ///
    /// `k` is the candidate budget passed to the provider. Scored results
    /// are sorted by descending score with a stable sort, so equal scores
    /// keep the provider's order.
    pub fn top_fragments(&self, query: &str, k: usize, limit: usize) -> Result<Vec<Fragment>> {
        match self {
            RetrievalMode::Scored(search) => {
                let mut scored = search.similarity_search_with_scores(query, k)?;
                // NaN ranks last.
                scored.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));
                Ok(scored.into_iter().take(limit).map(|(f, _)| f).collect())
            }
            RetrievalMode::Unscored(search) => {
                let mut fragments = search.similarity_search(query, k)?;
                fragments.truncate(limit);
                Ok(fragments)
            }
        }
    }
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}
