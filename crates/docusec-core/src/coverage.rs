//! Control coverage engine.
//!
//! For every control, queries a [`SearchProvider`] with the control's
//! language, keeps the [`EXCERPT_CAP`] most relevant fragments, and reduces
//! each to its best-matching sentence via [`extract_quote`].
//!
//! # Algorithm
//!
//! 1. Pick the retrieval mode: scored if the provider offers it, else
//!    unscored, else none.
//! 2. Query with `control_language` and the `max_candidates` budget.
//! 3. Scored: stable sort by descending score. Unscored: provider order.
//!    Take the first [`EXCERPT_CAP`].
//! 4. Canonicalize each fragment's text and extract the quote.
//!
//! A failed query only empties that control's excerpts. Output always has
//! one [`CoverageResult`] per input control, in input order.

use tracing::{debug, warn};

use crate::fragment::Fragment;
use crate::models::{Control, CoverageResult};
use crate::provider::{RetrievalMode, SearchProvider};
use crate::quote::extract_quote;

/// Maximum number of excerpts reported per control.
pub const EXCERPT_CAP: usize = 3;

/// Default candidate budget per control query.
pub const DEFAULT_MAX_CANDIDATES: usize = 8;

/// Match every control against the provider's index.
///
/// `provider` is `None` when no index is configured; every control then
/// gets an empty excerpt list.
pub fn check_coverage(
    provider: Option<&dyn SearchProvider>,
    controls: &[Control],
    max_candidates: usize,
) -> Vec<CoverageResult> {
    let mode = provider.and_then(RetrievalMode::select);
    if mode.is_none() {
        debug!(
            controls = controls.len(),
            "no search provider available; coverage will be empty"
        );
    }

    controls
        .iter()
        .map(|control| {
            let policy_excerpts = match &mode {
                Some(mode) => control_excerpts(mode, control, max_candidates),
                None => Vec::new(),
            };
            CoverageResult {
                framework_title: control.framework_title.clone(),
                control_number: control.control_number.clone(),
                control_language: control.control_language.clone(),
                policy_excerpts,
            }
        })
        .collect()
}

fn control_excerpts(
    mode: &RetrievalMode<'_>,
    control: &Control,
    max_candidates: usize,
) -> Vec<String> {
    match mode.top_fragments(&control.control_language, max_candidates, EXCERPT_CAP) {
        Ok(fragments) => fragments
            .iter()
            .map(|f| quote_fragment(&control.control_language, f))
            .collect(),
        Err(e) => {
            warn!(
                framework = %control.framework_title,
                control = %control.control_number,
                error = %e,
                "search provider query failed; no excerpts for this control"
            );
            Vec::new()
        }
    }
}

fn quote_fragment(control_language: &str, fragment: &Fragment) -> String {
    let canonical = fragment.canonical();
    extract_quote(control_language, &canonical.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ScoredSimilaritySearch, SimilaritySearch};
    use anyhow::{bail, Result};
    use serde_json::{json, Map};
    use std::cell::RefCell;

    fn control(number: &str, language: &str) -> Control {
        Control::new("ISO", number, language)
    }

    /// Echoes the query back, recording each call.
    struct EchoProvider {
        queries: RefCell<Vec<(String, usize)>>,
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                queries: RefCell::new(Vec::new()),
            }
        }
    }

    impl SimilaritySearch for EchoProvider {
        fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Fragment>> {
            self.queries.borrow_mut().push((query.to_string(), k));
            Ok(vec![Fragment::text(format!("match: {}", query))])
        }
    }

    impl SearchProvider for EchoProvider {
        fn unscored(&self) -> Option<&dyn SimilaritySearch> {
            Some(self)
        }
    }

    /// Returns a fixed number of fragments, unscored.
    struct ManyProvider(usize);

    impl SimilaritySearch for ManyProvider {
        fn similarity_search(&self, _query: &str, k: usize) -> Result<Vec<Fragment>> {
            Ok((0..self.0.min(k))
                .map(|i| Fragment::text(format!("Fragment {}.", i)))
                .collect())
        }
    }

    impl SearchProvider for ManyProvider {
        fn unscored(&self) -> Option<&dyn SimilaritySearch> {
            Some(self)
        }
    }

    /// Scored-only provider with fixed scores.
    struct ScoredProvider(Vec<f64>);

    impl ScoredSimilaritySearch for ScoredProvider {
        fn similarity_search_with_scores(
            &self,
            _query: &str,
            _k: usize,
        ) -> Result<Vec<(Fragment, f64)>> {
            Ok(self
                .0
                .iter()
                .map(|s| (Fragment::text(format!("score {}", s)), *s))
                .collect())
        }
    }

    impl SearchProvider for ScoredProvider {
        fn scored(&self) -> Option<&dyn ScoredSimilaritySearch> {
            Some(self)
        }
    }

    /// Fails for queries containing "fail".
    struct FlakyProvider;

    impl SimilaritySearch for FlakyProvider {
        fn similarity_search(&self, query: &str, _k: usize) -> Result<Vec<Fragment>> {
            if query.contains("fail") {
                bail!("connection reset");
            }
            Ok(vec![Fragment::text(query.to_string())])
        }
    }

    impl SearchProvider for FlakyProvider {
        fn unscored(&self) -> Option<&dyn SimilaritySearch> {
            Some(self)
        }
    }

    #[test]
    fn unscored_provider_round_trip() {
        let provider = EchoProvider::new();
        let controls = vec![control("1", "Requirement text")];
        let results = check_coverage(Some(&provider), &controls, 1);
        assert_eq!(
            results,
            vec![CoverageResult {
                framework_title: "ISO".into(),
                control_number: "1".into(),
                control_language: "Requirement text".into(),
                policy_excerpts: vec!["match: Requirement text".into()],
            }]
        );
        assert_eq!(
            *provider.queries.borrow(),
            vec![("Requirement text".to_string(), 1)]
        );
    }

    #[test]
    fn excerpt_count_is_min_of_results_and_cap() {
        let controls = vec![control("1", "Fragment")];
        for n in 1..=6 {
            let results = check_coverage(Some(&ManyProvider(n)), &controls, 10);
            assert_eq!(results[0].policy_excerpts.len(), n.min(EXCERPT_CAP));
        }
    }

    #[test]
    fn small_candidate_budget_limits_selection() {
        let controls = vec![control("1", "Fragment")];
        let results = check_coverage(Some(&ManyProvider(10)), &controls, 2);
        assert_eq!(results[0].policy_excerpts.len(), 2);
    }

    #[test]
    fn scored_mode_ranks_descending() {
        let provider = ScoredProvider(vec![0.1, 0.9, 0.2, 0.5, 0.8]);
        let controls = vec![control("1", "score")];
        let results = check_coverage(Some(&provider), &controls, 5);
        assert_eq!(
            results[0].policy_excerpts,
            vec!["score 0.9", "score 0.8", "score 0.5"]
        );
    }

    #[test]
    fn scored_ties_keep_provider_order() {
        struct Tied;
        impl ScoredSimilaritySearch for Tied {
            fn similarity_search_with_scores(
                &self,
                _q: &str,
                _k: usize,
            ) -> Result<Vec<(Fragment, f64)>> {
                Ok(vec![
                    (Fragment::text("first"), 0.5),
                    (Fragment::text("second"), 0.5),
                    (Fragment::text("top"), 0.7),
                    (Fragment::text("third"), 0.5),
                ])
            }
        }
        impl SearchProvider for Tied {
            fn scored(&self) -> Option<&dyn ScoredSimilaritySearch> {
                Some(self)
            }
        }
        let results = check_coverage(Some(&Tied), &[control("1", "x")], 4);
        assert_eq!(results[0].policy_excerpts, vec!["top", "first", "second"]);
    }

    #[test]
    fn provider_failure_is_isolated() {
        let controls = vec![control("A", "please fail"), control("B", "works fine")];
        let results = check_coverage(Some(&FlakyProvider), &controls, 4);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].control_number, "A");
        assert!(results[0].policy_excerpts.is_empty());
        assert_eq!(results[1].control_number, "B");
        assert_eq!(results[1].policy_excerpts, vec!["works fine"]);
    }

    #[test]
    fn missing_provider_yields_empty_excerpts() {
        let controls = vec![control("1", "a"), control("2", "b")];
        let results = check_coverage(None, &controls, 8);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.policy_excerpts.is_empty()));
        assert_eq!(results[1].control_number, "2");
    }

    #[test]
    fn provider_without_capabilities_yields_empty_excerpts() {
        struct Nothing;
        impl SearchProvider for Nothing {}
        let results = check_coverage(Some(&Nothing), &[control("1", "a")], 8);
        assert!(results[0].policy_excerpts.is_empty());
    }

    #[test]
    fn empty_control_list() {
        assert!(check_coverage(Some(&FlakyProvider), &[], 8).is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        struct Dupes;
        impl SimilaritySearch for Dupes {
            fn similarity_search(&self, _q: &str, _k: usize) -> Result<Vec<Fragment>> {
                Ok(vec![Fragment::text("Same."), Fragment::text("Same.")])
            }
        }
        impl SearchProvider for Dupes {
            fn unscored(&self) -> Option<&dyn SimilaritySearch> {
                Some(self)
            }
        }
        let results = check_coverage(Some(&Dupes), &[control("1", "same")], 8);
        assert_eq!(results[0].policy_excerpts, vec!["Same.", "Same."]);
    }

    #[test]
    fn empty_fragment_yields_empty_excerpt() {
        struct Blank;
        impl SimilaritySearch for Blank {
            fn similarity_search(&self, _q: &str, _k: usize) -> Result<Vec<Fragment>> {
                Ok(vec![Fragment::text(""), Fragment::text("Keys rotate yearly.")])
            }
        }
        impl SearchProvider for Blank {
            fn unscored(&self) -> Option<&dyn SimilaritySearch> {
                Some(self)
            }
        }
        let results = check_coverage(Some(&Blank), &[control("1", "keys rotate")], 8);
        assert_eq!(results[0].policy_excerpts, vec!["", "Keys rotate yearly."]);
    }

    #[test]
    fn quotes_come_from_metadata_when_content_is_empty() {
        struct MetaOnly;
        impl SimilaritySearch for MetaOnly {
            fn similarity_search(&self, _q: &str, _k: usize) -> Result<Vec<Fragment>> {
                let mut meta = Map::new();
                meta.insert(
                    "text".into(),
                    json!("Visitors sign in. Encryption keys rotate yearly."),
                );
                Ok(vec![
                    Fragment::with_metadata("", meta),
                    Fragment::Raw(json!({"metadata": {"page_content": "Raw text."}})),
                ])
            }
        }
        impl SearchProvider for MetaOnly {
            fn unscored(&self) -> Option<&dyn SimilaritySearch> {
                Some(self)
            }
        }
        let results = check_coverage(Some(&MetaOnly), &[control("1", "encryption keys rotate")], 8);
        assert_eq!(
            results[0].policy_excerpts,
            vec!["Encryption keys rotate yearly.", "Raw text."]
        );
    }

    #[test]
    fn coverage_is_idempotent() {
        let provider = ScoredProvider(vec![0.3, 0.6, 0.1, 0.6]);
        let controls = vec![control("1", "score 0.6"), control("2", "score 0.1")];
        let first = check_coverage(Some(&provider), &controls, 4);
        let second = check_coverage(Some(&provider), &controls, 4);
        assert_eq!(first, second);
    }
}
