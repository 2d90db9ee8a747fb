//! Core data models shared by the coverage engine, the indexes, and the
//! application crate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single requirement clause from a compliance framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub framework_title: String,
    /// Unique within its framework (e.g. `"A.5.1"`).
    pub control_number: String,
    /// The literal regulatory / control text.
    pub control_language: String,
}

impl Control {
    pub fn new(
        framework_title: impl Into<String>,
        control_number: impl Into<String>,
        control_language: impl Into<String>,
    ) -> Self {
        Self {
            framework_title: framework_title.into(),
            control_number: control_number.into(),
            control_language: control_language.into(),
        }
    }
}

/// A text fragment derived from a policy document at ingestion time.
///
/// `metadata` keys used by the pipeline: `policy` (policy title),
/// `section_id`, `framework`, and `source` (originating file name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyChunk {
    pub id: String,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PolicyChunk {
    pub fn policy(&self) -> Option<&str> {
        self.metadata.get("policy").and_then(Value::as_str)
    }

    pub fn section_id(&self) -> Option<&str> {
        self.metadata.get("section_id").and_then(Value::as_str)
    }
}

/// Distinct `policy` titles, in the order they first appear.
pub fn policy_titles(chunks: &[PolicyChunk]) -> Vec<&str> {
    let mut titles: Vec<&str> = Vec::new();
    for title in chunks.iter().filter_map(PolicyChunk::policy) {
        if !titles.contains(&title) {
            titles.push(title);
        }
    }
    titles
}

/// Number of distinct `section_id`s, i.e. controls behind a clause index.
pub fn section_count(chunks: &[PolicyChunk]) -> usize {
    chunks
        .iter()
        .filter_map(PolicyChunk::section_id)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Per-control output of the coverage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub framework_title: String,
    pub control_number: String,
    pub control_language: String,
    /// At most [`EXCERPT_CAP`](crate::coverage::EXCERPT_CAP) quotes, most relevant first.
    pub policy_excerpts: Vec<String>,
}
