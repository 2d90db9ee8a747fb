//! Retrieval-augmented question answering.
//!
//! Retrieves the top fragments for a question, stuffs their text into a
//! single prompt, and hands it to a [`TextGenerator`]. Retrieval follows the
//! same capability preference as coverage checks (scored first).

use anyhow::{bail, Result};
use tracing::debug;

use crate::provider::{RetrievalMode, SearchProvider};

/// Fragments retrieved per question.
pub const DEFAULT_ANSWER_K: usize = 4;

const SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

/// A chat prompt: system instructions carrying the context, plus the
/// user's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// A text completion backend.
pub trait TextGenerator: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Build the stuffed prompt. Context pieces are separated by blank lines.
pub fn build_prompt(question: &str, context: &[String]) -> Prompt {
    Prompt {
        system: format!("{}{}", SYSTEM_TEMPLATE, context.join("\n\n")),
        user: question.to_string(),
    }
}

/// Answer `question` from the top `k` fragments of `provider`.
pub fn answer_query(
    provider: &dyn SearchProvider,
    generator: &dyn TextGenerator,
    question: &str,
    k: usize,
) -> Result<String> {
    let Some(mode) = RetrievalMode::select(provider) else {
        bail!("search provider supports no retrieval mode");
    };
    let context: Vec<String> = mode
        .top_fragments(question, k, k)?
        .iter()
        .map(|f| f.display_text())
        .collect();
    debug!(fragments = context.len(), "answering question");
    generator.complete(&build_prompt(question, &context))
}
