//! Policy-aware document chunker.
//!
//! Splits a policy document into [`PolicyChunk`]s tagged with the policy
//! they came from. A single upload often bundles several policies, so the
//! chunker first cuts the text into policy sections, then paragraphs, then
//! size-bounded windows.
//!
//! # Algorithm
//!
//! 1. The first non-blank line is the first policy title.
//! 2. Every later line containing "policy" (any case) opens a new section
//!    and becomes its title.
//! 3. Each section body is split into paragraphs on blank lines.
//! 4. Paragraphs longer than `max_tokens × 4` chars are split at whitespace
//!    into windows that overlap by up to `overlap_tokens × 4` chars.
//! 5. Each chunk's text is `"{title}\n\n{piece}"`; a section without a body
//!    yields one chunk holding just its title.
//!
//! # Example
//!
//! ```rust
//! use docusec_core::chunk::chunk_document;
//!
//! let text = "Privacy Policy\nParagraph A1.\n\nParagraph A2.\nSecurity Policy\nParagraph B1.";
//! let chunks = chunk_document(text, "policies.txt", 250, 50);
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].text, "Security Policy\n\nParagraph B1.");
//! assert_eq!(chunks[2].policy(), Some("Security Policy"));
//! ```

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::PolicyChunk;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into policy-tagged chunks.
///
/// `source` is recorded in each chunk's metadata (usually the file name).
pub fn chunk_document(
    text: &str,
    source: &str,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<PolicyChunk> {
    let max_chars = (max_tokens * CHARS_PER_TOKEN).max(1);
    let overlap_chars = (overlap_tokens * CHARS_PER_TOKEN).min(max_chars / 2);

    let mut chunks = Vec::new();
    for (title, body) in split_policy_sections(text) {
        if body.iter().all(|l| l.is_empty()) {
            chunks.push(make_chunk(&title, &title, source));
            continue;
        }
        let joined = body.join("\n");
        for paragraph in joined.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            for piece in split_paragraph(paragraph, max_chars, overlap_chars) {
                let text = format!("{}\n\n{}", title, piece);
                chunks.push(make_chunk(text.trim(), &title, source));
            }
        }
    }
    chunks
}

/// Cut the document into `(title, body lines)` sections.
fn split_policy_sections(text: &str) -> Vec<(String, Vec<String>)> {
    let mut sections = Vec::new();
    let mut title: Option<String> = None;
    let mut body: Vec<String> = Vec::new();

    for line in text.lines() {
        let stripped = line.trim();
        if title.is_none() {
            if !stripped.is_empty() {
                title = Some(stripped.to_string());
            }
            continue;
        }
        if stripped.to_lowercase().contains("policy") {
            if let Some(prev) = title.replace(stripped.to_string()) {
                sections.push((prev, std::mem::take(&mut body)));
            }
        } else {
            body.push(stripped.to_string());
        }
    }

    if let Some(t) = title {
        sections.push((t, body));
    }
    sections
}

/// Split a paragraph into whitespace-aligned windows of at most
/// `max_chars`, carrying `overlap_chars` of trailing words forward.
///
/// A single word longer than `max_chars` becomes its own window.
fn split_paragraph(paragraph: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let words: Vec<&str> = paragraph.split_whitespace().collect();
    let mut windows = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in words {
        let word_len = word.chars().count();
        let added = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + added > max_chars && !current.is_empty() {
            windows.push(current.join(" "));
            // Keep trailing words up to the overlap budget.
            let mut kept: Vec<&str> = Vec::new();
            let mut kept_len = 0usize;
            for w in current.iter().rev() {
                let l = w.chars().count() + usize::from(!kept.is_empty());
                if kept_len + l > overlap_chars || kept_len + l + word_len + 1 > max_chars {
                    break;
                }
                kept.push(*w);
                kept_len += l;
            }
            kept.reverse();
            current = kept;
            current_len = kept_len;
        }
        current_len += if current.is_empty() { word_len } else { word_len + 1 };
        current.push(word);
    }

    if !current.is_empty() {
        windows.push(current.join(" "));
    }
    windows
}

fn make_chunk(text: &str, policy: &str, source: &str) -> PolicyChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let mut metadata = Map::new();
    metadata.insert("policy".into(), Value::String(policy.to_string()));
    metadata.insert("source".into(), Value::String(source.to_string()));

    PolicyChunk {
        id: Uuid::new_v4().to_string(),
        text: text.to_string(),
        hash,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_policies_into_paragraphs() {
        let text = "Privacy Policy\nParagraph A1.\n\nParagraph A2.\nSecurity Policy\nParagraph B1.";
        let chunks = chunk_document(text, "doc.txt", 250, 50);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Privacy Policy\n\nParagraph A1.",
                "Privacy Policy\n\nParagraph A2.",
                "Security Policy\n\nParagraph B1.",
            ]
        );
        let policies: Vec<Option<&str>> = chunks.iter().map(|c| c.policy()).collect();
        assert_eq!(
            policies,
            vec![
                Some("Privacy Policy"),
                Some("Privacy Policy"),
                Some("Security Policy")
            ]
        );
        assert!(chunks.iter().all(|c| c.metadata["source"] == "doc.txt"));
    }

    #[test]
    fn title_only_section_becomes_chunk() {
        let chunks = chunk_document("Acceptable Use Policy", "a.txt", 250, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Acceptable Use Policy");
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let chunks = chunk_document("\n\n  \nHandbook\nBe nice.", "h.txt", 250, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Handbook\n\nBe nice.");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_document("", "e.txt", 250, 50).is_empty());
        assert!(chunk_document(" \n \n", "e.txt", 250, 50).is_empty());
    }

    #[test]
    fn long_paragraph_is_windowed_with_overlap() {
        let words: Vec<String> = (0..60).map(|i| format!("word{:02}", i)).collect();
        let paragraph = words.join(" ");
        // 10 tokens = 40 chars per window, 2 tokens = 8 chars overlap.
        let windows = split_paragraph(&paragraph, 40, 8);
        assert!(windows.len() > 1);
        for w in &windows {
            assert!(w.chars().count() <= 40, "window too long: {}", w);
        }
        // Each window after the first starts with the last word of the previous.
        for pair in windows.windows(2) {
            let last = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].starts_with(last));
        }
        // Every word survives.
        for w in &words {
            assert!(windows.iter().any(|win| win.contains(w.as_str())));
        }
    }

    #[test]
    fn oversized_word_stands_alone() {
        let long = "x".repeat(50);
        let windows = split_paragraph(&format!("a {} b", long), 10, 0);
        assert_eq!(windows, vec!["a".to_string(), long, "b".to_string()]);
    }

    #[test]
    fn hashes_are_deterministic() {
        let a = chunk_document("Policy\nSame text.", "x", 250, 0);
        let b = chunk_document("Policy\nSame text.", "x", 250, 0);
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
    }
}
