//! Verbatim quote extraction.
//!
//! Given a control's text and a retrieved policy fragment, returns the one
//! sentence of the fragment that is lexically closest to the control. The
//! result is always a slice of the source text, never synthesized.
//!
//! # Similarity
//!
//! Sentences are scored with the Ratcliff/Obershelp ratio `2·M / T`, where
//! `T` is the combined length of both strings (in chars) and `M` the number
//! of chars in matching blocks. Blocks are found by taking the longest
//! common block, then recursing on the pieces to its left and right.
//! For sequences of 200+ chars, elements occurring more than `1% + 1` times
//! are "popular" and cannot seed a block (they may still extend one).
//!
//! ```rust
//! use docusec_core::quote::extract_quote;
//!
//! let quote = extract_quote(
//!     "Requirement text",
//!     "Unrelated sentence. Requirement text matches closely.",
//! );
//! assert_eq!(quote, "Requirement text matches closely.");
//! ```

use std::collections::HashMap;

/// Sequences at least this long get the popular-element heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Return the sentence of `fragment_text` most similar to `control_language`.
///
/// Comparison is case-insensitive. Ties go to the earliest sentence. When
/// no sentence shares anything with the control (ratio 0), the whole
/// trimmed fragment is returned; an empty fragment comes back unchanged.
pub fn extract_quote(control_language: &str, fragment_text: &str) -> String {
    let control = control_language.to_lowercase();
    let mut best = fragment_text.trim();
    let mut best_ratio = 0.0;

    for sentence in split_sentences(fragment_text) {
        let ratio = similarity_ratio(&control, &sentence.to_lowercase());
        if ratio > best_ratio {
            best_ratio = ratio;
            best = sentence.trim();
        }
    }

    best.to_string()
}

/// Split on `.`, `!` or `?` followed by whitespace.
///
/// The punctuation stays with its sentence and the whitespace run is
/// dropped. Text without such a boundary is returned as one piece.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&text[start..i]);
            let mut end = i + c.len_utf8();
            while let Some(&(j, d)) = chars.peek() {
                if !d.is_whitespace() {
                    break;
                }
                end = j + d.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    sentences.push(&text[start..]);
    sentences
}

/// Sequence-matching similarity ratio in `[0.0, 1.0]`.
///
/// Two empty strings are identical (`1.0`).
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = BlockMatcher::new(&a, &b).matched_len();
    2.0 * matched as f64 / total as f64
}

struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each char of `b`, popular chars removed.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }
        Self { a, b, b2j }
    }

    /// Total length of all matching blocks.
    fn matched_len(&self) -> usize {
        let mut total = 0;
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` inside the given window.
    ///
    /// Among equally long blocks, the one starting earliest in `a` wins,
    /// then earliest in `b`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
        // j -> length of the block ending at (i - 1, j)
        let mut run_len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next_run: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| run_len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_run.insert(j, k);
                    if k > best_k {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_k = k;
                    }
                }
            }
            run_len = next_run;
        }

        // Popular chars never seed a block but may extend one.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_k += 1;
        }
        while best_i + best_k < ahi
            && best_j + best_k < bhi
            && self.a[best_i + best_k] == self.b[best_j + best_k]
        {
            best_k += 1;
        }

        (best_i, best_j, best_k)
    }
}
