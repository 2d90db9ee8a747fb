//! Control clauses for framework-level indexes.
//!
//! Control text is often several requirements run together. Each control
//! is cut into atomic clauses so a framework index can point back at the
//! exact control (`section_id`) a clause came from.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Control, PolicyChunk};

fn clause_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.;\n]+").expect("valid clause regex"))
}

/// Split on runs of `.`, `;` and newlines, dropping blank clauses.
pub fn split_into_clauses(text: &str) -> Vec<String> {
    clause_boundary()
        .split(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Clause chunks per framework, in control order.
///
/// Each chunk carries `{framework, section_id}` metadata, where
/// `section_id` is the originating control number.
pub fn framework_chunks(controls: &[Control]) -> BTreeMap<String, Vec<PolicyChunk>> {
    let mut grouped: BTreeMap<String, Vec<PolicyChunk>> = BTreeMap::new();
    for control in controls {
        for clause in split_into_clauses(&control.control_language) {
            let mut metadata = Map::new();
            metadata.insert(
                "framework".into(),
                Value::String(control.framework_title.clone()),
            );
            metadata.insert(
                "section_id".into(),
                Value::String(control.control_number.clone()),
            );
            let hash = format!("{:x}", Sha256::digest(clause.as_bytes()));
            grouped
                .entry(control.framework_title.clone())
                .or_default()
                .push(PolicyChunk {
                    id: Uuid::new_v4().to_string(),
                    text: clause,
                    hash,
                    metadata,
                });
        }
    }
    grouped
}
