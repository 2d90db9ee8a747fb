//! Named index persistence under `[store].dir`.
//!
//! Layout: `{dir}/{name}/index.json`. Names are reduced to their final
//! path component and must match `[A-Za-z0-9_-]+`, so `"../PolicyB"`
//! is stored as `PolicyB`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use docusec_core::embedding::Embedder;
use docusec_core::store::{IndexSnapshot, PolicyIndex};
use docusec_core::validation::validate_policy_name;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    name: String,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: IndexSnapshot,
}

/// Reduce `name` to its last path component and validate it.
pub fn sanitize_name(name: &str) -> Result<String> {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    validate_policy_name(&base)?;
    Ok(base)
}

/// Index name for a framework's clause index, e.g. `"SOC 2"` → `framework-SOC_2`.
pub fn framework_index_name(framework_title: &str) -> String {
    let slug: String = framework_title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("framework-{}", slug)
}

pub fn save_index(dir: &Path, name: &str, index: &PolicyIndex) -> Result<PathBuf> {
    let name = sanitize_name(name)?;
    let index_dir = dir.join(&name);
    std::fs::create_dir_all(&index_dir)
        .with_context(|| format!("Failed to create {}", index_dir.display()))?;

    let persisted = PersistedIndex {
        name: name.clone(),
        created_at: Utc::now(),
        snapshot: index.snapshot(),
    };
    let path = index_dir.join(INDEX_FILE);
    let json = serde_json::to_vec(&persisted)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(name = %name, kind = index.kind(), chunks = index.len(), "index saved");
    Ok(path)
}

pub fn load_index(dir: &Path, name: &str, embedder: Arc<dyn Embedder>) -> Result<PolicyIndex> {
    let name = sanitize_name(name)?;
    let path = dir.join(&name).join(INDEX_FILE);
    let bytes =
        std::fs::read(&path).with_context(|| format!("No saved index named '{}'", name))?;
    let persisted: PersistedIndex = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let index = PolicyIndex::restore(persisted.snapshot, embedder);
    info!(name = %name, kind = index.kind(), chunks = index.len(), "index loaded");
    Ok(index)
}

/// Sorted names of saved indexes. A missing store directory lists nothing.
pub fn list_indexes(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
