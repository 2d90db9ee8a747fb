//! Policy document discovery and loading from the local filesystem.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::extract::extract_text;

/// A document's extracted text, keyed by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub name: String,
    pub text: String,
}

/// Expand `paths` into the files to ingest.
///
/// Files named explicitly are always taken. Directories are walked and
/// filtered by `include_globs` (matched against the path relative to that
/// directory); VCS and build directories are skipped.
pub fn discover_documents(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&[
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ])?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Document path does not exist: {}", root.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();
            if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
                continue;
            }
            found.push(path.to_path_buf());
        }
        // Sort for deterministic ordering
        found.sort();
        debug!(root = %root.display(), files = found.len(), "scanned directory");
        files.extend(found);
    }
    Ok(files)
}

/// Read and extract every file. Files that fail extraction are skipped
/// with a warning; unreadable files are an error.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<PolicyDocument>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = file_name(path);
        match extract_text(&bytes, &name) {
            Ok(text) => documents.push(PolicyDocument { name, text }),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping document"),
        }
    }
    Ok(documents)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
