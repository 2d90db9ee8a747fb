//! `docusec ingest` and `docusec indexes`.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::info;

use docusec_core::models::policy_titles;

use crate::config::Config;
use crate::documents::{discover_documents, load_documents};
use crate::embedding::create_embedder;
use crate::persist::{list_indexes, sanitize_name, save_index};
use crate::session::Indexer;

/// Chunk and index the documents under `paths`, saving the index as `name`.
pub async fn run_ingest(config: &Config, paths: &[PathBuf], name: &str) -> Result<()> {
    // Fail on a bad name before doing any work.
    let name = sanitize_name(name)?;

    let files = discover_documents(paths, &config.ingest)?;
    if files.is_empty() {
        bail!("No documents found under the given paths");
    }
    let documents = load_documents(&files)?;
    info!(files = files.len(), documents = documents.len(), "documents loaded");

    let indexer = Indexer::from_config(config, create_embedder(&config.embedding)?);
    let store_dir = config.store.dir.clone();
    let index_name = name.clone();
    let (chunks, kind, titles) = tokio::task::spawn_blocking(
        move || -> Result<(usize, &'static str, Vec<String>)> {
            let chunks = indexer.chunk(&documents);
            let titles = policy_titles(&chunks)
                .into_iter()
                .map(str::to_string)
                .collect();
            let index = indexer.build(chunks)?;
            save_index(&store_dir, &index_name, &index)?;
            Ok((index.len(), index.kind(), titles))
        },
    )
    .await??;

    println!(
        "Indexed {} documents as '{}' ({} chunks, {} index)",
        files.len(),
        name,
        chunks,
        kind
    );
    for title in &titles {
        println!("  {}", title);
    }
    Ok(())
}

/// `docusec indexes`
pub fn run_list_indexes(config: &Config) -> Result<()> {
    let names = list_indexes(&config.store.dir)?;
    if names.is_empty() {
        println!("No saved indexes in {}", config.store.dir.display());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
