//! Framework catalogue and per-framework clause indexes.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info, warn};

use docusec_core::clauses::framework_chunks;
use docusec_core::models::section_count;

use crate::config::Config;
use crate::controls::{fetch_controls, list_framework_titles};
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;
use crate::persist::{framework_index_name, save_index};
use crate::session::Indexer;

/// Offered when no seed file is configured or it cannot be used.
pub const DEFAULT_FRAMEWORKS: [&str; 3] = ["ISO 27001", "NIST 800-53", "SOC 2"];

/// Read a JSON list of framework names from `seed_path`.
///
/// A missing, empty, or malformed file yields [`DEFAULT_FRAMEWORKS`].
pub fn load_frameworks(seed_path: Option<&Path>) -> Vec<String> {
    let defaults = || DEFAULT_FRAMEWORKS.iter().map(|s| s.to_string()).collect();
    let Some(path) = seed_path else {
        return defaults();
    };
    let content = match std::fs::read_to_string(path) {
        Ok(c) if !c.trim().is_empty() => c,
        Ok(_) => return defaults(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no framework seed file");
            return defaults();
        }
    };
    match serde_json::from_str::<Vec<String>>(&content) {
        Ok(list) => list,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed framework seed file");
            defaults()
        }
    }
}

/// Seed frameworks followed by any imported framework not already listed.
pub async fn available_frameworks(pool: &SqlitePool, seed_path: Option<&Path>) -> Result<Vec<String>> {
    let mut frameworks = load_frameworks(seed_path);
    for title in list_framework_titles(pool).await? {
        if !frameworks.contains(&title) {
            frameworks.push(title);
        }
    }
    Ok(frameworks)
}

/// `docusec frameworks list`
pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let frameworks = available_frameworks(&pool, config.frameworks.seed_path.as_deref()).await?;
    pool.close().await;

    for name in frameworks {
        println!("{}", name);
    }
    Ok(())
}

/// `docusec frameworks index`: split every stored control into clauses and
/// save one index per framework.
pub async fn run_index(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let controls = fetch_controls(&pool, None).await?;
    pool.close().await;

    if controls.is_empty() {
        println!("No controls stored. Import some with `docusec controls import <csv>`.");
        return Ok(());
    }

    let embedder = create_embedder(&config.embedding)?;
    let indexer = Indexer::from_config(config, embedder);
    let store_dir = config.store.dir.clone();

    let saved = tokio::task::spawn_blocking(move || -> Result<Vec<(String, usize, usize)>> {
        let mut saved = Vec::new();
        for (framework, chunks) in framework_chunks(&controls) {
            let name = framework_index_name(&framework);
            let sections = section_count(&chunks);
            let index = indexer.build(chunks)?;
            save_index(&store_dir, &name, &index)?;
            saved.push((name, index.len(), sections));
        }
        Ok(saved)
    })
    .await??;

    for (name, clauses, controls) in &saved {
        info!(index = %name, clauses, controls, "framework index saved");
        println!("{:<32} {} clauses from {} controls", name, clauses, controls);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_seed_falls_back() {
        assert_eq!(load_frameworks(None), DEFAULT_FRAMEWORKS.to_vec());
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("seed.json");
        assert_eq!(load_frameworks(Some(&absent)), DEFAULT_FRAMEWORKS.to_vec());
    }

    #[test]
    fn empty_or_invalid_seed_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        fs::write(&seed, "").unwrap();
        assert_eq!(load_frameworks(Some(&seed)), DEFAULT_FRAMEWORKS.to_vec());
        fs::write(&seed, "{\"not\": \"a list\"}").unwrap();
        assert_eq!(load_frameworks(Some(&seed)), DEFAULT_FRAMEWORKS.to_vec());
    }

    #[test]
    fn seed_list_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        fs::write(&seed, r#"["PCI DSS", "HIPAA"]"#).unwrap();
        assert_eq!(load_frameworks(Some(&seed)), vec!["PCI DSS", "HIPAA"]);
    }

    #[tokio::test]
    async fn imported_frameworks_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect_path(&dir.path().join("d.sqlite")).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        crate::controls::insert_controls(
            &pool,
            &[
                docusec_core::models::Control::new("SOC 2", "CC1", "x"),
                docusec_core::models::Control::new("Internal", "I-1", "y"),
            ],
        )
        .await
        .unwrap();
        let all = available_frameworks(&pool, None).await.unwrap();
        assert_eq!(all, vec!["ISO 27001", "NIST 800-53", "SOC 2", "Internal"]);
    }
}
