//! `docusec map`, `docusec coverage` and `docusec ask`.

use anyhow::{bail, Result};
use std::path::PathBuf;

use docusec_core::mapper::{group_controls, map_controls};
use docusec_core::models::{Control, CoverageResult};
use docusec_core::validation::validate_input;

use crate::config::Config;
use crate::controls::fetch_controls;
use crate::db;
use crate::documents::{discover_documents, load_documents};
use crate::embedding::create_embedder;
use crate::llm::create_generator;
use crate::migrate;
use crate::persist::load_index;
use crate::session::{Indexer, Session};

/// Where the policy text for a command comes from.
pub enum PolicySource {
    Index(String),
    Documents(Vec<PathBuf>),
}

impl PolicySource {
    pub fn from_args(index: Option<String>, docs: Vec<PathBuf>) -> Result<Self> {
        match (index, docs.is_empty()) {
            (Some(_), false) => bail!("Use either --index or --docs, not both"),
            (Some(name), true) => Ok(PolicySource::Index(name)),
            (None, false) => Ok(PolicySource::Documents(docs)),
            (None, true) => bail!("Provide --index <name> or --docs <paths..>"),
        }
    }
}

async fn framework_controls(config: &Config, framework: &str) -> Result<Vec<Control>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let controls = fetch_controls(&pool, Some(framework)).await?;
    pool.close().await;
    if controls.is_empty() {
        bail!("No controls stored for framework '{}'", framework);
    }
    Ok(controls)
}

/// Load a saved index or ingest documents into a fresh session.
async fn open_session(config: &Config, source: PolicySource) -> Result<Session> {
    let embedder = create_embedder(&config.embedding)?;
    match source {
        PolicySource::Index(name) => {
            let dir = config.store.dir.clone();
            let index =
                tokio::task::spawn_blocking(move || load_index(&dir, &name, embedder)).await??;
            Ok(Session::from_index(index))
        }
        PolicySource::Documents(paths) => {
            let files = discover_documents(&paths, &config.ingest)?;
            let documents = load_documents(&files)?;
            let indexer = Indexer::from_config(config, embedder);
            tokio::task::spawn_blocking(move || -> Result<Session> {
                let mut session = Session::new();
                session.ingest(&documents, &indexer)?;
                Ok(session)
            })
            .await?
        }
    }
}

/// Naive substring mapping of a framework's controls against documents.
pub async fn run_map(config: &Config, framework: &str, paths: &[PathBuf]) -> Result<()> {
    let controls = framework_controls(config, framework).await?;
    let files = discover_documents(paths, &config.ingest)?;
    let texts: Vec<String> = load_documents(&files)?
        .into_iter()
        .map(|d| d.text)
        .collect();

    let mapping = map_controls(&group_controls(&controls), &texts);
    let matched = mapping.get(framework).cloned().unwrap_or_default();
    println!(
        "{}: {} of {} controls found verbatim",
        framework,
        matched.len(),
        controls.len()
    );
    for id in matched {
        println!("  {}", id);
    }
    Ok(())
}

pub async fn run_coverage(
    config: &Config,
    framework: &str,
    source: PolicySource,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let controls = framework_controls(config, framework).await?;
    let session = open_session(config, source).await?;
    let k = k.unwrap_or(config.retrieval.candidate_k).max(1);

    let results =
        tokio::task::spawn_blocking(move || session.coverage(&controls, k)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_coverage(&results);
    }
    Ok(())
}

fn print_coverage(results: &[CoverageResult]) {
    let covered = results
        .iter()
        .filter(|r| !r.policy_excerpts.is_empty())
        .count();
    for r in results {
        println!("[{}] {}", r.control_number, r.control_language);
        if r.policy_excerpts.is_empty() {
            println!("    (no supporting excerpts)");
        }
        for excerpt in &r.policy_excerpts {
            println!("    > {}", excerpt.replace('\n', " "));
        }
        println!();
    }
    println!("{} of {} controls have supporting excerpts", covered, results.len());
}

/// Answer a question from a saved index.
pub async fn run_ask(config: &Config, question: &str, index: &str) -> Result<()> {
    validate_input(question)?;
    let session = open_session(config, PolicySource::Index(index.to_string())).await?;
    let generator = create_generator(&config.llm)?;
    let k = config.retrieval.answer_k;
    let question = question.to_string();

    let answer = tokio::task::spawn_blocking(move || {
        session.answer(generator.as_ref(), &question, k)
    })
    .await??;
    println!("{}", answer);
    Ok(())
}
