//! # DocuSec CLI (`docusec`)
//!
//! ## Usage
//!
//! ```bash
//! docusec --config ./config/docusec.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docusec init` | Create the SQLite database and schema |
//! | `docusec controls import <csv>` | Import framework controls |
//! | `docusec controls list` | List stored controls |
//! | `docusec frameworks list` | List available frameworks |
//! | `docusec frameworks index` | Build a clause index per framework |
//! | `docusec ingest <paths..> --name <n>` | Index policy documents under a name |
//! | `docusec indexes` | List saved indexes |
//! | `docusec map` | Literal control matching against documents |
//! | `docusec coverage` | Supporting excerpts per control |
//! | `docusec ask "<question>"` | Answer a question from an index |
//! | `docusec serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docusec::report::PolicySource;
use docusec::{config, controls, frameworks, ingest, migrate, report, server};

/// DocuSec: map compliance framework controls to supporting policy text.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docusec.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docusec",
    about = "DocuSec: compliance control coverage for policy documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docusec.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage stored framework controls.
    Controls {
        #[command(subcommand)]
        action: ControlsAction,
    },

    /// List frameworks or build their clause indexes.
    Frameworks {
        #[command(subcommand)]
        action: FrameworksAction,
    },

    /// Chunk and index policy documents, saving the index under a name.
    ///
    /// Directories are scanned with `[ingest].include_globs`; files named
    /// explicitly are always read.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Index name (letters, digits, `_` and `-`).
        #[arg(long)]
        name: String,
    },

    /// List saved indexes.
    Indexes,

    /// Report which controls appear verbatim (case-insensitive) in documents.
    Map {
        /// Framework title, as imported.
        #[arg(long)]
        framework: String,

        /// Files or directories to check.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Find the best supporting policy excerpts for every control of a framework.
    Coverage {
        /// Framework title, as imported.
        #[arg(long)]
        framework: String,

        /// Saved index to search.
        #[arg(long)]
        index: Option<String>,

        /// Documents to ingest for this run instead of a saved index.
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Candidate budget per control (defaults to `[retrieval].candidate_k`,
        /// at least 1).
        #[arg(long)]
        k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from a saved index using the configured LLM.
    Ask {
        question: String,

        /// Saved index to search.
        #[arg(long)]
        index: String,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ControlsAction {
    /// Import controls from a CSV file with `framework_title`,
    /// `control_number` and `control_language` columns.
    Import { path: PathBuf },
    /// List stored controls.
    List {
        #[arg(long)]
        framework: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FrameworksAction {
    /// List seed frameworks and any imported ones.
    List,
    /// Split stored controls into clauses and save one index per framework.
    Index,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Controls { action } => match action {
            ControlsAction::Import { path } => controls::run_import(&cfg, &path).await?,
            ControlsAction::List { framework, json } => {
                controls::run_list(&cfg, framework.as_deref(), json).await?
            }
        },
        Commands::Frameworks { action } => match action {
            FrameworksAction::List => frameworks::run_list(&cfg).await?,
            FrameworksAction::Index => frameworks::run_index(&cfg).await?,
        },
        Commands::Ingest { paths, name } => ingest::run_ingest(&cfg, &paths, &name).await?,
        Commands::Indexes => ingest::run_list_indexes(&cfg)?,
        Commands::Map { framework, paths } => report::run_map(&cfg, &framework, &paths).await?,
        Commands::Coverage {
            framework,
            index,
            docs,
            k,
            json,
        } => {
            let source = PolicySource::from_args(index, docs)?;
            report::run_coverage(&cfg, &framework, source, k, json).await?;
        }
        Commands::Ask { question, index } => report::run_ask(&cfg, &question, &index).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
