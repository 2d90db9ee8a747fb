//! Control store: compliance framework controls in SQLite.
//!
//! Controls arrive as CSV with `framework_title`, `control_number` and
//! `control_language` columns. Values are stored verbatim through bound
//! parameters; control text routinely says things like "create, modify,
//! and delete accounts", so it is not screened.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

use docusec_core::models::Control;

use crate::config::Config;
use crate::db;
use crate::migrate;

const REQUIRED_COLUMNS: [&str; 3] = ["framework_title", "control_number", "control_language"];

/// Insert controls in one transaction. Returns the number inserted.
pub async fn insert_controls(pool: &SqlitePool, controls: &[Control]) -> Result<usize> {
    if controls.is_empty() {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    for c in controls {
        sqlx::query(
            "INSERT INTO frameworks (framework_title, control_number, control_language) VALUES (?, ?, ?)",
        )
        .bind(&c.framework_title)
        .bind(&c.control_number)
        .bind(&c.control_language)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(controls.len())
}

/// Stored controls in insertion order, optionally restricted to one framework.
pub async fn fetch_controls(pool: &SqlitePool, framework: Option<&str>) -> Result<Vec<Control>> {
    let rows = match framework {
        Some(title) => {
            sqlx::query(
                "SELECT framework_title, control_number, control_language FROM frameworks \
                 WHERE framework_title = ? ORDER BY id",
            )
            .bind(title)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT framework_title, control_number, control_language FROM frameworks ORDER BY id",
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| Control {
            framework_title: row.get("framework_title"),
            control_number: row.get("control_number"),
            control_language: row.get("control_language"),
        })
        .collect())
}

/// Distinct framework titles with at least one stored control.
pub async fn list_framework_titles(pool: &SqlitePool) -> Result<Vec<String>> {
    let titles: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT framework_title FROM frameworks ORDER BY framework_title",
    )
    .fetch_all(pool)
    .await?;
    Ok(titles)
}

/// Parse CSV bytes into controls.
///
/// Rows missing any required column are skipped.
pub fn parse_controls_csv(bytes: &[u8]) -> Result<Vec<Control>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers = reader.headers().context("Failed to read CSV header")?.clone();

    let positions: Vec<Option<usize>> = REQUIRED_COLUMNS
        .iter()
        .map(|col| headers.iter().position(|h| h == *col))
        .collect();
    if positions.iter().any(Option::is_none) {
        warn!(
            header = ?headers.iter().collect::<Vec<_>>(),
            "CSV header lacks required columns; nothing imported"
        );
        return Ok(Vec::new());
    }

    let mut controls = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("Failed to read row {}", idx + 1))?;
        let fields: Option<Vec<&str>> = positions
            .iter()
            .map(|p| p.and_then(|i| row.get(i)))
            .collect();
        let Some(fields) = fields else {
            warn!(row = idx + 1, "skipping row with missing columns");
            continue;
        };
        controls.push(Control::new(fields[0], fields[1], fields[2]));
    }
    Ok(controls)
}

/// Parse and store a CSV upload. Returns the number of controls stored.
pub async fn store_csv(pool: &SqlitePool, bytes: &[u8]) -> Result<usize> {
    let controls = parse_controls_csv(bytes)?;
    insert_controls(pool, &controls).await
}

/// `docusec controls import <csv>`
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let inserted = store_csv(&pool, &bytes).await?;
    pool.close().await;

    info!(path = %path.display(), inserted, "controls imported");
    println!("Imported {} controls from {}", inserted, path.display());
    Ok(())
}

/// `docusec controls list`
pub async fn run_list(config: &Config, framework: Option<&str>, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let controls = fetch_controls(&pool, framework).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&controls)?);
        return Ok(());
    }
    if controls.is_empty() {
        println!("No controls found.");
        return Ok(());
    }
    for c in &controls {
        println!(
            "{:<16} {:<12} {}",
            c.framework_title, c.control_number, c.control_language
        );
    }
    Ok(())
}
