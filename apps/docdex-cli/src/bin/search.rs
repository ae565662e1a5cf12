//! One-shot search against a documentation directory.
//!
//! Usage: docdex-search <docs-dir> <query words...>

use std::sync::Arc;

use anyhow::{Context, Result};

use docdex_core::config::EngineConfig;
use docdex_engine::providers::{DirDocumentStore, HashEmbedder, OverlapJudge};
use docdex_engine::{Engine, SearchRequest};
use docdex_index::IndexStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let docs_dir = args
        .next()
        .context("usage: docdex-search <docs-dir> <query words...>")?;
    let query = args.collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        anyhow::bail!("usage: docdex-search <docs-dir> <query words...>");
    }

    let config = EngineConfig::load()?;
    let embedder = Arc::new(HashEmbedder::default());
    let index = Arc::new(IndexStore::new(embedder.clone(), config.chunking.clone()));
    let engine = Engine::new(
        config,
        index,
        embedder,
        Arc::new(OverlapJudge::default()),
        Arc::new(DirDocumentStore::new(docs_dir)),
    );

    let results = engine
        .search(&SearchRequest {
            project_id: "local".to_string(),
            query,
            file_types: None,
            max_results: None,
        })
        .await?;

    if results.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for (rank, candidate) in results.iter().enumerate() {
        println!(
            "{:>2}. {:.3}  {}:{}",
            rank + 1,
            candidate.fused_score,
            candidate.path,
            candidate.line_range
        );
        if let Some(line) = candidate.excerpt.lines().find(|l| !l.trim().is_empty()) {
            println!("      {}", line.trim());
        }
    }
    Ok(())
}
