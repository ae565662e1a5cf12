//! Stdio tool-protocol server over a local documentation directory.
//!
//! Logs go to stderr; stdout carries protocol responses only.

use std::sync::Arc;

use anyhow::Result;

use docdex_core::config::EngineConfig;
use docdex_engine::providers::{DirDocumentStore, HashEmbedder, OverlapJudge};
use docdex_engine::Engine;
use docdex_index::IndexStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let docs_dir = std::env::args().nth(1).unwrap_or_else(|| "docs".to_string());
    let config = EngineConfig::load()?;

    let embedder = Arc::new(HashEmbedder::default());
    let index = Arc::new(IndexStore::new(embedder.clone(), config.chunking.clone()));
    let engine = Arc::new(Engine::new(
        config,
        index,
        embedder,
        Arc::new(OverlapJudge::default()),
        Arc::new(DirDocumentStore::new(docs_dir)),
    ));

    tracing::info!("docdex serving tool protocol on stdio");
    docdex_server::serve(engine).await
}
