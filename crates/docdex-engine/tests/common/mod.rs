#![allow(dead_code)]

use std::sync::Arc;

use docdex_core::config::EngineConfig;
use docdex_core::traits::{DocumentStore, RelevanceJudge};
use docdex_core::types::{Candidate, Document, LineRange};
use docdex_engine::providers::{HashEmbedder, MemoryDocumentStore, OverlapJudge};
use docdex_engine::Engine;
use docdex_index::IndexStore;

pub fn doc(id: &str, project: &str, path: &str, content: &str, version: &str) -> Document {
    Document {
        id: id.to_string(),
        project_id: project.to_string(),
        path: path.to_string(),
        content: content.to_string(),
        language: None,
        commit_version: if version.is_empty() { "v1".to_string() } else { version.to_string() },
    }
}

pub fn candidate(chunk_id: &str, path: &str, excerpt: &str, fused: f32) -> Candidate {
    Candidate {
        chunk_id: chunk_id.to_string(),
        path: path.to_string(),
        lexical_score: Some(fused),
        vector_score: None,
        fused_score: fused,
        excerpt: excerpt.to_string(),
        line_range: LineRange::new(1, 5),
    }
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.validation.timeout_ms = 200;
    config.retry.backoff_ms = 10;
    config
}

pub fn engine_with(
    document_store: Arc<dyn DocumentStore>,
    judge: Arc<dyn RelevanceJudge>,
    vector_enabled: bool,
) -> Engine {
    let config = test_config();
    let embedder = Arc::new(HashEmbedder::default());
    let index = if vector_enabled {
        Arc::new(IndexStore::new(embedder.clone(), config.chunking.clone()))
    } else {
        Arc::new(IndexStore::without_vector(embedder.clone(), config.chunking.clone()))
    };
    Engine::new(config, index, embedder, judge, document_store)
}

/// Engine over an in-memory store seeded with the given documents.
pub fn seeded_engine(documents: Vec<Document>, vector_enabled: bool) -> Engine {
    let store = MemoryDocumentStore::new();
    for document in documents {
        store.insert(document);
    }
    engine_with(Arc::new(store), Arc::new(OverlapJudge::default()), vector_enabled)
}
