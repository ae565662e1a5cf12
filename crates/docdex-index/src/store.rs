//! In-memory index keyed by project.
//!
//! Reads run concurrently; an upsert publishes the whole chunk set of a
//! document under a write lock, so readers never observe a half-written
//! entry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use docdex_core::config::ChunkingConfig;
use docdex_core::traits::EmbeddingProvider;
use docdex_core::types::{ChunkRecord, Document, DocumentId, ProjectId};

use crate::chunk::chunk_document;
use crate::tokenize::tokenize;

const COVERAGE_WEIGHT: f32 = 0.8;
const DENSITY_WEIGHT: f32 = 0.2;
const EXCERPT_MAX_CHARS: usize = 400;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The vector query mode is not available. Distinct from "no matches"
    /// so the retriever can degrade to lexical-only scoring.
    #[error("Vector backend unavailable")]
    VectorUnavailable,
}

/// One indexed chunk: lexical token form plus (optionally) its embedding.
///
/// `embedding_present=false` means this chunk participates in lexical
/// scoring only.
struct IndexEntry {
    chunk: ChunkRecord,
    lexical_tokens: Vec<String>,
    embedding: Vec<f32>,
    embedding_present: bool,
}

/// A scored hit from either query mode. `score` is normalized to `[0,1]`.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk: ChunkRecord,
    pub score: f32,
    pub excerpt: String,
}

pub struct IndexStore {
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    vector_enabled: bool,
    projects: RwLock<HashMap<ProjectId, HashMap<DocumentId, Vec<IndexEntry>>>>,
}

impl IndexStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            vector_enabled: true,
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// A store whose vector mode is disabled; `query_vector` reports
    /// `VectorUnavailable` and upserts skip embedding entirely.
    pub fn without_vector(embedder: Arc<dyn EmbeddingProvider>, chunking: ChunkingConfig) -> Self {
        Self {
            vector_enabled: false,
            ..Self::new(embedder, chunking)
        }
    }

    /// Index a document, replacing any previous version atomically.
    /// Returns the number of live chunks for the document afterwards.
    ///
    /// Re-upserting an unchanged `commit_version` is a no-op. Embeddings
    /// are computed before the write lock is taken.
    pub async fn upsert(&self, doc: &Document) -> anyhow::Result<usize> {
        if let Some(existing) = self.live_version(&doc.project_id, &doc.id) {
            if existing == doc.commit_version {
                return Ok(self.document_chunk_count(&doc.project_id, &doc.id));
            }
        }

        let chunks = chunk_document(doc, &self.chunking);
        let mut entries = Vec::with_capacity(chunks.len());
        let mut embedding_failed = false;
        for chunk in chunks {
            let lexical_tokens = tokenize(&chunk.content);
            let (embedding, embedding_present) = if self.vector_enabled && !embedding_failed {
                match self.embedder.embed(&chunk.content).await {
                    Ok(v) => (v, true),
                    Err(e) => {
                        tracing::warn!(
                            document_id = %doc.id,
                            "embedding unavailable, indexing lexical-only: {e}"
                        );
                        embedding_failed = true;
                        (Vec::new(), false)
                    }
                }
            } else {
                (Vec::new(), false)
            };
            entries.push(IndexEntry { chunk, lexical_tokens, embedding, embedding_present });
        }

        let count = entries.len();
        let mut projects = self.projects.write().unwrap_or_else(PoisonError::into_inner);
        projects
            .entry(doc.project_id.clone())
            .or_default()
            .insert(doc.id.clone(), entries);
        Ok(count)
    }

    /// Rank a project's chunks by term-frequency/coverage against the
    /// query text, tokenized exactly as at index time.
    pub fn query_lexical(&self, project_id: &ProjectId, text: &str, limit: usize) -> Vec<IndexHit> {
        let query_tokens = tokenize(text);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let query_set: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();

        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        let Some(documents) = projects.get(project_id) else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        for entries in documents.values() {
            for entry in entries {
                let score = lexical_score(&query_set, &entry.lexical_tokens);
                if score > 0.0 {
                    hits.push(IndexHit {
                        chunk: entry.chunk.clone(),
                        score,
                        excerpt: excerpt_around_match(&entry.chunk.content, &query_tokens),
                    });
                }
            }
        }
        sort_and_truncate(&mut hits, limit);
        hits
    }

    /// Rank by cosine similarity against stored embeddings. Only entries
    /// with an embedding participate.
    pub fn query_vector(
        &self,
        project_id: &ProjectId,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<IndexHit>, IndexError> {
        if !self.vector_enabled {
            return Err(IndexError::VectorUnavailable);
        }

        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        let Some(documents) = projects.get(project_id) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for entries in documents.values() {
            for entry in entries {
                if !entry.embedding_present {
                    continue;
                }
                let score = cosine_similarity(query_embedding, &entry.embedding).clamp(0.0, 1.0);
                if score > 0.0 {
                    hits.push(IndexHit {
                        chunk: entry.chunk.clone(),
                        score,
                        excerpt: head_excerpt(&entry.chunk.content),
                    });
                }
            }
        }
        sort_and_truncate(&mut hits, limit);
        Ok(hits)
    }

    /// Number of chunks currently live for a project.
    pub fn project_chunk_count(&self, project_id: &ProjectId) -> usize {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects
            .get(project_id)
            .map(|docs| docs.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn live_version(&self, project_id: &ProjectId, document_id: &DocumentId) -> Option<String> {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects
            .get(project_id)
            .and_then(|docs| docs.get(document_id))
            .and_then(|entries| entries.first())
            .map(|entry| entry.chunk.commit_version.clone())
    }

    fn document_chunk_count(&self, project_id: &ProjectId, document_id: &DocumentId) -> usize {
        let projects = self.projects.read().unwrap_or_else(PoisonError::into_inner);
        projects
            .get(project_id)
            .and_then(|docs| docs.get(document_id))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Coverage-dominant blend of distinct-term coverage and match density,
/// both in `[0,1]`, so the result is too.
fn lexical_score(query_set: &HashSet<&str>, entry_tokens: &[String]) -> f32 {
    if entry_tokens.is_empty() || query_set.is_empty() {
        return 0.0;
    }
    let mut matched: HashSet<&str> = HashSet::new();
    let mut occurrences = 0usize;
    for token in entry_tokens {
        if let Some(term) = query_set.get(token.as_str()) {
            matched.insert(*term);
            occurrences += 1;
        }
    }
    if matched.is_empty() {
        return 0.0;
    }
    let coverage = matched.len() as f32 / query_set.len() as f32;
    let density = (occurrences as f32 / entry_tokens.len() as f32).min(1.0);
    COVERAGE_WEIGHT * coverage + DENSITY_WEIGHT * density
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Deterministic ranking: score descending, then path, then start line.
fn sort_and_truncate(hits: &mut Vec<IndexHit>, limit: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.path.cmp(&b.chunk.path))
            .then_with(|| a.chunk.line_range.start.cmp(&b.chunk.line_range.start))
    });
    hits.truncate(limit);
}

/// Excerpt centered on the first query-term match, clamped to char
/// boundaries. Terms are tried in query order so the anchor is
/// deterministic.
fn excerpt_around_match(content: &str, query_tokens: &[String]) -> String {
    let lower = content.to_lowercase();
    let mut anchor = 0usize;
    for term in query_tokens {
        if let Some(pos) = lower.find(term.as_str()) {
            anchor = pos;
            break;
        }
    }
    let start = clamp_char_boundary(content, anchor.saturating_sub(EXCERPT_MAX_CHARS / 4));
    let end = clamp_char_boundary(content, (start + EXCERPT_MAX_CHARS).min(content.len()));
    let mut excerpt = content[start..end].trim().to_string();
    if start > 0 {
        excerpt.insert_str(0, "...");
    }
    if end < content.len() {
        excerpt.push_str("...");
    }
    excerpt
}

fn head_excerpt(content: &str) -> String {
    if content.len() <= EXCERPT_MAX_CHARS {
        return content.trim().to_string();
    }
    let end = clamp_char_boundary(content, EXCERPT_MAX_CHARS);
    format!("{}...", content[..end].trim())
}

fn clamp_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
