//! Hybrid retrieval: lexical and vector query modes fused into one ranked
//! candidate list.

use std::collections::HashMap;
use std::sync::Arc;

use docdex_core::config::MAX_RESULTS_CEILING;
use docdex_core::error::{EngineError, Result};
use docdex_core::traits::EmbeddingProvider;
use docdex_core::types::{Candidate, ChunkId, ProjectId};
use docdex_index::{IndexError, IndexHit, IndexStore};

pub struct HybridRetriever {
    index: Arc<IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    lexical_weight: f32,
    vector_weight: f32,
}

impl HybridRetriever {
    pub fn new(
        index: Arc<IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        lexical_weight: f32,
        vector_weight: f32,
    ) -> Self {
        Self { index, embedder, lexical_weight, vector_weight }
    }

    /// Run both query modes concurrently and fuse the ranked lists.
    ///
    /// Embedding or vector-store unavailability degrades to lexical-only
    /// scoring; an empty query is rejected, not answered with nothing.
    pub async fn retrieve(
        &self,
        project_id: &ProjectId,
        query: &str,
        file_type_filter: Option<&[String]>,
        current_file: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        if query.trim().is_empty() {
            return Err(EngineError::InvalidInput("query must not be empty".into()));
        }
        let limit = limit.clamp(1, MAX_RESULTS_CEILING);
        // Overfetch so dedup and the file-type filter still leave enough
        // candidates to fill `limit`.
        let fetch = limit * 4;

        let lexical_arm = async { self.index.query_lexical(project_id, query, fetch) };
        let vector_arm = async {
            let embedding = match self.embedder.embed(query).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("query embedding unavailable, lexical-only retrieval: {e}");
                    return None;
                }
            };
            match self.index.query_vector(project_id, &embedding, fetch) {
                Ok(hits) => Some(hits),
                Err(IndexError::VectorUnavailable) => {
                    tracing::warn!("vector backend unavailable, lexical-only retrieval");
                    None
                }
            }
        };
        let (lexical_hits, vector_hits) = tokio::join!(lexical_arm, vector_arm);

        let mut fused = self.fuse(lexical_hits, vector_hits.unwrap_or_default());

        if let Some(filter) = file_type_filter {
            if !filter.is_empty() {
                fused.retain(|c| matches_file_type(&c.path, filter));
            }
        }

        sort_candidates(&mut fused, current_file);
        fused.truncate(limit);
        Ok(fused)
    }

    /// Merge by chunk id: a chunk hit by both modes gets the weighted
    /// fusion of its scores, a chunk hit by one mode keeps that score.
    fn fuse(&self, lexical: Vec<IndexHit>, vector: Vec<IndexHit>) -> Vec<Candidate> {
        let mut by_id: HashMap<ChunkId, Candidate> = HashMap::new();
        for hit in lexical {
            let candidate = by_id.entry(hit.chunk.chunk_id.clone()).or_insert_with(|| {
                candidate_from_hit(&hit)
            });
            // Duplicate lexical ids keep the higher score.
            if candidate.lexical_score.is_none_or(|s| hit.score > s) {
                candidate.lexical_score = Some(hit.score);
            }
        }
        for hit in vector {
            match by_id.get_mut(&hit.chunk.chunk_id) {
                Some(candidate) => {
                    if candidate.vector_score.is_none_or(|s| hit.score > s) {
                        candidate.vector_score = Some(hit.score);
                    }
                }
                None => {
                    let mut candidate = candidate_from_hit(&hit);
                    candidate.vector_score = Some(hit.score);
                    candidate.lexical_score = None;
                    by_id.insert(hit.chunk.chunk_id.clone(), candidate);
                }
            }
        }

        let mut candidates: Vec<Candidate> = by_id.into_values().collect();
        for candidate in &mut candidates {
            candidate.fused_score = self.fused_score(candidate.lexical_score, candidate.vector_score);
        }
        candidates
    }

    fn fused_score(&self, lexical: Option<f32>, vector: Option<f32>) -> f32 {
        match (lexical, vector) {
            (Some(l), Some(v)) => {
                let total = self.lexical_weight + self.vector_weight;
                if total == 0.0 {
                    0.0
                } else {
                    (self.lexical_weight * l + self.vector_weight * v) / total
                }
            }
            (Some(l), None) => l,
            (None, Some(v)) => v,
            (None, None) => 0.0,
        }
    }
}

fn candidate_from_hit(hit: &IndexHit) -> Candidate {
    Candidate {
        chunk_id: hit.chunk.chunk_id.clone(),
        path: hit.chunk.path.clone(),
        lexical_score: Some(hit.score),
        vector_score: None,
        fused_score: 0.0,
        excerpt: hit.excerpt.clone(),
        line_range: hit.chunk.line_range,
    }
}

fn matches_file_type(path: &str, file_types: &[String]) -> bool {
    file_types.iter().any(|ft| {
        let ft = ft.trim();
        if ft.is_empty() {
            return false;
        }
        if ft.starts_with('.') {
            path.ends_with(ft)
        } else {
            path.ends_with(&format!(".{ft}"))
        }
    })
}

/// Fused score descending; ties prefer the file currently being edited,
/// then path lexical order, then start line, so identical inputs always
/// produce identical orderings.
pub fn candidate_order(a: &Candidate, b: &Candidate, current_file: Option<&str>) -> std::cmp::Ordering {
    b.fused_score
        .partial_cmp(&a.fused_score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| {
            if let Some(current) = current_file {
                let a_current = a.path == current;
                let b_current = b.path == current;
                b_current.cmp(&a_current)
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.line_range.start.cmp(&b.line_range.start))
}

pub fn sort_candidates(candidates: &mut [Candidate], current_file: Option<&str>) {
    candidates.sort_by(|a, b| candidate_order(a, b, current_file));
}
