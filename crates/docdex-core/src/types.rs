//! Domain types shared by the index, retrieval, validation and assembly stages.

use serde::{Deserialize, Serialize};

pub type ProjectId = String;
pub type DocumentId = String;
pub type ChunkId = String;

/// A source document as handed over by the external document store.
///
/// Documents are immutable per `commit_version`: a new commit version is a
/// new logical document as far as indexing is concerned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub project_id: ProjectId,
    pub path: String,
    pub content: String,
    pub language: Option<String>,
    pub commit_version: String,
}

/// Inclusive 1-based line span inside a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A slice of a document that is independently indexed and retrieved.
///
/// `chunk_id` is globally unique; `document_id` + `line_range` resolve the
/// chunk back to its position in the parent document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub project_id: ProjectId,
    pub path: String,
    pub content: String,
    pub line_range: LineRange,
    pub commit_version: String,
}

/// A retrieved but not yet validated excerpt.
///
/// Scores are normalized to `[0,1]`. Either score may be absent when the
/// corresponding query mode did not produce the hit, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: ChunkId,
    pub path: String,
    pub lexical_score: Option<f32>,
    pub vector_score: Option<f32>,
    pub fused_score: f32,
    pub excerpt: String,
    pub line_range: LineRange,
}

/// A candidate after the keep/discard relevance judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub keep: bool,
    pub reasoning: String,
    pub validation_latency_ms: u64,
}

/// Where a piece of assembled context came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub document_path: String,
    pub line_range: LineRange,
    pub relevance_score: f32,
    pub summary: String,
}

/// The packed output of a `get_context` request.
///
/// Invariant: `tokens_used` never exceeds the requested budget. Empty
/// `sources` means no relevant context was found, which is a success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub context_text: String,
    pub sources: Vec<SourceAttribution>,
    pub tokens_used: usize,
}

/// Outcome of a single relevance judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub keep: bool,
    pub reasoning: String,
}
