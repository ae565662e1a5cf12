//! Offline provider implementations.
//!
//! Everywhere the engine takes an external capability (embedding,
//! relevance judgment, document store) these give it a deterministic,
//! model-free stand-in that works with no network and no weights on disk.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use twox_hash::XxHash64;

use docdex_core::traits::{DocumentStore, EmbeddingProvider, RelevanceJudge};
use docdex_core::types::{Document, Judgment, ProjectId};
use docdex_index::tokenize::tokenize;

/// Token-bucket hash embedding: each token lands in a hashed dimension
/// with a hash-derived weight, then the vector is unit-normalized.
/// Deterministic across runs, so index and query embeddings agree.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIM: usize = 256;

    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIM)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in tokenize(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

/// Keeps a candidate when enough distinct query terms appear in the
/// excerpt. A crude but deterministic relevance judge for offline use.
pub struct OverlapJudge {
    threshold: f32,
}

impl OverlapJudge {
    pub fn new(threshold: f32) -> Self {
        Self { threshold: threshold.clamp(0.0, 1.0) }
    }
}

impl Default for OverlapJudge {
    fn default() -> Self {
        Self::new(0.25)
    }
}

#[async_trait]
impl RelevanceJudge for OverlapJudge {
    async fn judge(
        &self,
        query: &str,
        excerpt: &str,
        document_path: &str,
    ) -> anyhow::Result<Judgment> {
        let query_tokens: std::collections::HashSet<String> =
            tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(Judgment {
                keep: false,
                reasoning: "query has no searchable terms".to_string(),
            });
        }
        let excerpt_tokens: std::collections::HashSet<String> =
            tokenize(excerpt).into_iter().collect();
        let matched = query_tokens.intersection(&excerpt_tokens).count();
        let overlap = matched as f32 / query_tokens.len() as f32;
        let keep = overlap >= self.threshold;
        Ok(Judgment {
            keep,
            reasoning: format!(
                "{matched}/{} query terms present in excerpt from {document_path}",
                query_tokens.len()
            ),
        })
    }
}

/// Serves every file under a directory as one project's documents.
/// `commit_version` is a content hash, so unchanged files re-upsert as
/// no-ops.
pub struct DirDocumentStore {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["md".into(), "txt".into(), "rst".into()],
        }
    }

    pub fn with_extensions(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self { root: root.into(), extensions }
    }
}

#[async_trait]
impl DocumentStore for DirDocumentStore {
    async fn fetch_documents(&self, project_id: &ProjectId) -> anyhow::Result<Vec<Document>> {
        if !self.root.is_dir() {
            anyhow::bail!("document root {} is not a directory", self.root.display());
        }
        let mut documents = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            if !self.extensions.iter().any(|e| e == ext) {
                continue;
            }
            let content = std::fs::read_to_string(path)?;
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            documents.push(Document {
                id: rel_str.clone(),
                project_id: project_id.clone(),
                path: rel_str,
                content: content.clone(),
                language: language_for_extension(ext),
                commit_version: content_hash(&content),
            });
        }
        Ok(documents)
    }
}

/// In-memory document store for tests and embedding into other processes.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<ProjectId, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: Document) {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        documents
            .entry(document.project_id.clone())
            .or_default()
            .push(document);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_documents(&self, project_id: &ProjectId) -> anyhow::Result<Vec<Document>> {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(documents.get(project_id).cloned().unwrap_or_default())
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = XxHash64::with_seed(0);
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn language_for_extension(ext: &str) -> Option<String> {
    match ext {
        "md" => Some("markdown".to_string()),
        "rst" => Some("restructured_text".to_string()),
        "txt" => Some("text".to_string()),
        _ => None,
    }
}
