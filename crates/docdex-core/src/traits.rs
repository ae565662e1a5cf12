use async_trait::async_trait;

use crate::types::{Document, Judgment, ProjectId};

/// External embedding capability, shared by index and query time.
///
/// Failures degrade retrieval to lexical-only scoring; they never fail a
/// request.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// External textual-inference service used as a black-box relevance
/// classifier: one excerpt per call, never batched.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    async fn judge(&self, query: &str, excerpt: &str, document_path: &str)
        -> anyhow::Result<Judgment>;
}

/// External document store. The engine never reads raw files or talks to
/// version control itself.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_documents(&self, project_id: &ProjectId) -> anyhow::Result<Vec<Document>>;
}

/// Pluggable token counting for the context assembler.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, content: &str) -> usize;
}

/// Approximate GPT-style tokenization: `ceil(len / 4)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count_tokens(&self, content: &str) -> usize {
        content.len().div_ceil(4)
    }
}
