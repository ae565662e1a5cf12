//! The documentation search & context injection engine.
//!
//! An [`Engine`] is constructed once with its dependencies injected (index
//! store, embedding provider, relevance judge, document store) and shared
//! by reference across request handlers. There are no process-wide
//! singletons.

pub mod assemble;
pub mod providers;
pub mod retrieve;
pub mod validate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use docdex_core::config::{EngineConfig, MAX_RESULTS_CEILING, MAX_TOKENS_CEILING};
use docdex_core::error::{EngineError, Result};
use docdex_core::traits::{DocumentStore, EmbeddingProvider, RelevanceJudge};
use docdex_core::types::{Candidate, ContextBundle, ProjectId, ValidatedCandidate};
use docdex_index::IndexStore;

use crate::assemble::ContextAssembler;
use crate::retrieve::HybridRetriever;
use crate::validate::ValidatorPool;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub project_id: ProjectId,
    pub query: String,
    pub file_types: Option<Vec<String>>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub project_id: ProjectId,
    pub current_file: Option<String>,
    pub query: String,
    pub max_tokens: Option<usize>,
    /// Overall request deadline; validations in flight past it are
    /// fail-closed.
    pub deadline: Option<Instant>,
}

pub struct Engine {
    config: EngineConfig,
    index: Arc<IndexStore>,
    document_store: Arc<dyn DocumentStore>,
    retriever: HybridRetriever,
    validators: ValidatorPool,
    assembler: ContextAssembler,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        index: Arc<IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        judge: Arc<dyn RelevanceJudge>,
        document_store: Arc<dyn DocumentStore>,
    ) -> Self {
        let retriever = HybridRetriever::new(
            Arc::clone(&index),
            embedder,
            config.lexical_weight,
            config.vector_weight,
        );
        let validators = ValidatorPool::new(
            judge,
            config.validation.fanout,
            Duration::from_millis(config.validation.timeout_ms),
        );
        Self {
            config,
            index,
            document_store,
            retriever,
            validators,
            assembler: ContextAssembler::default(),
        }
    }

    /// Ranked candidates for a query, without relevance validation.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Candidate>> {
        require_query(&request.query)?;
        self.ensure_indexed(&request.project_id).await?;
        let limit = request
            .max_results
            .unwrap_or(self.config.max_results_default)
            .clamp(1, MAX_RESULTS_CEILING);
        self.retriever
            .retrieve(
                &request.project_id,
                &request.query,
                request.file_types.as_deref(),
                None,
                limit,
            )
            .await
    }

    /// Full pipeline: retrieve, validate each candidate, pack the kept
    /// ones into the token budget.
    pub async fn get_context(&self, request: &ContextRequest) -> Result<ContextBundle> {
        require_query(&request.query)?;
        self.ensure_indexed(&request.project_id).await?;
        let max_tokens = request
            .max_tokens
            .unwrap_or(self.config.max_tokens_default)
            .clamp(1, MAX_TOKENS_CEILING);

        let candidates = self
            .retriever
            .retrieve(
                &request.project_id,
                &request.query,
                None,
                request.current_file.as_deref(),
                self.config.max_results_default,
            )
            .await?;
        let validated = self
            .validators
            .validate(&request.query, candidates, request.deadline)
            .await;
        Ok(self.assembler.assemble(validated, max_tokens))
    }

    /// Judge an externally supplied candidate list. Output order matches
    /// input order; the keep-set depends only on `{query, candidate}`.
    pub async fn validate_candidates(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<ValidatedCandidate>> {
        require_query(query)?;
        Ok(self.validators.validate(query, candidates, None).await)
    }

    /// Pull a project's documents from the document store and index them.
    /// Transient store failures are retried with doubling backoff; a store
    /// that stays down is the one hard failure this engine surfaces.
    pub async fn sync_project(&self, project_id: &ProjectId) -> Result<usize> {
        let documents = self.fetch_with_retry(project_id).await?;
        let mut indexed = 0usize;
        for document in &documents {
            self.index
                .upsert(document)
                .await
                .map_err(|e| EngineError::Internal(format!("index upsert: {e}")))?;
            indexed += 1;
        }
        tracing::info!(project_id = %project_id, documents = indexed, "project synced");
        Ok(indexed)
    }

    async fn ensure_indexed(&self, project_id: &ProjectId) -> Result<()> {
        if self.index.project_chunk_count(project_id) == 0 {
            self.sync_project(project_id).await?;
        }
        Ok(())
    }

    async fn fetch_with_retry(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<docdex_core::types::Document>> {
        let mut attempt = 0usize;
        loop {
            match self.document_store.fetch_documents(project_id).await {
                Ok(documents) => return Ok(documents),
                Err(e) => {
                    if attempt >= self.config.retry.max_retries {
                        return Err(EngineError::UpstreamUnavailable(format!(
                            "document store: {e}"
                        )));
                    }
                    let backoff =
                        Duration::from_millis(self.config.retry.backoff_ms << attempt);
                    tracing::warn!(
                        project_id = %project_id,
                        attempt,
                        "document store fetch failed, retrying in {backoff:?}: {e}"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn require_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(EngineError::InvalidInput("query must not be empty".into()));
    }
    Ok(())
}
