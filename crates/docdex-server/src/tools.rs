//! The tool protocol spoken to agent clients.
//!
//! A closed enum over the three operations, matched exhaustively. Input
//! validation happens here, before any engine component runs; violations
//! surface as protocol error codes, not as errors from deeper layers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use docdex_core::config::{MAX_RESULTS_CEILING, MAX_TOKENS_CEILING};
use docdex_core::error::EngineError;
use docdex_core::types::{Candidate, LineRange};
use docdex_engine::{ContextRequest, Engine, SearchRequest};

pub const CODE_INVALID_INPUT: &str = "invalid_input";
pub const CODE_UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
pub const CODE_INTERNAL: &str = "internal";

#[derive(Debug, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    SearchDocumentation(SearchArgs),
    GetContext(ContextArgs),
    ValidateRelevance(ValidateArgs),
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub project_id: String,
    pub query: String,
    #[serde(default)]
    pub file_types: Option<Vec<String>>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ContextArgs {
    pub project_id: String,
    #[serde(default)]
    pub current_file: Option<String>,
    pub query: String,
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateArgs {
    pub query: String,
    pub results: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub file_path: String,
    pub content_snippet: String,
    pub relevance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_numbers: Option<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchContent {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SourceItem {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_range: Option<String>,
    pub relevance: f32,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ContextContent {
    pub context: String,
    pub sources: Vec<SourceItem>,
    pub tokens_used: usize,
}

#[derive(Debug, Serialize)]
pub struct ValidateContent {
    pub filtered_results: Vec<SearchResultItem>,
    pub reasoning: String,
}

#[derive(Debug, Serialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    pub fn ok(content: serde_json::Value) -> Self {
        Self { success: true, content: Some(content), error: None }
    }

    pub fn fail(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(ToolError { code: code.to_string(), message: message.into() }),
        }
    }
}

#[derive(Clone)]
pub struct ToolHandler {
    engine: Arc<Engine>,
}

impl ToolHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub async fn handle(&self, request: ToolRequest) -> ToolResponse {
        let outcome = match request {
            ToolRequest::SearchDocumentation(args) => self.search_documentation(args).await,
            ToolRequest::GetContext(args) => self.get_context(args).await,
            ToolRequest::ValidateRelevance(args) => self.validate_relevance(args).await,
        };
        match outcome {
            Ok(content) => ToolResponse::ok(content),
            Err(e) => e,
        }
    }

    async fn search_documentation(
        &self,
        args: SearchArgs,
    ) -> Result<serde_json::Value, ToolResponse> {
        validate_project_and_query(&args.project_id, &args.query)?;
        if let Some(n) = args.max_results {
            if n == 0 || n > MAX_RESULTS_CEILING {
                return Err(ToolResponse::fail(
                    CODE_INVALID_INPUT,
                    format!("max_results must be in 1..={MAX_RESULTS_CEILING}"),
                ));
            }
        }

        let request = SearchRequest {
            project_id: args.project_id,
            query: args.query,
            file_types: args.file_types,
            max_results: args.max_results,
        };
        let candidates = self.engine.search(&request).await.map_err(engine_error)?;
        let results: Vec<SearchResultItem> =
            candidates.iter().map(result_item_from_candidate).collect();
        let total = results.len();
        encode(SearchContent { results, total })
    }

    async fn get_context(&self, args: ContextArgs) -> Result<serde_json::Value, ToolResponse> {
        validate_project_and_query(&args.project_id, &args.query)?;
        if let Some(n) = args.max_tokens {
            if n == 0 || n > MAX_TOKENS_CEILING {
                return Err(ToolResponse::fail(
                    CODE_INVALID_INPUT,
                    format!("max_tokens must be in 1..={MAX_TOKENS_CEILING}"),
                ));
            }
        }

        let request = ContextRequest {
            project_id: args.project_id,
            current_file: args.current_file,
            query: args.query,
            max_tokens: args.max_tokens,
            deadline: None,
        };
        let bundle = self.engine.get_context(&request).await.map_err(engine_error)?;
        let sources = bundle
            .sources
            .iter()
            .map(|s| SourceItem {
                file_path: s.document_path.clone(),
                line_range: Some(s.line_range.to_string()),
                relevance: s.relevance_score,
                summary: s.summary.clone(),
            })
            .collect();
        encode(ContextContent {
            context: bundle.context_text,
            sources,
            tokens_used: bundle.tokens_used,
        })
    }

    async fn validate_relevance(
        &self,
        args: ValidateArgs,
    ) -> Result<serde_json::Value, ToolResponse> {
        if args.query.trim().is_empty() {
            return Err(ToolResponse::fail(CODE_INVALID_INPUT, "query must not be empty"));
        }

        let candidates: Vec<Candidate> =
            args.results.iter().enumerate().map(candidate_from_result_item).collect();
        let validated = self
            .engine
            .validate_candidates(&args.query, candidates)
            .await
            .map_err(engine_error)?;

        let mut filtered_results = Vec::new();
        let mut reasoning_lines = Vec::new();
        for (item, validated) in args.results.into_iter().zip(&validated) {
            reasoning_lines.push(format!(
                "{}: {} ({})",
                item.file_path,
                if validated.keep { "kept" } else { "discarded" },
                validated.reasoning
            ));
            if validated.keep {
                filtered_results.push(item);
            }
        }
        encode(ValidateContent {
            filtered_results,
            reasoning: reasoning_lines.join("\n"),
        })
    }
}

fn validate_project_and_query(project_id: &str, query: &str) -> Result<(), ToolResponse> {
    if project_id.trim().is_empty() {
        return Err(ToolResponse::fail(CODE_INVALID_INPUT, "project_id is required"));
    }
    if query.trim().is_empty() {
        return Err(ToolResponse::fail(CODE_INVALID_INPUT, "query must not be empty"));
    }
    Ok(())
}

fn result_item_from_candidate(candidate: &Candidate) -> SearchResultItem {
    SearchResultItem {
        file_path: candidate.path.clone(),
        content_snippet: candidate.excerpt.clone(),
        relevance: candidate.fused_score,
        line_numbers: Some([candidate.line_range.start, candidate.line_range.end]),
        summary: None,
    }
}

fn candidate_from_result_item((index, item): (usize, &SearchResultItem)) -> Candidate {
    let line_range = item
        .line_numbers
        .map(|[start, end]| LineRange::new(start, end))
        .unwrap_or(LineRange::new(1, 1));
    let relevance = item.relevance.clamp(0.0, 1.0);
    Candidate {
        chunk_id: format!("{}:{index}", item.file_path),
        path: item.file_path.clone(),
        lexical_score: Some(relevance),
        vector_score: None,
        fused_score: relevance,
        excerpt: item.content_snippet.clone(),
        line_range,
    }
}

fn engine_error(e: EngineError) -> ToolResponse {
    match e {
        EngineError::InvalidInput(msg) => ToolResponse::fail(CODE_INVALID_INPUT, msg),
        EngineError::UpstreamUnavailable(msg) => {
            ToolResponse::fail(CODE_UPSTREAM_UNAVAILABLE, msg)
        }
        EngineError::Internal(msg) => ToolResponse::fail(CODE_INTERNAL, msg),
    }
}

fn encode<T: Serialize>(content: T) -> Result<serde_json::Value, ToolResponse> {
    serde_json::to_value(content)
        .map_err(|e| ToolResponse::fail(CODE_INTERNAL, format!("response encoding: {e}")))
}
