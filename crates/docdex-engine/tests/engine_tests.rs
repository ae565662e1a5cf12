mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use common::{doc, engine_with, seeded_engine};
use docdex_core::error::EngineError;
use docdex_core::traits::{DocumentStore, RelevanceJudge};
use docdex_core::types::{Document, Judgment, ProjectId};
use docdex_engine::providers::OverlapJudge;
use docdex_engine::{ContextRequest, SearchRequest};

fn search_request(project: &str, query: &str) -> SearchRequest {
    SearchRequest {
        project_id: project.to_string(),
        query: query.to_string(),
        file_types: None,
        max_results: None,
    }
}

fn context_request(project: &str, query: &str) -> ContextRequest {
    ContextRequest {
        project_id: project.to_string(),
        current_file: None,
        query: query.to_string(),
        max_tokens: None,
        deadline: None,
    }
}

#[tokio::test]
async fn search_finds_login_function() {
    let engine = seeded_engine(
        vec![doc("d1", "p1", "auth.py", "def login(user, password):", "")],
        true,
    );
    let results = engine
        .search(&search_request("p1", "user login function"))
        .await
        .expect("search");
    assert!(!results.is_empty());
    assert_eq!(results[0].path, "auth.py");
}

#[tokio::test]
async fn empty_query_is_rejected_not_empty_results() {
    let engine = seeded_engine(vec![doc("d1", "p1", "a.md", "alpha", "")], true);
    let err = engine.search(&search_request("p1", "   ")).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let err = engine
        .get_context(&context_request("p1", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn lexical_only_degradation_still_ranks_results() {
    let engine = seeded_engine(
        vec![
            doc("d1", "p1", "guide.md", "deploy the service with helm", ""),
            doc("d2", "p1", "ops.md", "deploy steps for staging", ""),
            doc("d3", "p1", "notes.md", "deploy checklist", ""),
        ],
        false,
    );
    let results = engine
        .search(&search_request("p1", "deploy"))
        .await
        .expect("search");
    assert_eq!(results.len(), 3);
    for candidate in &results {
        assert!(candidate.vector_score.is_none());
        assert_eq!(
            candidate.fused_score,
            candidate.lexical_score.expect("lexical score present")
        );
    }
}

#[tokio::test]
async fn search_respects_max_results_and_is_idempotent() {
    let documents: Vec<Document> = (0..20)
        .map(|i| doc(&format!("d{i}"), "p1", &format!("doc{i:02}.md"), "alpha beta gamma", ""))
        .collect();
    let engine = seeded_engine(documents, true);

    let mut request = search_request("p1", "alpha beta");
    request.max_results = Some(5);
    let first = engine.search(&request).await.expect("search");
    assert!(first.len() <= 5);

    let second = engine.search(&request).await.expect("search again");
    let ids: Vec<_> = first.iter().map(|c| (&c.chunk_id, c.fused_score)).collect();
    let ids2: Vec<_> = second.iter().map(|c| (&c.chunk_id, c.fused_score)).collect();
    assert_eq!(ids, ids2);
}

#[tokio::test]
async fn file_type_filter_is_exact_suffix_match() {
    let engine = seeded_engine(
        vec![
            doc("d1", "p1", "api.md", "token refresh flow", ""),
            doc("d2", "p1", "api.txt", "token refresh flow", ""),
        ],
        true,
    );
    let mut request = search_request("p1", "token refresh");
    request.file_types = Some(vec!["md".to_string()]);
    let results = engine.search(&request).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "api.md");
}

#[tokio::test]
async fn get_context_assembles_sources_with_attribution() {
    let engine = seeded_engine(
        vec![doc(
            "d1",
            "p1",
            "auth.md",
            "The login endpoint validates the user password against the directory.",
            "",
        )],
        true,
    );
    let bundle = engine
        .get_context(&context_request("p1", "login password validation"))
        .await
        .expect("get_context");
    assert_eq!(bundle.sources.len(), 1);
    assert_eq!(bundle.sources[0].document_path, "auth.md");
    assert!(bundle.context_text.contains("auth.md"));
    assert!(bundle.tokens_used > 0);
}

#[tokio::test]
async fn no_surviving_candidates_is_success_not_error() {
    // Judge rejects everything: the bundle is empty, the call succeeds.
    struct RejectAll;

    #[async_trait]
    impl RelevanceJudge for RejectAll {
        async fn judge(&self, _q: &str, _e: &str, _p: &str) -> anyhow::Result<Judgment> {
            Ok(Judgment { keep: false, reasoning: "not relevant".to_string() })
        }
    }

    let store = docdex_engine::providers::MemoryDocumentStore::new();
    store.insert(doc("d1", "p1", "a.md", "alpha beta gamma", ""));
    let engine = engine_with(Arc::new(store), Arc::new(RejectAll), true);

    let bundle = engine
        .get_context(&context_request("p1", "alpha"))
        .await
        .expect("get_context");
    assert!(bundle.context_text.is_empty());
    assert!(bundle.sources.is_empty());
    assert_eq!(bundle.tokens_used, 0);
}

#[tokio::test]
async fn timed_out_validator_excludes_highest_scored_candidate() {
    // "poison" appears in one document only; the judge hangs on it. Its
    // lexical score is the highest, yet it must not reach the sources.
    struct HangOnPoison;

    #[async_trait]
    impl RelevanceJudge for HangOnPoison {
        async fn judge(&self, _q: &str, excerpt: &str, _p: &str) -> anyhow::Result<Judgment> {
            if excerpt.contains("poison") {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            }
            Ok(Judgment { keep: true, reasoning: "relevant".to_string() })
        }
    }

    let store = docdex_engine::providers::MemoryDocumentStore::new();
    store.insert(doc("d1", "p1", "poisoned.md", "poison retry retry retry retry", ""));
    store.insert(doc("d2", "p1", "clean-a.md", "retry with backoff", ""));
    store.insert(doc("d3", "p1", "clean-b.md", "retry budget notes and more words", ""));
    let engine = engine_with(Arc::new(store), Arc::new(HangOnPoison), true);

    let bundle = engine
        .get_context(&context_request("p1", "retry"))
        .await
        .expect("get_context");
    assert!(!bundle.sources.is_empty());
    assert!(bundle
        .sources
        .iter()
        .all(|s| s.document_path != "poisoned.md"));
}

#[tokio::test]
async fn validator_fanout_never_exceeds_bound() {
    struct CountingJudge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RelevanceJudge for CountingJudge {
        async fn judge(&self, _q: &str, _e: &str, _p: &str) -> anyhow::Result<Judgment> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(Judgment { keep: true, reasoning: "ok".to_string() })
        }
    }

    let judge = Arc::new(CountingJudge {
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });

    let mut config = common::test_config();
    config.validation.fanout = 2;
    config.validation.timeout_ms = 5_000;
    let embedder = Arc::new(docdex_engine::providers::HashEmbedder::default());
    let index = Arc::new(docdex_index::IndexStore::new(
        embedder.clone(),
        config.chunking.clone(),
    ));
    let store = docdex_engine::providers::MemoryDocumentStore::new();
    for i in 0..8 {
        store.insert(doc(&format!("d{i}"), "p1", &format!("f{i}.md"), "alpha beta", ""));
    }
    let engine = docdex_engine::Engine::new(
        config,
        index,
        embedder,
        judge.clone(),
        Arc::new(store),
    );

    engine
        .get_context(&context_request("p1", "alpha"))
        .await
        .expect("get_context");
    assert!(judge.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn document_store_recovers_within_retry_budget() {
    struct FlakyStore {
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn fetch_documents(&self, project_id: &ProjectId) -> anyhow::Result<Vec<Document>> {
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                anyhow::bail!("connection refused");
            }
            Ok(vec![doc("d1", project_id, "a.md", "alpha", "")])
        }
    }

    let flaky = FlakyStore { failures_left: AtomicUsize::new(2) };
    let engine = engine_with(Arc::new(flaky), Arc::new(OverlapJudge::default()), true);
    let results = engine
        .search(&search_request("p1", "alpha"))
        .await
        .expect("search after retries");
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn document_store_down_surfaces_upstream_unavailable() {
    struct DownStore;

    #[async_trait]
    impl DocumentStore for DownStore {
        async fn fetch_documents(&self, _p: &ProjectId) -> anyhow::Result<Vec<Document>> {
            anyhow::bail!("connection refused")
        }
    }

    let engine = engine_with(Arc::new(DownStore), Arc::new(OverlapJudge::default()), true);
    let err = engine
        .search(&search_request("p1", "alpha"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
}
