mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use common::candidate;
use docdex_core::traits::RelevanceJudge;
use docdex_core::types::Judgment;
use docdex_engine::validate::ValidatorPool;

/// Keeps a candidate iff its excerpt contains "keep".
struct MarkerJudge;

#[async_trait]
impl RelevanceJudge for MarkerJudge {
    async fn judge(&self, _q: &str, excerpt: &str, _p: &str) -> anyhow::Result<Judgment> {
        Ok(Judgment {
            keep: excerpt.contains("keep"),
            reasoning: "marker check".to_string(),
        })
    }
}

fn pool(judge: Arc<dyn RelevanceJudge>) -> ValidatorPool {
    ValidatorPool::new(judge, 4, Duration::from_millis(500))
}

#[tokio::test]
async fn output_order_matches_input_order() {
    let candidates = vec![
        candidate("c1", "a.md", "keep this one", 0.9),
        candidate("c2", "b.md", "drop this one", 0.8),
        candidate("c3", "c.md", "keep this too", 0.7),
    ];
    let validated = pool(Arc::new(MarkerJudge))
        .validate("anything", candidates, None)
        .await;
    let ids: Vec<_> = validated.iter().map(|v| v.candidate.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    let keeps: Vec<_> = validated.iter().map(|v| v.keep).collect();
    assert_eq!(keeps, vec![true, false, true]);
}

#[tokio::test]
async fn keep_set_is_independent_of_input_permutation() {
    let forward = vec![
        candidate("c1", "a.md", "keep alpha", 0.9),
        candidate("c2", "b.md", "drop beta", 0.8),
        candidate("c3", "c.md", "keep gamma", 0.7),
    ];
    let mut reversed = forward.clone();
    reversed.reverse();

    let pool = pool(Arc::new(MarkerJudge));
    let a = pool.validate("q", forward, None).await;
    let b = pool.validate("q", reversed, None).await;

    let keep_set = |vs: &[docdex_core::types::ValidatedCandidate]| {
        let mut kept: Vec<String> = vs
            .iter()
            .filter(|v| v.keep)
            .map(|v| v.candidate.chunk_id.clone())
            .collect();
        kept.sort();
        kept
    };
    assert_eq!(keep_set(&a), keep_set(&b));
}

#[tokio::test]
async fn judge_error_fails_closed_without_aborting_batch() {
    struct ErrOnB;

    #[async_trait]
    impl RelevanceJudge for ErrOnB {
        async fn judge(&self, _q: &str, _e: &str, path: &str) -> anyhow::Result<Judgment> {
            if path == "b.md" {
                anyhow::bail!("inference service 500");
            }
            Ok(Judgment { keep: true, reasoning: "ok".to_string() })
        }
    }

    let candidates = vec![
        candidate("c1", "a.md", "text", 0.9),
        candidate("c2", "b.md", "text", 0.8),
        candidate("c3", "c.md", "text", 0.7),
    ];
    let validated = pool(Arc::new(ErrOnB)).validate("q", candidates, None).await;
    assert_eq!(validated.len(), 3);
    assert!(validated[0].keep);
    assert!(!validated[1].keep);
    assert_eq!(validated[1].reasoning, "validation failed");
    assert!(validated[2].keep);
}

#[tokio::test]
async fn expired_deadline_fails_everything_closed() {
    let candidates = vec![
        candidate("c1", "a.md", "keep", 0.9),
        candidate("c2", "b.md", "keep", 0.8),
    ];
    let validated = pool(Arc::new(MarkerJudge))
        .validate("q", candidates, Some(Instant::now()))
        .await;
    assert_eq!(validated.len(), 2);
    assert!(validated.iter().all(|v| !v.keep));
}

#[tokio::test]
async fn per_call_timeout_marks_candidate_failed() {
    struct SlowJudge;

    #[async_trait]
    impl RelevanceJudge for SlowJudge {
        async fn judge(&self, _q: &str, _e: &str, _p: &str) -> anyhow::Result<Judgment> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Judgment { keep: true, reasoning: "too late".to_string() })
        }
    }

    let pool = ValidatorPool::new(Arc::new(SlowJudge), 4, Duration::from_millis(50));
    let validated = pool
        .validate("q", vec![candidate("c1", "a.md", "text", 0.9)], None)
        .await;
    assert_eq!(validated.len(), 1);
    assert!(!validated[0].keep);
    assert_eq!(validated[0].reasoning, "validation failed");
}
