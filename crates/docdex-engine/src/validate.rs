//! Concurrent relevance validation with bounded fan-out.
//!
//! One inference call per candidate, never batched, so judgments cannot
//! leak cross-candidate bias. Each worker writes its result into a
//! pre-sized slot by index; output order equals input order without a
//! sort step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

use docdex_core::traits::RelevanceJudge;
use docdex_core::types::{Candidate, Judgment, ValidatedCandidate};

const FAILED_REASONING: &str = "validation failed";

pub struct ValidatorPool {
    judge: Arc<dyn RelevanceJudge>,
    fanout: usize,
    per_call_timeout: Duration,
}

impl ValidatorPool {
    pub fn new(judge: Arc<dyn RelevanceJudge>, fanout: usize, per_call_timeout: Duration) -> Self {
        Self { judge, fanout: fanout.max(1), per_call_timeout }
    }

    /// Judge every candidate independently and concurrently.
    ///
    /// Timeouts and judge errors mark the candidate `keep=false`
    /// (fail-closed) and never abort the batch. When `deadline` is
    /// supplied, per-call budgets shrink toward it and work past the
    /// deadline is fail-closed as well.
    pub async fn validate(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        deadline: Option<Instant>,
    ) -> Vec<ValidatedCandidate> {
        let mut slots: Vec<Option<ValidatedCandidate>> = Vec::new();
        slots.resize_with(candidates.len(), || None);

        let semaphore = Arc::new(Semaphore::new(self.fanout));
        let mut workers = JoinSet::new();
        for (idx, candidate) in candidates.iter().cloned().enumerate() {
            let judge = Arc::clone(&self.judge);
            let semaphore = Arc::clone(&semaphore);
            let query = query.to_string();
            let per_call = self.per_call_timeout;
            workers.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                let started = Instant::now();
                if permit.is_err() {
                    return (idx, fail_closed(candidate, started));
                }
                let budget = call_budget(per_call, deadline);
                if budget.is_zero() {
                    return (idx, fail_closed(candidate, started));
                }
                let judgment = match timeout(
                    budget,
                    judge.judge(&query, &candidate.excerpt, &candidate.path),
                )
                .await
                {
                    Ok(Ok(judgment)) => judgment,
                    Ok(Err(e)) => {
                        tracing::warn!(chunk_id = %candidate.chunk_id, "relevance judge error: {e}");
                        failed_judgment()
                    }
                    Err(_) => {
                        tracing::warn!(chunk_id = %candidate.chunk_id, "relevance judge timed out");
                        failed_judgment()
                    }
                };
                let validated = ValidatedCandidate {
                    candidate,
                    keep: judgment.keep,
                    reasoning: judgment.reasoning,
                    validation_latency_ms: started.elapsed().as_millis() as u64,
                };
                (idx, validated)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((idx, validated)) => slots[idx] = Some(validated),
                Err(e) => tracing::warn!("validator worker aborted: {e}"),
            }
        }

        // An aborted worker leaves its slot empty; fail that candidate
        // closed rather than dropping it from the output.
        slots
            .into_iter()
            .zip(candidates)
            .map(|(slot, candidate)| {
                slot.unwrap_or_else(|| fail_closed(candidate, Instant::now()))
            })
            .collect()
    }
}

fn call_budget(per_call: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        None => per_call,
        Some(d) => per_call.min(d.saturating_duration_since(Instant::now())),
    }
}

fn failed_judgment() -> Judgment {
    Judgment { keep: false, reasoning: FAILED_REASONING.to_string() }
}

fn fail_closed(candidate: Candidate, started: Instant) -> ValidatedCandidate {
    ValidatedCandidate {
        candidate,
        keep: false,
        reasoning: FAILED_REASONING.to_string(),
        validation_latency_ms: started.elapsed().as_millis() as u64,
    }
}
