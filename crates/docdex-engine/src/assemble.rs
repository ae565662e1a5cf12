//! Greedy token-budget packing of validated candidates.

use docdex_core::traits::{ApproxTokenCounter, TokenCounter};
use docdex_core::types::{ContextBundle, SourceAttribution, ValidatedCandidate};

use crate::retrieve::candidate_order;

const SUMMARY_MAX_CHARS: usize = 96;

pub struct ContextAssembler<T = ApproxTokenCounter> {
    counter: T,
}

impl Default for ContextAssembler<ApproxTokenCounter> {
    fn default() -> Self {
        Self { counter: ApproxTokenCounter }
    }
}

impl<T: TokenCounter> ContextAssembler<T> {
    pub fn new(counter: T) -> Self {
        Self { counter }
    }

    /// Pack kept candidates, best-first, while the running token count
    /// stays within budget. Packing stops at the first candidate that
    /// would overflow: an excerpt is included whole or not at all.
    ///
    /// Zero surviving candidates yield an empty bundle, which is success.
    pub fn assemble(
        &self,
        validated: Vec<ValidatedCandidate>,
        max_tokens: usize,
    ) -> ContextBundle {
        let mut kept: Vec<ValidatedCandidate> =
            validated.into_iter().filter(|v| v.keep).collect();
        kept.sort_by(|a, b| candidate_order(&a.candidate, &b.candidate, None));

        let mut context_text = String::new();
        let mut sources = Vec::new();
        let mut tokens_used = 0usize;

        for validated in kept {
            let candidate = &validated.candidate;
            let block = format!(
                "--- {}:{} (relevance {:.2}) ---\n{}\n\n",
                candidate.path, candidate.line_range, candidate.fused_score, candidate.excerpt
            );
            let cost = self.counter.count_tokens(&block);
            if tokens_used + cost > max_tokens {
                break;
            }
            context_text.push_str(&block);
            tokens_used += cost;
            sources.push(SourceAttribution {
                document_path: candidate.path.clone(),
                line_range: candidate.line_range,
                relevance_score: candidate.fused_score,
                summary: summarize(&candidate.excerpt),
            });
        }

        ContextBundle {
            context_text: context_text.trim_end().to_string(),
            sources,
            tokens_used,
        }
    }
}

/// First line of the excerpt, clipped to a readable length.
fn summarize(excerpt: &str) -> String {
    let first_line = excerpt.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let trimmed = first_line.trim();
    if trimmed.len() <= SUMMARY_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut end = SUMMARY_MAX_CHARS;
    while end < trimmed.len() && !trimmed.is_char_boundary(end) {
        end += 1;
    }
    format!("{}...", &trimmed[..end])
}
