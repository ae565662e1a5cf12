//! Layered engine configuration.
//!
//! Merges `docdex.toml` with `DOCDEX_*` environment variables (nested keys
//! separated by `__`, e.g. `DOCDEX_VALIDATION__FANOUT=4`). Every knob has a
//! documented default so the engine runs with no config file at all.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Hard ceiling on `max_results`, enforced at the protocol edge and again
/// inside the retriever.
pub const MAX_RESULTS_CEILING: usize = 50;

/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_CEILING: usize = 16_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Weight of the lexical score in fusion.
    pub lexical_weight: f32,
    /// Weight of the vector score in fusion.
    pub vector_weight: f32,
    /// Default result count when the caller does not ask for one.
    pub max_results_default: usize,
    /// Default token budget for `get_context`.
    pub max_tokens_default: usize,
    pub validation: ValidationConfig,
    pub retry: RetryConfig,
    pub chunking: ChunkingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lexical_weight: 0.5,
            vector_weight: 0.5,
            max_results_default: 10,
            max_tokens_default: 4_000,
            validation: ValidationConfig::default(),
            retry: RetryConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

/// Bounds on the concurrent relevance-validation fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum judge calls in flight at once.
    pub fanout: usize,
    /// Per-call timeout in milliseconds; a timed-out candidate is dropped
    /// (fail-closed), the batch continues.
    pub timeout_ms: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { fanout: 8, timeout_ms: 3_000 }
    }
}

/// Bounded retry for document-store calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first failed attempt.
    pub max_retries: usize,
    /// Initial backoff in milliseconds, doubled per retry.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 2, backoff_ms: 100 }
    }
}

/// Sliding line-window chunking applied at index time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub window_lines: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { window_lines: 40, overlap_percent: 0.2 }
    }
}

impl EngineConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("docdex.toml"))
            .merge(Env::prefixed("DOCDEX_").split("__"))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.validation.fanout == 0 {
            anyhow::bail!("validation.fanout must be at least 1");
        }
        if self.chunking.window_lines == 0 {
            anyhow::bail!("chunking.window_lines must be at least 1");
        }
        if !(0.0..1.0).contains(&self.chunking.overlap_percent) {
            anyhow::bail!("chunking.overlap_percent must be in [0, 1)");
        }
        Ok(())
    }
}
