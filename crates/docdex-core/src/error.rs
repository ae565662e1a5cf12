use thiserror::Error;

/// Request-level failures that surface to the protocol layer.
///
/// Degradations (vector backend down, embedding unavailable, a validator
/// timing out) are absorbed where they happen and never show up here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
