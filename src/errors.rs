use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("blocked operator: {0}")]
    BlockedOperator(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("unsafe pattern: {0}")]
    UnsafePattern(String),

    #[error("nesting depth {depth} exceeds limit {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("cursor state error: {0}")]
    CursorState(String),
}

impl Error {
    /// True for rejections that security-sensitive call sites must audit-log
    /// and never downgrade to a soft failure.
    #[must_use]
    pub const fn is_security(&self) -> bool {
        matches!(self, Self::BlockedOperator(_) | Self::UnsafePattern(_))
    }
}
