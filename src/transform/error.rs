//! Transform failures.
//!
//! Every variant is recoverable: the assembler answers with the original
//! response whenever one of these is produced.

/// Error raised while building or driving a transform.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A rule selector failed to compile.
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    /// The HTML rewriter rejected input or a handler failed.
    #[error("html rewrite failed: {0}")]
    Rewrite(String),

    /// Debug fault injection fired on an element.
    #[error("manually triggered error in transform")]
    FaultInjected,

    /// The body grew past the configured buffering limit.
    #[error("body exceeds transform limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Reading the upstream body failed.
    #[error("upstream body error: {0}")]
    Upstream(String),

    /// The rewriter worker panicked or was cancelled.
    #[error("rewrite worker failed: {0}")]
    Worker(String),
}

impl TransformError {
    /// Short label used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            TransformError::Selector { .. } => "selector",
            TransformError::Rewrite(_) => "rewrite",
            TransformError::FaultInjected => "fault_injected",
            TransformError::BodyTooLarge { .. } => "too_large",
            TransformError::Upstream(_) => "upstream",
            TransformError::Worker(_) => "worker",
        }
    }
}
