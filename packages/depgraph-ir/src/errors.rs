//! Error types for depgraph-ir
//!
//! Provides unified error handling across the crate. Soft warnings (missing
//! operand node, absent post-dominator data) are not errors; they go to the
//! `tracing` diagnostic channel and mark the affected subgraph as degraded.

use thiserror::Error;

/// Main error type for depgraph-ir operations
#[derive(Debug, Error)]
pub enum DepGraphError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Module deserialization error
    #[error("module parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No entry function found or given
    #[error("no entry function found: {0}")]
    MissingEntry(String),

    /// Structural error fatal to one function's build
    #[error("malformed basic block in function '{function}': {reason}")]
    MalformedBlock { function: String, reason: String },

    /// Analysis error
    #[error("analysis error: {0}")]
    Analysis(String),
}

impl DepGraphError {
    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        DepGraphError::Analysis(msg.into())
    }
}

/// Result type alias for depgraph operations
pub type Result<T> = std::result::Result<T, DepGraphError>;
