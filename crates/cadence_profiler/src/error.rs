//! Profiler error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    /// An event batch could not be encoded
    #[error("Failed to serialize profile data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The debug service is not accepting messages
    #[error("Debug service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type for profiler operations
pub type Result<T> = std::result::Result<T, ProfilerError>;
