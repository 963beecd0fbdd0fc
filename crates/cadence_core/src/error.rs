//! Property access error types

use thiserror::Error;

/// Errors raised when reading or writing a property through a handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// The object owning the property has been destroyed
    #[error("Target object destroyed: {0}")]
    TargetDestroyed(String),

    /// The object has no property with this name
    #[error("Missing property: {0}")]
    Missing(String),

    /// The property exists but cannot be written
    #[error("Read-only property: {0}")]
    ReadOnly(String),
}

/// Result type for property operations
pub type Result<T> = std::result::Result<T, PropertyError>;
