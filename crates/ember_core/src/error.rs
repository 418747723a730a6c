//! Error types for the core library

use core::fmt;

/// Errors produced when resolving a generational handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// Handle is the null handle
    Null,
    /// Handle refers to a slot that was freed (generation mismatch)
    Stale,
    /// Handle index is out of bounds for the registry
    OutOfBounds,
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleError::Null => write!(f, "Handle is null"),
            HandleError::Stale => write!(f, "Handle is stale (slot was freed)"),
            HandleError::OutOfBounds => write!(f, "Handle index out of bounds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HandleError {}
