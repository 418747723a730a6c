//! Error types for the rendering pipeline
//!
//! Resource-level failures (`AtlasFull`, `ResourceCreationFailed`) are
//! absorbed by their callers with a degraded-but-running fallback and a
//! logged event. Construction-time failures (`ConfigurationInvalid`)
//! propagate as a hard failure of pipeline initialization.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced by the rendering core
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RenderError {
    /// A fixed-capacity structured buffer is full. The add operation
    /// fails; the caller decides whether to drop the entity.
    CapacityExceeded {
        /// Configured maximum record count
        limit: usize,
    },

    /// No atlas region of the requested size is available, even after
    /// eviction. The requesting light goes unshadowed this frame.
    AtlasFull {
        /// Requested tile edge length in texels
        requested: u32,
    },

    /// A GPU resource (texture, render target) could not be created
    ResourceCreationFailed(String),

    /// Malformed settings at construction time
    ConfigurationInvalid(String),

    /// A record wrote fields that do not match the declared schema
    SchemaMismatch(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { limit } => {
                write!(f, "Buffer capacity exceeded (limit {})", limit)
            }
            Self::AtlasFull { requested } => {
                write!(f, "Shadow atlas full (requested {0}x{0})", requested)
            }
            Self::ResourceCreationFailed(msg) => {
                write!(f, "Resource creation failed: {}", msg)
            }
            Self::ConfigurationInvalid(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            Self::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::AtlasFull { requested: 512 };
        assert_eq!(err.to_string(), "Shadow atlas full (requested 512x512)");

        let err = RenderError::CapacityExceeded { limit: 64 };
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_error_serialization() {
        let errors = vec![
            RenderError::CapacityExceeded { limit: 8 },
            RenderError::AtlasFull { requested: 256 },
            RenderError::ResourceCreationFailed("unsupported format".into()),
            RenderError::ConfigurationInvalid("atlas size is zero".into()),
        ];

        for err in errors {
            let json = serde_json::to_string(&err).unwrap();
            let restored: RenderError = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, err);
        }
    }
}
