//! Error types for metadata resolution

use thiserror::Error;

/// Error type for the resolution pipeline.
///
/// Every variant is fatal for the resolution cycle that produced it.
/// Missing keys, absent default routes and ambiguous addresses are not
/// errors and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoded payload could not be decoded with its declared encoding
    #[error("failed to decode {key}: {reason}")]
    Decode { key: String, reason: String },

    /// Payload is neither JSON nor YAML
    #[error("failed to parse config: {reason}")]
    ConfigParse { reason: String },

    /// Payload parsed but has the wrong shape
    #[error("invalid {key}: {reason}")]
    InvalidDocument { key: String, reason: String },

    /// Host interfaces could not be listed at all
    #[error("failed to enumerate network interfaces: {reason}")]
    InterfaceEnumeration { reason: String },
}

impl Error {
    pub(crate) fn decode(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, Error>;
