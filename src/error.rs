//! Error types for query and engine operations.

use thiserror::Error;

/// Error type for all query-builder and engine operations.
///
/// Engine-signaled failures keep the HTTP status and the engine's own
/// `error.reason` text so callers can decide what is recoverable.
#[derive(Error, Debug)]
pub enum EsError {
    /// Connection bootstrap failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine signaled 404 for a document, index, alias or template.
    #[error("not found ({status}): {reason}")]
    NotFound {
        /// HTTP status code (always 404).
        status: u16,
        /// Reason reported by the engine.
        reason: String,
    },

    /// The engine rejected the request (4xx other than 404).
    #[error("client error ({status}): {reason}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the engine.
        reason: String,
    },

    /// Engine-side failure (5xx).
    #[error("engine error ({status}): {reason}")]
    Engine {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the engine.
        reason: String,
    },

    /// Required index or type configuration is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport error from the underlying client.
    #[error("transport error: {0}")]
    Transport(#[from] opensearch::Error),
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, EsError>;
