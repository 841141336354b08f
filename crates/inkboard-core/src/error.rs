//! Error types for the annotation engine.

use crate::shapes::ShapeId;
use thiserror::Error;

/// Errors raised inside a tool's pointer or key handler.
///
/// These never escape the engine: the dispatch boundary logs them, aborts the
/// gesture and reverts the store to its last committed snapshot.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("non-finite world coordinate for screen point ({x}, {y}); viewport has zero width or height")]
    NonFinite { x: f64, y: f64 },
    #[error("shape {0} vanished during the gesture")]
    ShapeVanished(ShapeId),
}

/// Result type for tool handlers. `Ok(true)` means the event was handled.
pub type ToolResult = Result<bool, ToolError>;

/// Engine-level errors (documents, configuration, collaboration payloads).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed collaboration event: {0}")]
    MalformedEvent(String),
    #[error("Unsupported document version {0}")]
    UnsupportedVersion(u32),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
