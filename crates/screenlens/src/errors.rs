//! Error types for the screen-understanding pipeline and the persistent index.

use thiserror::Error;

/// Errors surfaced by pipeline stages and core-exposed operations.
///
/// Most stage failures are absorbed by the orchestrator (the pipeline keeps
/// running on empty input and records a note); the kinds that escape to
/// callers are `InvalidInput`, `Stale`, `IndexWriteFailed` and
/// `InternalInvariant`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("embedding failed: {0}")]
    EmbedFailed(String),

    #[error("index write failed: {0}")]
    IndexWriteFailed(String),

    #[error("cached screen {screen_id} is stale ({age_ms}ms old)")]
    Stale { screen_id: String, age_ms: i64 },

    #[error("corrupt store row: {0}")]
    CorruptStore(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

/// Errors raised inside the redb-backed store.
///
/// Converted into `PipelineError::IndexWriteFailed` / `CorruptStore` at the
/// semantic-index boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown row version {found} (expected {expected})")]
    UnknownVersion { found: u8, expected: u8 },

    #[error("zero-magnitude embedding rejected for element {0}")]
    ZeroEmbedding(String),
}

impl From<redb::Error> for StoreError {
    fn from(e: redb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownVersion { .. } => PipelineError::CorruptStore(e.to_string()),
            StoreError::Serialization(_) => PipelineError::CorruptStore(e.to_string()),
            other => PipelineError::IndexWriteFailed(other.to_string()),
        }
    }
}
