//! Typed failure taxonomy.
//!
//! Failures are contained at the scope they occur in: a malformed document
//! is logged and skipped without stopping a folder sync, a failed tool
//! round degrades the answer without failing the query, and only backend
//! unavailability and the query deadline escalate to the caller. Wiring
//! and CLI code use `anyhow` for context; the seams below carry typed
//! errors so callers can tell the cases apart.

use std::time::Duration;

use thiserror::Error;

/// A single source document could not be turned into a course.
///
/// Ingestion logs these and continues with the remaining documents.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document has no 'Course Title:' header")]
    MissingTitle,

    #[error("document body is empty")]
    EmptyDocument,
}

/// The search stack could not be used at all.
///
/// Distinct from an empty result set: embedding failures and store
/// failures surface here instead of silently returning no results.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),
}

/// The chat-model client failed to produce a usable turn.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("chat request failed: {0}")]
    Request(String),

    #[error("chat API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed chat response: {0}")]
    Malformed(String),
}

/// Errors surfaced to callers of [`Assistant::answer`](crate::assistant::Assistant::answer).
///
/// `Timeout` guarantees the conversation history was not modified, so the
/// caller can retry the same query safely.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("query deadline of {0:?} exceeded")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_error_display() {
        let err = RetrievalError::Unavailable("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_timeout_mentions_deadline() {
        let err = AssistantError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30"));
    }
}
