//! Failure taxonomy shared across the repograph crates.

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the core can surface, grouped by kind rather than by module.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input: bad commit range, bad glob, bad id.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An explicitly requested node/edge does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Encoded vector length does not match the declared dimension.
    #[error("dimension mismatch: expected {expected} components ({} bytes), got {actual_bytes} bytes", expected * 2)]
    DimensionMismatch {
        expected: usize,
        actual_bytes: usize,
    },

    /// Source could not be parsed into entities. Recorded, never fatal for
    /// the pipeline — one bad file cannot fail an encode.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// A git subprocess exited non-zero.
    #[error("git {command} exited with {code:?}: {stderr}")]
    Git {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// An external call (git, embedding, LLM) exceeded its deadline.
    /// Retriable by the caller.
    #[error("external call timed out: {0}")]
    Timeout(String),

    /// An external service (embedding, LLM) failed.
    /// Retriable by the caller.
    #[error("external service failure: {0}")]
    External(String),

    /// Backend-specific store failure.
    #[error("store failure: {0}")]
    Store(String),

    /// Persisted data has an unknown version or provider.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl Error {
    /// Whether the caller may reasonably retry the failed operation.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::External(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message_mentions_bytes() {
        let err = Error::DimensionMismatch {
            expected: 8,
            actual_bytes: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("8 components"));
        assert!(msg.contains("16 bytes"));
        assert!(msg.contains("10 bytes"));
    }

    #[test]
    fn test_retriable_kinds() {
        assert!(Error::Timeout("git diff".into()).is_retriable());
        assert!(Error::External("embedding 503".into()).is_retriable());
        assert!(!Error::InvalidInput("bad range".into()).is_retriable());
        assert!(!Error::NotFound("x".into()).is_retriable());
    }
}
