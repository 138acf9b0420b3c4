//! Domain errors for the bookloom pipeline.

use thiserror::Error;

/// Errors raised by the text-generation / planning capability adapters.
///
/// Every variant is classified up front as transient (retry with backoff)
/// or permanent (propagate immediately), so the retry loop never has to
/// sniff error message text.
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// Malformed request parameters (HTTP 400 equivalent).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected API credentials.
    #[error("authentication failed")]
    InvalidApiKey,

    /// Rate limit exceeded (HTTP 429 equivalent).
    #[error("rate limit exceeded")]
    RateLimited,

    /// Server-side failure (HTTP 5xx equivalent).
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Connection reset/refused, DNS failure, or other transport error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// The capability returned no usable text.
    #[error("empty response from model")]
    EmptyResponse,

    /// The capability returned output that could not be parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GenerateError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerateError::RateLimited
                | GenerateError::ServerError { .. }
                | GenerateError::Network(_)
                | GenerateError::Timeout
        )
    }
}

/// Domain-level errors that can occur in the pipeline.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("protected heading block targeted: {0}")]
    ProtectedBlock(String),

    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("generation failed for unit {unit_id}: {source}")]
    Generation {
        unit_id: String,
        #[source]
        source: GenerateError,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(GenerateError::RateLimited.is_transient());
        assert!(GenerateError::Timeout.is_transient());
        assert!(GenerateError::Network("reset".into()).is_transient());
        assert!(GenerateError::ServerError { status: 503, message: String::new() }.is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!GenerateError::InvalidRequest("bad".into()).is_transient());
        assert!(!GenerateError::InvalidApiKey.is_transient());
        assert!(!GenerateError::EmptyResponse.is_transient());
        assert!(!GenerateError::MalformedResponse("nope".into()).is_transient());
    }
}
