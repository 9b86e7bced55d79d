//! Unified error type for the collectors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limiting or a server-side failure (429 / 5xx).
    #[error("API error (status={status}, retryable): {message}")]
    ApiRetryable { status: u16, message: String },

    /// Any other non-success status. Retrying cannot help.
    #[error("API error (status={status}): {message}")]
    ApiTerminal { status: u16, message: String },

    /// The response decoded badly or carried no usable data.
    #[error("Payload error: {0}")]
    Payload(String),

    /// A physically implausible value in an otherwise well-formed payload.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Exhausted {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// A concurrent writer changed the document between read and write.
    #[error("Store conflict: {0}")]
    StoreConflict(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a fresh attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::ApiRetryable { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::StoreConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::Network("timed out".into()).is_retryable());
        assert!(Error::ApiRetryable {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!Error::ApiTerminal {
            status: 403,
            message: "forbidden".into()
        }
        .is_retryable());
        assert!(!Error::Payload("empty".into()).is_retryable());
        assert!(!Error::Validation("zero pressure".into()).is_retryable());
        assert!(!Error::StoreConflict("doc".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_wraps_last_cause() {
        let err = Error::RetriesExhausted {
            attempts: 4,
            source: Box::new(Error::ApiRetryable {
                status: 503,
                message: "unavailable".into(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("4 attempts"));
        assert!(text.contains("503"));
        assert!(!err.is_retryable());
    }
}
