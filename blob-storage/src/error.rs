use std::error::Error as StdError;
use thiserror::Error;

pub type BlobResult<T> = Result<T, BlobError>;

/// Failures reported by an append blob service.
///
/// `LimitExceeded` and `NotFound` are the only outcomes callers are expected to
/// recover from; everything else is opaque and fatal for the current request.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The target blob has reached the service's maximum block count.
    #[error("append block limit exceeded for {resource}")]
    LimitExceeded { resource: String },

    /// The target container or blob does not exist.
    #[error("{resource} does not exist")]
    NotFound { resource: String },

    #[error("blob service returned {status}{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("request to the blob service timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    /// The HTTP-like status code carried by this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BlobError::LimitExceeded { .. } => Some(409),
            BlobError::NotFound { .. } => Some(404),
            BlobError::Service { status, .. } => Some(*status),
            BlobError::Timeout | BlobError::Transport(_) | BlobError::Io(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, BlobError::LimitExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_discriminator() {
        let limit = BlobError::LimitExceeded { resource: "logs/a-0.log".into() };
        let missing = BlobError::NotFound { resource: "logs/a-0.log".into() };
        let forbidden = BlobError::Service { status: 403, code: Some("AuthorizationFailure".into()), message: "denied".into() };

        assert_eq!(limit.status(), Some(409));
        assert_eq!(missing.status(), Some(404));
        assert_eq!(forbidden.status(), Some(403));
        assert_eq!(BlobError::Timeout.status(), None);
        assert!(missing.is_not_found());
        assert!(!forbidden.is_not_found());
        assert!(limit.is_limit_exceeded());
    }

    #[test]
    fn test_service_error_display_includes_code() {
        let err = BlobError::Service { status: 500, code: Some("InternalError".into()), message: "boom".into() };
        assert_eq!(err.to_string(), "blob service returned 500 (InternalError): boom");

        let err = BlobError::Service { status: 503, code: None, message: "busy".into() };
        assert_eq!(err.to_string(), "blob service returned 503: busy");
    }
}
