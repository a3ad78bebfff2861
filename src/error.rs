//! Error types for orthopub.
//!
//! All library functions return `Result<T, OrthoError>`. Remote failures are
//! split by status code so callers can tell a bad credential from a rate limit,
//! and transport failures are kept apart from anything the remote reported.

use thiserror::Error;

/// Main error type for orthopub operations.
#[derive(Debug, Error)]
pub enum OrthoError {
    /// Credential missing or not in the expected format (checked before any request)
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Remote rejected the credential (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credential lacks the required permission (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Remote rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Remote refused the request body (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other non-success status
    #[error("Remote error: {status} - {message}")]
    RemoteRejected {
        /// HTTP status code
        status: u16,
        /// Message reported by the remote, or a generic description
        message: String,
    },

    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] reqwest::Error),

    /// Response arrived but could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// User input rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias using `OrthoError`
pub type Result<T> = std::result::Result<T, OrthoError>;

impl OrthoError {
    /// Map a non-success HTTP status and its body to an error.
    ///
    /// OpenAI-style bodies (`{"error": {"message": ...}}`) contribute their
    /// message; otherwise `context` names the service.
    pub fn from_status(status: u16, body: &str, context: &str) -> Self {
        let remote_message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(|m| m.as_str().map(str::to_string))
            })
            .filter(|m| !m.trim().is_empty());

        let message = remote_message.unwrap_or_else(|| format!("{} error: {}", context, status));

        match status {
            400 => OrthoError::BadRequest(message),
            401 => OrthoError::Unauthorized(message),
            403 => OrthoError::Forbidden(message),
            429 => OrthoError::RateLimited(message),
            _ => OrthoError::RemoteRejected { status, message },
        }
    }

    /// True for transport failures where the remote was never reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, OrthoError::Connectivity(_))
    }

    /// True for errors the remote service reported.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            OrthoError::Unauthorized(_)
                | OrthoError::Forbidden(_)
                | OrthoError::RateLimited(_)
                | OrthoError::BadRequest(_)
                | OrthoError::RemoteRejected { .. }
        )
    }

    /// Single readable line suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            OrthoError::InvalidCredential(msg) => {
                format!("{} Check the API key in settings (orthopub key set).", msg)
            }
            OrthoError::Unauthorized(_) => {
                "The API key was rejected. Set a valid OpenAI API key.".to_string()
            }
            OrthoError::Forbidden(_) => {
                "The API key lacks the required permission. Check the OpenAI account.".to_string()
            }
            OrthoError::RateLimited(_) => {
                "Usage limit exceeded. Please try again in a moment.".to_string()
            }
            OrthoError::BadRequest(_) => "The request was rejected. Check the text content.".to_string(),
            OrthoError::RemoteRejected { .. } | OrthoError::MalformedResponse(_) => {
                format!("The remote service returned an error: {}", self)
            }
            OrthoError::Connectivity(_) => {
                "Could not reach the remote service. Check the internet connection.".to_string()
            }
            OrthoError::Validation(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_known_codes() {
        assert!(matches!(OrthoError::from_status(401, "", "OpenAI API"), OrthoError::Unauthorized(_)));
        assert!(matches!(OrthoError::from_status(403, "", "OpenAI API"), OrthoError::Forbidden(_)));
        assert!(matches!(OrthoError::from_status(429, "", "OpenAI API"), OrthoError::RateLimited(_)));
        assert!(matches!(OrthoError::from_status(400, "", "OpenAI API"), OrthoError::BadRequest(_)));
    }

    #[test]
    fn test_from_status_uses_remote_message() {
        let body = r#"{"error": {"message": "model overloaded", "type": "server_error"}}"#;
        match OrthoError::from_status(503, body, "OpenAI API") {
            OrthoError::RemoteRejected { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_generic_message() {
        match OrthoError::from_status(500, "<html>oops</html>", "NCBI ESearch") {
            OrthoError::RemoteRejected { message, .. } => {
                assert_eq!(message, "NCBI ESearch error: 500");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_classification() {
        let err = OrthoError::from_status(502, "", "NCBI EFetch");
        assert!(err.is_remote());
        assert!(!err.is_connectivity());
        assert!(!OrthoError::Validation("x".into()).is_remote());
    }
}
