//! Error types for vtel client operations

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::streaming::StreamError;

/// Result type alias for vtel client operations
pub type Result<T> = std::result::Result<T, VtelError>;

/// Errors that can occur during vtel client operations
#[derive(Error, Debug)]
pub enum VtelError {
    /// Connection, DNS or TLS failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request did not complete within the configured timeout
    #[error("{context}: request timed out")]
    Timeout { context: String },

    /// Server returned a non-success status code
    #[error("{context}: server returned {status}: {message}")]
    Status {
        context: String,
        status: u16,
        message: String,
    },

    /// Server returned success but the payload carries an `error` field
    #[error("{context}: {}", format_application(.error, .description.as_deref()))]
    Application {
        context: String,
        error: String,
        description: Option<String>,
    },

    /// Body could not be decoded
    #[error("{context}: failed to decode response: {message}")]
    Decode { context: String, message: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A required credential field is empty
    #[error("Invalid credential: {0} must not be empty")]
    InvalidCredential(&'static str),

    /// Supplied token is expired or about to expire
    #[error("Token expired or near expiry (expires at {expires_at})")]
    TokenExpired { expires_at: DateTime<Utc> },

    /// Re-authorization requested on a client built from a bare token
    #[error("No credential available for re-authorization")]
    MissingCredential,

    /// Streaming error
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

fn format_application(error: &str, description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => format!("{}: {}", error, description),
        _ => error.to_string(),
    }
}

impl VtelError {
    /// Create a status error from status code and message
    pub fn status(context: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            context: context.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Classify a reqwest error raised while talking to `context`
    pub(crate) fn from_reqwest(context: impl Into<String>, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                context: context.into(),
            }
        } else if err.is_decode() {
            Self::decode(context, err)
        } else {
            Self::Transport(err)
        }
    }

    /// Resource or endpoint the error is attributed to, if any
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Timeout { context }
            | Self::Status { context, .. }
            | Self::Application { context, .. }
            | Self::Decode { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True when the server answered with success but reported an error in the payload
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_display_with_description() {
        let err = VtelError::Application {
            context: "charge_state".to_string(),
            error: "vehicle unavailable".to_string(),
            description: Some("asleep".to_string()),
        };
        assert_eq!(err.to_string(), "charge_state: vehicle unavailable: asleep");
        assert_eq!(err.context(), Some("charge_state"));
        assert!(err.is_application());
    }

    #[test]
    fn test_application_display_without_description() {
        let err = VtelError::Application {
            context: "oauth/token".to_string(),
            error: "invalid_grant".to_string(),
            description: Some(String::new()),
        };
        assert_eq!(err.to_string(), "oauth/token: invalid_grant");
    }

    #[test]
    fn test_status_display() {
        let err = VtelError::status("drive_state", 408, "Request Timeout");
        assert_eq!(err.to_string(), "drive_state: server returned 408: Request Timeout");
        assert!(!err.is_application());
    }

    #[test]
    fn test_context_absent_for_credential_errors() {
        assert_eq!(VtelError::InvalidCredential("email").context(), None);
        assert_eq!(VtelError::MissingCredential.context(), None);
    }
}
