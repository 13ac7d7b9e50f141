use purse_core::RemoteError;
use thiserror::Error;

/// Retry policy class for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

#[derive(Debug, Error)]
pub enum HttpRemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HttpRemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => RetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(_) => RetryClass::Retryable,
            Self::Json(_) | Self::Config(_) => RetryClass::Permanent,
        }
    }
}

impl From<HttpRemoteError> for RemoteError {
    fn from(err: HttpRemoteError) -> Self {
        let message = err.to_string();
        match (&err, err.retry_class()) {
            (HttpRemoteError::Json(_), _) => RemoteError::Payload(message),
            (_, RetryClass::ReauthRequired) => RemoteError::PermissionDenied(message),
            (_, RetryClass::Retryable) => RemoteError::Unavailable(message),
            (_, RetryClass::Permanent) => RemoteError::Rejected(message),
        }
    }
}
