//! Backend error types

use thiserror::Error;

/// Backend failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    /// HTTP status, when the server answered at all
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    /// Non-2xx answer. `detail` is the server's own message, if it sent one.
    pub fn status(status: u16, detail: Option<&str>) -> Self {
        let message = match detail {
            Some(detail) if !detail.is_empty() => format!("HTTP {status}: {detail}"),
            _ => format!("HTTP {status}"),
        };
        Self {
            kind: BackendErrorKind::Status,
            message,
            status: Some(status),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::MalformedResponse, message)
    }

    pub fn cancelled() -> Self {
        Self::new(BackendErrorKind::Cancelled, "request cancelled")
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unknown, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Connection refused, reset, DNS failure
    Network,
    /// No answer within the request timeout
    Timeout,
    /// Server answered with a non-2xx status
    Status,
    /// 2xx answer whose body is not a chat reply
    MalformedResponse,
    /// Aborted by the user
    Cancelled,
    Unknown,
}

impl BackendErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Status => "status",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}
