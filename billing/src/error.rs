use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A failed attempt of an injected network operation, classified once at
/// the transport boundary so retry logic only matches on the variant.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        status: Option<u16>,
        retry_after: Option<Duration>,
    },

    #[error("client error {status}: {message}")]
    TerminalClient { status: u16, message: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl OperationError {
    /// 408, 429 and 5xx are transient; any other 4xx is terminal. Statuses
    /// outside those ranges are treated as unclassified and retried.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            408 | 429 => OperationError::Transient {
                message,
                status: Some(status),
                retry_after,
            },
            400..=499 => OperationError::TerminalClient { status, message },
            _ => OperationError::Transient {
                message,
                status: Some(status),
                retry_after,
            },
        }
    }

    /// Connection-level failure with no HTTP status.
    pub fn network(message: impl Into<String>) -> Self {
        OperationError::Transient {
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OperationError::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            OperationError::Transient { status, .. } => *status,
            OperationError::TerminalClient { status, .. } => Some(*status),
            OperationError::Unsupported(_) => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OperationError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            OperationError::Transient { message, .. } => message.clone(),
            OperationError::TerminalClient { message, .. } => message.clone(),
            OperationError::Unsupported(kind) => format!("unsupported operation: {kind}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// Rejected on the first terminal client error.
    ClientRejected,
    /// Gave up after the attempt cap.
    RetriesExhausted,
    Unsupported,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            FailureCode::ClientRejected => "CLIENT_REJECTED",
            FailureCode::RetriesExhausted => "RETRIES_EXHAUSTED",
            FailureCode::Unsupported => "UNSUPPORTED",
        };
        f.write_str(code)
    }
}

/// Structured failure returned instead of raising, so callers branch on
/// `code` rather than catching.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{code} after {attempts} attempt(s): {message}")]
pub struct OperationFailure {
    pub code: FailureCode,
    pub message: String,
    pub http_status: Option<u16>,
    pub attempts: u32,
    #[serde(skip)]
    pub last_error: Option<OperationError>,
}

impl OperationFailure {
    /// Converts the error that ended a retry sequence after `attempts` tries.
    pub fn from_error(error: OperationError, attempts: u32) -> Self {
        let code = match &error {
            OperationError::Transient { .. } => FailureCode::RetriesExhausted,
            OperationError::TerminalClient { .. } => FailureCode::ClientRejected,
            OperationError::Unsupported(_) => FailureCode::Unsupported,
        };
        Self {
            code,
            message: error.message(),
            http_status: error.status(),
            attempts,
            last_error: Some(error),
        }
    }

    /// Failure for an operation kind missing from the dispatch table; no
    /// attempt was made.
    pub fn unsupported(kind: &str) -> Self {
        Self {
            code: FailureCode::Unsupported,
            message: format!("unsupported operation: {kind}"),
            http_status: None,
            attempts: 0,
            last_error: Some(OperationError::Unsupported(kind.to_string())),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.code == FailureCode::RetriesExhausted
    }
}
