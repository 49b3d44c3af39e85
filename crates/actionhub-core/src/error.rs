use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("serde: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

/// The failure categories every action outcome is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    NotFound,
    Forbidden,
    RateLimited,
    Validation,
    UpstreamError,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Validation => "validation",
            Self::UpstreamError => "upstream_error",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed description of one failed call, produced by [`crate::classifier::classify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Seconds the upstream asked callers to wait; reported only, never acted on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Upstream payload with credential-like fields redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<JsonValue>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            retry_after_secs: None,
            raw: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        self.retry_after_secs = secs;
        self
    }

    pub fn with_raw(mut self, raw: JsonValue) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// Anything that can go wrong while serving an action.
///
/// Handlers return these freely; the dispatcher hands every one of them to the
/// classifier so that no fault reaches the caller unconverted.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("missing credential '{field}'")]
    MissingCredential { field: String },

    #[error("upstream responded with HTTP {status}")]
    Status {
        status: u16,
        body: JsonValue,
        retry_after_secs: Option<u64>,
    },

    /// A successful transport response whose body is an error structure.
    #[error("upstream returned an error payload")]
    ErrorBody(JsonValue),

    #[error("invalid input '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("transport failure: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    #[error("request was cancelled")]
    Cancelled,

    #[error("{0}")]
    Unexpected(String),
}

impl Fault {
    pub fn missing_credential(field: impl Into<String>) -> Self {
        Self::MissingCredential {
            field: field.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unexpected(description: impl fmt::Display) -> Self {
        Self::Unexpected(description.to_string())
    }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("malformed payload: {}", err))
    }
}

impl From<CoreError> for Fault {
    fn from(err: CoreError) -> Self {
        Self::Unexpected(err.to_string())
    }
}
