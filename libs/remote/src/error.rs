//! Errors returned by the remote boundary.

use thiserror::Error;

/// Errors from entity, task and command calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// The remote refused the request, with a machine-readable reason
    /// (for example `duplicate` or `invalid_name`).
    #[error("rejected ({reason}): {message}")]
    Rejected { reason: String, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command could not be run.
    #[error("command failed: {0}")]
    Command(String),
}

impl RemoteError {
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    pub fn rejected(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Returns true if the entity is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Api { status: 404, .. })
    }

    /// Machine-readable rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result alias for remote calls.
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
