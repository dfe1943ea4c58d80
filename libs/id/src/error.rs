//! Parse errors for harness identifiers.

use thiserror::Error;

/// Why a string is not a valid identifier. `kind` is the expected prefix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{kind} id is empty")]
    Empty { kind: &'static str },

    #[error("{kind} id has no '_' separator")]
    MissingSeparator { kind: &'static str },

    /// Usually a handle id passed where a scope id was expected, or similar.
    #[error("{kind} id carries foreign prefix '{actual}'")]
    WrongPrefix { kind: &'static str, actual: String },

    #[error("{kind} id has a malformed ULID: {reason}")]
    InvalidUlid { kind: &'static str, reason: String },
}

impl IdError {
    pub fn is_prefix_error(&self) -> bool {
        matches!(self, IdError::WrongPrefix { .. })
    }

    /// The prefix of the id type that failed to parse.
    pub fn kind(&self) -> &'static str {
        match self {
            IdError::Empty { kind }
            | IdError::MissingSeparator { kind }
            | IdError::WrongPrefix { kind, .. }
            | IdError::InvalidUlid { kind, .. } => *kind,
        }
    }
}
