use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid numeric id: {0:?}")]
    InvalidId(String),
}

/// Errors produced while resolving a textual bag identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BagIdError {
    #[error("malformed bag id {input:?}: {reason}")]
    Malformed { input: String, reason: &'static str },
}

impl BagIdError {
    pub(crate) fn malformed(input: &str, reason: &'static str) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason,
        }
    }
}
