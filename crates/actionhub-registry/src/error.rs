//! Error types for the registry system

use thiserror::Error;

/// Registry-specific errors.
///
/// Handler faults never appear here: they are classified into a failure
/// envelope. Only misuse of the registry itself is reported this way.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("Action '{0}' is not registered")]
    UnknownAction(String),

    #[error("Invalid descriptor for '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

/// Registry result type
pub type RegistryResult<T> = Result<T, RegistryError>;
