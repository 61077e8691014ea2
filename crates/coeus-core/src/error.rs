//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier could not be parsed from its textual form
    #[error("Invalid {field}: {value:?} (expected a non-negative integer)")]
    InvalidId { field: &'static str, value: String },
}
