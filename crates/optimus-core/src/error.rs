//! Common error types for the console.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors shared across the console crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No model with the given id exists in the catalogue.
    #[error("unknown model: {0}")]
    UnknownModel(String),
}
