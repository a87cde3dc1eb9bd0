//! Error types for price records

use thiserror::Error;

/// Result type alias for record construction
pub type Result<T> = std::result::Result<T, RecordError>;

/// A price record violated one of its field invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("product name must not be empty")]
    EmptyName,

    #[error("product category must not be empty")]
    EmptyCategory,

    #[error("product price must not be negative: {0}")]
    NegativePrice(String),
}
