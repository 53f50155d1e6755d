//! Error types for the Vantage library.
//!
//! All fallible operations return [`VantageError`] through the crate-wide
//! [`Result`] alias. Build-time errors are fatal for that build attempt;
//! search-time errors are local to the query that raised them.
//!
//! # Examples
//!
//! ```
//! use vantage::error::{Result, VantageError};
//!
//! fn check_leaves(num_leaves: usize) -> Result<()> {
//!     if num_leaves == 0 {
//!         return Err(VantageError::invalid_parameter("num_leaves must be positive"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_leaves(0).is_err());
//! ```

use anyhow;
use thiserror::Error;

/// The main error type for Vantage operations.
#[derive(Error, Debug)]
pub enum VantageError {
    /// A configuration value or argument is non-positive or out of its domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A vector's length disagrees with the dimension of the database.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A query was issued against an index that has not finished building.
    #[error("Index not built: {0}")]
    NotBuilt(String),

    /// A build identifier collides with a live or in-progress index.
    #[error("Duplicate index name: {0}")]
    DuplicateName(String),

    /// A caller-supplied deadline expired before the operation completed.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A registry lookup found nothing under the given name.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with VantageError.
pub type Result<T> = std::result::Result<T, VantageError>;

impl VantageError {
    /// Create a new invalid parameter error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        VantageError::InvalidParameter(msg.into())
    }

    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        VantageError::DimensionMismatch { expected, actual }
    }

    /// Create a new not built error.
    pub fn not_built<S: Into<String>>(msg: S) -> Self {
        VantageError::NotBuilt(msg.into())
    }

    /// Create a new duplicate name error.
    pub fn duplicate_name<S: Into<String>>(msg: S) -> Self {
        VantageError::DuplicateName(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        VantageError::Timeout(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        VantageError::NotFound(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        VantageError::Other(msg.into())
    }

    /// Whether this error came from an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, VantageError::Timeout(_))
    }
}
