//! Engine error types.

use embargo_core::{CanonicalizationError, CourseKey, ValidationError};
use embargo_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Top-level error type for the embargo engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The rule store failed or rejected the call.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Input failed domain validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A rule or message-key change targeted a course with no
    /// restricted-course row.
    #[error("course {0} is not restricted")]
    CourseNotRestricted(CourseKey),

    /// A history entry could not be canonicalized for digesting.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Engine configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
