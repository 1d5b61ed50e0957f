//! Store error types.

use embargo_core::{CountryCode, CourseKey};
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`RuleStore`](crate::RuleStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// A second access rule was inserted for a (course, country) pair that
    /// already has one, whatever its type.
    #[error("constraint violation: course {course} already has a rule for country {country}")]
    ConstraintViolation {
        /// The restricted course.
        course: CourseKey,
        /// The country already ruled.
        country: CountryCode,
    },

    /// A second restricted-course row was inserted for the same course.
    #[error("constraint violation: course {0} is already restricted")]
    DuplicateRestrictedCourse(CourseKey),

    /// A child row referenced a restricted course that does not exist.
    #[error("foreign key violation: course {0} is not restricted")]
    MissingRestrictedCourse(CourseKey),

    /// The backing store could not serve the call.
    #[error("rule store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
