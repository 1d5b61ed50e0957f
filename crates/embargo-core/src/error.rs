//! # Error Hierarchy
//!
//! Validation and canonicalization errors shared by every crate in the
//! workspace, built with `thiserror`. Each variant carries the rejected
//! input so that operators can diagnose a bad policy file without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Country code is not two ASCII letters.
    #[error("invalid country code: \"{0}\" (expected ISO-3166 alpha-2, e.g. \"NZ\")")]
    InvalidCountryCode(String),

    /// Country code is well-formed but absent from the catalog.
    #[error("unknown country code: \"{0}\"")]
    UnknownCountry(String),

    /// Course key does not have the `org/course/run` shape.
    #[error("invalid course key: \"{0}\" (expected org/course/run)")]
    InvalidCourseKey(String),

    /// IP filter entry is neither an IP address nor a CIDR block.
    #[error("invalid IP filter entry: \"{0}\" (expected an address or CIDR block)")]
    InvalidIpEntry(String),

    /// A message key was empty or whitespace-only.
    #[error("invalid message key: must be non-empty")]
    EmptyMessageKey,
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
