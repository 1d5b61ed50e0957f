//! # Course Keys
//!
//! [`CourseKey`] is the canonical `org/course/run` course identifier. Every
//! store row and every cache entry is keyed by it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A course identifier of the form `org/course/run`.
///
/// # Validation
///
/// Exactly three segments separated by `/`. Each segment is non-empty and
/// made of ASCII alphanumerics or `-`, `_`, `.`, `~`, `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseKey {
    org: String,
    course: String,
    run: String,
}

impl CourseKey {
    /// Build a key from its three parts.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCourseKey`] if any part is empty
    /// or contains a character outside the allowed set.
    pub fn new(
        org: impl Into<String>,
        course: impl Into<String>,
        run: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let (org, course, run) = (org.into(), course.into(), run.into());
        if ![&org, &course, &run].iter().all(|s| valid_segment(s)) {
            return Err(ValidationError::InvalidCourseKey(format!(
                "{org}/{course}/{run}"
            )));
        }
        Ok(Self { org, course, run })
    }

    /// Parse the canonical `org/course/run` form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCourseKey`] on any shape violation.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let mut parts = value.trim().split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(course), Some(run), None) => Self::new(org, course, run)
                .map_err(|_| ValidationError::InvalidCourseKey(value.to_string())),
            _ => Err(ValidationError::InvalidCourseKey(value.to_string())),
        }
    }

    /// Organization segment.
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Course segment.
    pub fn course(&self) -> &str {
        &self.course
    }

    /// Run segment.
    pub fn run(&self) -> &str {
        &self.run
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | ':'))
}

impl std::fmt::Display for CourseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.course, self.run)
    }
}

impl std::str::FromStr for CourseKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CourseKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CourseKey> for String {
    fn from(key: CourseKey) -> Self {
        key.to_string()
    }
}
