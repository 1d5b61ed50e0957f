//! # The `RuleStore` Contract
//!
//! Typed access to the durable keyed store. Implementations must be safe to
//! share across threads; the engine holds one behind an `Arc`.
//!
//! ## Guarantees required of implementations
//!
//! - `insert_access_rule` is atomic and rejects a second rule for the same
//!   (course, country) pair with [`StoreError::ConstraintViolation`],
//!   regardless of rule type.
//! - `access_rules` returns a course's rules in creation order.
//! - `course_rule_set` reads the course row and its rules as one access.
//! - `delete_restricted_course_cascade` removes the course row and its
//!   rules as one access; a failure leaves both in place.
//! - `append_history` assigns a strictly increasing `sequence`; history rows
//!   are never updated or removed. A row that cannot be decoded on read
//!   surfaces as [`StoreError::Corrupt`].
//! - Every failure surfaces as a [`StoreError`]; nothing is retried.
//!
//! [`StoreError::ConstraintViolation`]: crate::StoreError::ConstraintViolation
//! [`StoreError::Corrupt`]: crate::StoreError::Corrupt
//! [`StoreError`]: crate::StoreError

use embargo_core::{CountryCode, CourseKey};

use crate::error::StoreResult;
use crate::model::{
    CountryAccessRule, CourseEmbargo, GlobalCountryBlock, HistoryEntry, IpFilterList,
    RestrictedCourse,
};

/// A restricted course together with its rules, as read in one access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRuleSet {
    /// The course row.
    pub course: RestrictedCourse,
    /// Its rules in creation order.
    pub rules: Vec<CountryAccessRule>,
}

/// Durable storage for embargo policy rows.
pub trait RuleStore: Send + Sync {
    // -- Course embargo flags ------------------------------------------------

    /// Fetch the embargo row for a course.
    fn course_embargo(&self, course: &CourseKey) -> StoreResult<Option<CourseEmbargo>>;

    /// Insert or replace the embargo row for a course.
    fn put_course_embargo(&self, row: CourseEmbargo) -> StoreResult<()>;

    // -- Append-only global filters -------------------------------------------

    /// The most recently appended country block revision.
    fn latest_country_block(&self) -> StoreResult<Option<GlobalCountryBlock>>;

    /// Append a country block revision.
    fn append_country_block(&self, row: GlobalCountryBlock) -> StoreResult<()>;

    /// The most recently appended IP filter revision.
    fn latest_ip_filter(&self) -> StoreResult<Option<IpFilterList>>;

    /// Append an IP filter revision.
    fn append_ip_filter(&self, row: IpFilterList) -> StoreResult<()>;

    // -- Restricted courses ---------------------------------------------------

    /// Fetch the restricted-course row for a course.
    fn restricted_course(&self, course: &CourseKey) -> StoreResult<Option<RestrictedCourse>>;

    /// List every restricted course.
    fn restricted_courses(&self) -> StoreResult<Vec<RestrictedCourse>>;

    /// Insert a restricted-course row; fails on a duplicate course.
    fn insert_restricted_course(&self, row: RestrictedCourse) -> StoreResult<()>;

    /// Replace an existing restricted-course row. Returns `false` if absent.
    fn update_restricted_course(&self, row: RestrictedCourse) -> StoreResult<bool>;

    /// Delete a restricted-course row together with all of its rules.
    ///
    /// Returns the number of rules removed, or `None` if the course was not
    /// restricted. Either both deletions happen or neither does.
    fn delete_restricted_course_cascade(&self, course: &CourseKey) -> StoreResult<Option<usize>>;

    // -- Country access rules -------------------------------------------------

    /// The rules of a course in creation order.
    fn access_rules(&self, course: &CourseKey) -> StoreResult<Vec<CountryAccessRule>>;

    /// The course row and its rules in one access, or `None` if the course
    /// is not restricted.
    fn course_rule_set(&self, course: &CourseKey) -> StoreResult<Option<CourseRuleSet>>;

    /// Insert a rule, enforcing (course, country) uniqueness and the parent
    /// course's existence.
    fn insert_access_rule(&self, rule: CountryAccessRule) -> StoreResult<()>;

    /// Replace the rule for `rule.course`/`rule.country`, keeping its
    /// position. Returns `false` if there is no such rule.
    fn update_access_rule(&self, rule: CountryAccessRule) -> StoreResult<bool>;

    /// Delete the rule for a (course, country) pair. Returns `false` if absent.
    fn delete_access_rule(&self, course: &CourseKey, country: &CountryCode) -> StoreResult<bool>;

    // -- History --------------------------------------------------------------

    /// Append a history entry. The store assigns `sequence`; the value
    /// passed in is ignored. Returns the stored entry.
    fn append_history(&self, entry: HistoryEntry) -> StoreResult<HistoryEntry>;

    /// The most recent history entry for a course.
    fn latest_history(&self, course: &CourseKey) -> StoreResult<Option<HistoryEntry>>;

    /// All history entries for a course, oldest first.
    fn history(&self, course: &CourseKey) -> StoreResult<Vec<HistoryEntry>>;
}
