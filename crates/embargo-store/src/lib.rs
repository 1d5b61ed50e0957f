//! # embargo-store — Rule Store Contract
//!
//! The durable keyed store behind the embargo engine, modelled as the
//! [`RuleStore`] trait. The engine treats it as an external collaborator:
//! every read and write goes through the trait, and every failure surfaces
//! as a [`StoreError`].
//!
//! ## Entities
//!
//! | Entity | Shape |
//! |---|---|
//! | [`CourseEmbargo`] | one row per course (upsert) |
//! | [`GlobalCountryBlock`] | append-only, latest wins |
//! | [`IpFilterList`] | append-only, latest wins |
//! | [`RestrictedCourse`] | one row per course, owns its rules |
//! | [`CountryAccessRule`] | unique per (course, country) |
//! | [`HistoryEntry`] | append-only, per-course sequence |
//!
//! [`InMemoryRuleStore`] is the in-process implementation used by the CLI
//! and the test suites. It counts every trait call so that cache behaviour
//! can be asserted in store accesses.

pub mod error;
pub mod memory;
pub mod model;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRuleStore;
pub use model::{
    CountryAccessRule, CourseEmbargo, GlobalCountryBlock, HistoryEntry, HistorySnapshot,
    IpFilterList, RestrictedCourse, RuleSnapshot, RuleSnapshotEntry, RuleType,
    DEFAULT_MESSAGE_KEY, DELETED_MARKER,
};
pub use store::{CourseRuleSet, RuleStore};
