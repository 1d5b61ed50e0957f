#![deny(missing_docs)]

//! # embargo-core — Foundational Types for the Course Embargo Engine
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies; its external ones are `serde`,
//! `serde_json`, `thiserror`, and `sha2`.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`CourseKey`] is not a
//!    `String` and a [`CountryCode`] is not a `&str`. Both validate at
//!    construction time, so downstream code never re-checks format.
//!
//! 2. **One country catalog.** [`catalog`] holds the single ISO-3166-1
//!    alpha-2 table. [`Country`] can only be built for codes present in it,
//!    which makes the `"<Name> (<CODE>)"` display form infallible.
//!
//! 3. **[`CanonicalBytes`] is the sole path to digest computation.** History
//!    entries are chained by SHA-256 digests over canonical JSON.
//!
//! 4. **[`ValidationError`] hierarchy.** Structured errors with `thiserror`.
//!    No `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod canonical;
pub mod catalog;
pub mod country;
pub mod course;
pub mod digest;
pub mod error;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use catalog::display_name;
pub use country::{Country, CountryCode, CountrySet};
pub use course::CourseKey;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, ValidationError};
