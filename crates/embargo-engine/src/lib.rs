//! # embargo-engine — Course Embargo Evaluation
//!
//! Decides whether a requester, identified by country and/or IP address,
//! may access a course, and keeps a tamper-evident history of every change
//! to a course's country rules.
//!
//! ## Components
//!
//! - [`AccessEvaluator`]: cached `is_restricted` / `check_country_access`
//!   decisions with commit-gated invalidation.
//! - [`HistoryRecorder`]: append-only, digest-chained rule snapshots.
//! - [`EmbargoService`]: policy reads and writes; each write invalidates
//!   and records history atomically with respect to readers.
//! - [`check_course_access`]: the combined IP / embargo / country-rule
//!   verdict.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use embargo_core::{Country, CountryCode, CourseKey};
//! use embargo_engine::{EmbargoService, EngineConfig};
//! use embargo_store::{InMemoryRuleStore, RuleType};
//!
//! let service = EmbargoService::new(Arc::new(InMemoryRuleStore::new()), EngineConfig::default())?;
//! let course = CourseKey::parse("abc/123/doremi")?;
//! service.create_restricted_course(&course)?;
//! service.add_access_rule(&course, Country::new("NZ")?, RuleType::Blacklist)?;
//!
//! assert!(!service.check_country_access(&course, &CountryCode::new("NZ")?)?);
//! assert!(service.check_country_access(&course, &CountryCode::new("US")?)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod filters;
pub mod history;
pub mod service;

pub use access::{
    check_course_access, AccessRequest, AccessVerdict, CountryResolver, DenialReason,
    NoCountryResolver, StaticCountryResolver,
};
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use evaluator::{AccessEvaluator, Commit, CoursePolicy};
pub use filters::{IpFilterSet, IpFilters};
pub use history::{verify_chain, ChainVerification, HistoryRecorder};
pub use service::EmbargoService;
