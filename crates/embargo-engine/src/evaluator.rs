//! # Access Evaluator
//!
//! Answers "is this course restricted?" and "may this country access this
//! course?" from a per-course decision cache, falling back to the
//! [`RuleStore`] on a miss. The parsed global IP filters and the blocked
//! country list are cached the same way.
//!
//! ## Cost
//!
//! - `is_restricted` miss: one store access (`restricted_course`).
//! - `check_country_access` miss: one store access (`course_rule_set`),
//!   which also fills the course's restricted flag.
//! - Any hit: zero store accesses.
//! - A failed store read caches nothing.
//!
//! ## Invalidation
//!
//! Every read runs under the shared side of a commit gate. Writers take the
//! exclusive side through [`AccessEvaluator::begin_commit`], perform their
//! store writes, and invalidate the affected entries before releasing it.
//! A reader therefore never observes a decision computed from a store state
//! older than a commit it started after, and a fill can never land between
//! a write and its invalidation.
//!
//! The gate is not re-entrant: code holding a [`Commit`] must read the
//! store directly, never through the evaluator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use embargo_core::{CountryCode, CountrySet, CourseKey};
use embargo_store::{CourseRuleSet, RuleStore, RuleType, StoreResult};
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::filters::IpFilters;

// ---------------------------------------------------------------------------
// CoursePolicy
// ---------------------------------------------------------------------------

/// The access decision table of one course, derived from its rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoursePolicy {
    /// No restricted-course row: every country may access.
    Unrestricted,
    /// Restricted but with no rules: every country may access.
    Open,
    /// At least one whitelist rule: only these countries may access.
    /// Blacklist rules on the same course are ignored.
    Whitelist(HashSet<CountryCode>),
    /// Only blacklist rules: every country except these may access.
    Blacklist(HashSet<CountryCode>),
}

impl CoursePolicy {
    /// Derive the policy from a course's rule set.
    pub fn from_rule_set(set: Option<&CourseRuleSet>) -> Self {
        let Some(set) = set else {
            return Self::Unrestricted;
        };
        let codes_of = |wanted: RuleType| -> HashSet<CountryCode> {
            set.rules
                .iter()
                .filter(|r| r.rule_type == wanted)
                .map(|r| r.country.code().clone())
                .collect()
        };
        let whitelist = codes_of(RuleType::Whitelist);
        if !whitelist.is_empty() {
            return Self::Whitelist(whitelist);
        }
        let blacklist = codes_of(RuleType::Blacklist);
        if !blacklist.is_empty() {
            return Self::Blacklist(blacklist);
        }
        Self::Open
    }

    /// Whether a restricted-course row exists.
    pub fn is_restricted(&self) -> bool {
        !matches!(self, Self::Unrestricted)
    }

    /// Whether `country` may access the course.
    pub fn permits(&self, country: &CountryCode) -> bool {
        match self {
            Self::Unrestricted | Self::Open => true,
            Self::Whitelist(allowed) => allowed.contains(country),
            Self::Blacklist(denied) => !denied.contains(country),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CourseSlot {
    restricted: Option<bool>,
    policy: Option<Arc<CoursePolicy>>,
}

/// Cached access decisions over a shared [`RuleStore`].
pub struct AccessEvaluator {
    store: Arc<dyn RuleStore>,
    gate: RwLock<()>,
    courses: RwLock<HashMap<CourseKey, CourseSlot>>,
    ip_filters: RwLock<Option<Arc<IpFilters>>>,
    blocked: RwLock<Option<Arc<CountrySet>>>,
    capacity: usize,
}

impl std::fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEvaluator")
            .field("cached_courses", &self.courses.read().len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl AccessEvaluator {
    /// Create an evaluator caching at most `capacity` courses.
    pub fn new(store: Arc<dyn RuleStore>, capacity: usize) -> Self {
        Self {
            store,
            gate: RwLock::new(()),
            courses: RwLock::new(HashMap::new()),
            ip_filters: RwLock::new(None),
            blocked: RwLock::new(None),
            capacity: capacity.max(1),
        }
    }

    /// Whether a restricted-course row exists for `course`.
    pub fn is_restricted(&self, course: &CourseKey) -> StoreResult<bool> {
        let _read = self.gate.read();
        if let Some(hit) = self.courses.read().get(course).and_then(|s| s.restricted) {
            return Ok(hit);
        }

        let restricted = self.store.restricted_course(course)?.is_some();
        self.fill(course, |slot| slot.restricted = Some(restricted));
        Ok(restricted)
    }

    /// The decision table of `course`.
    pub fn course_policy(&self, course: &CourseKey) -> StoreResult<Arc<CoursePolicy>> {
        let _read = self.gate.read();
        if let Some(hit) = self
            .courses
            .read()
            .get(course)
            .and_then(|s| s.policy.clone())
        {
            return Ok(hit);
        }

        let set = self.store.course_rule_set(course)?;
        let policy = Arc::new(CoursePolicy::from_rule_set(set.as_ref()));
        let restricted = policy.is_restricted();
        self.fill(course, |slot| {
            slot.restricted = Some(restricted);
            slot.policy = Some(Arc::clone(&policy));
        });
        Ok(policy)
    }

    /// Whether `country` may access `course`.
    ///
    /// Unrestricted courses admit every country.
    pub fn check_country_access(
        &self,
        course: &CourseKey,
        country: &CountryCode,
    ) -> StoreResult<bool> {
        Ok(self.course_policy(course)?.permits(country))
    }

    /// The parsed latest IP filter revision.
    pub fn ip_filters(&self) -> StoreResult<Arc<IpFilters>> {
        let _read = self.gate.read();
        if let Some(hit) = self.ip_filters.read().clone() {
            return Ok(hit);
        }

        let row = self.store.latest_ip_filter()?;
        let filters = Arc::new(IpFilters::from_row(row.as_ref()));
        *self.ip_filters.write() = Some(Arc::clone(&filters));
        Ok(filters)
    }

    /// The latest globally blocked country list.
    pub fn blocked_countries(&self) -> StoreResult<Arc<CountrySet>> {
        let _read = self.gate.read();
        if let Some(hit) = self.blocked.read().clone() {
            return Ok(hit);
        }

        let set = Arc::new(
            self.store
                .latest_country_block()?
                .map(|row| row.embargoed_countries)
                .unwrap_or_default(),
        );
        *self.blocked.write() = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Whether `course` carries an embargo flag set to true. Not cached.
    pub fn is_embargoed(&self, course: &CourseKey) -> StoreResult<bool> {
        let _read = self.gate.read();
        Ok(self
            .store
            .course_embargo(course)?
            .map(|row| row.embargoed)
            .unwrap_or(false))
    }

    /// Enter the exclusive side of the commit gate.
    ///
    /// Blocks until in-flight reads finish and keeps new reads out until the
    /// returned [`Commit`] is dropped.
    pub fn begin_commit(&self) -> Commit<'_> {
        Commit {
            evaluator: self,
            _gate: self.gate.write(),
        }
    }

    /// Number of courses currently cached.
    pub fn cached_courses(&self) -> usize {
        self.courses.read().len()
    }

    fn fill(&self, course: &CourseKey, update: impl FnOnce(&mut CourseSlot)) {
        let mut courses = self.courses.write();
        if courses.len() >= self.capacity && !courses.contains_key(course) {
            tracing::debug!(entries = courses.len(), "course cache full, clearing");
            courses.clear();
        }
        update(courses.entry(course.clone()).or_default());
    }
}

/// Exclusive hold on the commit gate. Reads resume when dropped.
#[must_use = "dropping the commit immediately releases the gate"]
pub struct Commit<'a> {
    evaluator: &'a AccessEvaluator,
    _gate: RwLockWriteGuard<'a, ()>,
}

impl Commit<'_> {
    /// Drop every cached decision for `course`.
    pub fn invalidate(&self, course: &CourseKey) {
        if self.evaluator.courses.write().remove(course).is_some() {
            tracing::trace!(course = %course, "invalidated cached decisions");
        }
    }

    /// Drop the cached IP filter revision.
    pub fn invalidate_ip_filters(&self) {
        *self.evaluator.ip_filters.write() = None;
    }

    /// Drop the cached blocked country list.
    pub fn invalidate_country_block(&self) {
        *self.evaluator.blocked.write() = None;
    }
}
