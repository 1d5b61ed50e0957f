//! # Embargo Service
//!
//! The single entry point for reading and changing embargo policy.
//!
//! Every write follows the same sequence under the evaluator's commit gate:
//!
//! 1. Perform the store write.
//! 2. Invalidate the affected cache entries, whether or not the write
//!    succeeded.
//! 3. Propagate the store error, if any.
//! 4. Append exactly one history entry for a course-rule change.
//!
//! A history append that fails is logged at `error` level and counted in
//! [`EmbargoService::history_failures`]; the mutation itself has already
//! committed and still returns `Ok`.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use embargo_core::{Country, CountryCode, CountrySet, CourseKey, ValidationError};
use embargo_store::{
    CountryAccessRule, CourseEmbargo, GlobalCountryBlock, HistoryEntry, HistorySnapshot,
    IpFilterList, RestrictedCourse, RuleStore, RuleType,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::evaluator::AccessEvaluator;
use crate::filters::normalize_entries;
use crate::history::{ChainVerification, HistoryRecorder};

/// Policy reads and writes over a shared [`RuleStore`].
pub struct EmbargoService {
    store: Arc<dyn RuleStore>,
    evaluator: AccessEvaluator,
    recorder: HistoryRecorder,
    config: EngineConfig,
    history_failures: AtomicU64,
}

impl std::fmt::Debug for EmbargoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbargoService")
            .field("evaluator", &self.evaluator)
            .field("config", &self.config)
            .field("history_failures", &self.history_failures())
            .finish_non_exhaustive()
    }
}

impl EmbargoService {
    /// Build a service over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if `config` fails validation.
    pub fn new(store: Arc<dyn RuleStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            evaluator: AccessEvaluator::new(Arc::clone(&store), config.cache_capacity),
            recorder: HistoryRecorder::new(Arc::clone(&store)),
            store,
            config,
            history_failures: AtomicU64::new(0),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The evaluator backing cached reads.
    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    /// Number of history appends that failed since construction.
    pub fn history_failures(&self) -> u64 {
        self.history_failures.load(Ordering::Relaxed)
    }

    // -- Reads ----------------------------------------------------------------

    /// Whether `course` is flagged as embargoed.
    pub fn is_embargoed(&self, course: &CourseKey) -> EngineResult<bool> {
        Ok(self.evaluator.is_embargoed(course)?)
    }

    /// Whether `course` has a restricted-course row.
    pub fn is_restricted_course(&self, course: &CourseKey) -> EngineResult<bool> {
        Ok(self.evaluator.is_restricted(course)?)
    }

    /// Whether `country` may access `course` under its country rules.
    pub fn check_country_access(
        &self,
        course: &CourseKey,
        country: &CountryCode,
    ) -> EngineResult<bool> {
        Ok(self.evaluator.check_country_access(course, country)?)
    }

    /// Whether `ip` falls inside the latest IP whitelist.
    pub fn ip_in_whitelist(&self, ip: IpAddr) -> EngineResult<bool> {
        Ok(self.evaluator.ip_filters()?.whitelist.contains(ip))
    }

    /// Whether `ip` falls inside the latest IP blacklist.
    pub fn ip_in_blacklist(&self, ip: IpAddr) -> EngineResult<bool> {
        Ok(self.evaluator.ip_filters()?.blacklist.contains(ip))
    }

    /// The latest globally blocked country list.
    pub fn blocked_countries(&self) -> EngineResult<Arc<CountrySet>> {
        Ok(self.evaluator.blocked_countries()?)
    }

    /// Whether `country` is globally blocked.
    pub fn is_country_blocked(&self, country: &CountryCode) -> EngineResult<bool> {
        Ok(self.evaluator.blocked_countries()?.contains(country))
    }

    /// The restricted-course row for `course`, if any.
    pub fn restricted_course(&self, course: &CourseKey) -> EngineResult<Option<RestrictedCourse>> {
        Ok(self.store.restricted_course(course)?)
    }

    /// Every restricted course.
    pub fn restricted_courses(&self) -> EngineResult<Vec<RestrictedCourse>> {
        Ok(self.store.restricted_courses()?)
    }

    /// The rules of `course` in creation order.
    pub fn access_rules(&self, course: &CourseKey) -> EngineResult<Vec<CountryAccessRule>> {
        Ok(self.store.access_rules(course)?)
    }

    /// The most recent history entry for `course`.
    pub fn latest_history(&self, course: &CourseKey) -> EngineResult<Option<HistoryEntry>> {
        Ok(self.recorder.latest(course)?)
    }

    /// Every history entry for `course`, oldest first.
    pub fn history(&self, course: &CourseKey) -> EngineResult<Vec<HistoryEntry>> {
        Ok(self.recorder.entries(course)?)
    }

    /// Re-check the history chain of `course`.
    pub fn verify_history(&self, course: &CourseKey) -> EngineResult<ChainVerification> {
        self.recorder.verify(course)
    }

    // -- Global filters ---------------------------------------------------------

    /// Set or clear the embargo flag of `course`.
    pub fn set_course_embargo(&self, course: &CourseKey, embargoed: bool) -> EngineResult<CourseEmbargo> {
        let row = CourseEmbargo {
            course: course.clone(),
            embargoed,
        };
        let _commit = self.evaluator.begin_commit();
        self.store.put_course_embargo(row.clone())?;
        tracing::info!(course = %course, embargoed, "course embargo flag saved");
        Ok(row)
    }

    /// Append a new revision of the global blocked-country list.
    pub fn save_country_block(&self, countries: CountrySet) -> EngineResult<GlobalCountryBlock> {
        for code in countries.iter() {
            embargo_core::display_name(code.as_str())?;
        }
        let row = GlobalCountryBlock::new(countries);
        let commit = self.evaluator.begin_commit();
        let written = self.store.append_country_block(row.clone());
        commit.invalidate_country_block();
        written?;
        tracing::info!(countries = %row.embargoed_countries, "global country block saved");
        Ok(row)
    }

    /// Append a new revision of the global IP filters.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if any entry is neither an
    /// address nor a CIDR block; nothing is written.
    pub fn save_ip_filter<S: AsRef<str>>(
        &self,
        whitelist: &[S],
        blacklist: &[S],
    ) -> EngineResult<IpFilterList> {
        let row = IpFilterList::new(normalize_entries(whitelist)?, normalize_entries(blacklist)?);
        let commit = self.evaluator.begin_commit();
        let written = self.store.append_ip_filter(row.clone());
        commit.invalidate_ip_filters();
        written?;
        tracing::info!(
            whitelist = row.whitelist.len(),
            blacklist = row.blacklist.len(),
            "global IP filter saved"
        );
        Ok(row)
    }

    // -- Restricted courses -------------------------------------------------------

    /// Create a restricted-course row with default message keys.
    pub fn create_restricted_course(&self, course: &CourseKey) -> EngineResult<RestrictedCourse> {
        let row = RestrictedCourse::new(course.clone());
        let commit = self.evaluator.begin_commit();
        let written = self.store.insert_restricted_course(row.clone());
        commit.invalidate(course);
        written?;
        tracing::info!(course = %course, "restricted course created");
        self.record_history(course, None);
        Ok(row)
    }

    /// Change the message keys of a restricted course.
    pub fn update_message_keys(
        &self,
        course: &CourseKey,
        enroll_msg_key: &str,
        access_msg_key: &str,
    ) -> EngineResult<RestrictedCourse> {
        if enroll_msg_key.trim().is_empty() || access_msg_key.trim().is_empty() {
            return Err(ValidationError::EmptyMessageKey.into());
        }
        let row = RestrictedCourse {
            course: course.clone(),
            enroll_msg_key: enroll_msg_key.trim().to_string(),
            access_msg_key: access_msg_key.trim().to_string(),
        };
        let commit = self.evaluator.begin_commit();
        let written = self.store.update_restricted_course(row.clone());
        commit.invalidate(course);
        if !written? {
            return Err(EngineError::CourseNotRestricted(course.clone()));
        }
        tracing::info!(course = %course, "restricted course message keys updated");
        self.record_history(course, None);
        Ok(row)
    }

    /// Delete a restricted course and every rule it owns.
    ///
    /// The course row and its rules go in one store call, so a failure
    /// leaves both in place. Records a single `DELETED` history entry.
    /// Returns `false` if the course was not restricted.
    pub fn delete_restricted_course(&self, course: &CourseKey) -> EngineResult<bool> {
        let commit = self.evaluator.begin_commit();
        let removed = self.store.delete_restricted_course_cascade(course);
        commit.invalidate(course);
        let Some(rules) = removed? else {
            return Ok(false);
        };
        tracing::info!(course = %course, rules, "restricted course deleted");
        self.record_history(course, Some(HistorySnapshot::Deleted));
        Ok(true)
    }

    // -- Country access rules -----------------------------------------------------

    /// Add a country rule to a restricted course.
    ///
    /// # Errors
    ///
    /// - [`EngineError::CourseNotRestricted`] if the course has no
    ///   restricted-course row.
    /// - [`StoreError::ConstraintViolation`] (wrapped) if the course already
    ///   has a rule for the country, whatever its type.
    ///
    /// [`StoreError::ConstraintViolation`]: embargo_store::StoreError::ConstraintViolation
    pub fn add_access_rule(
        &self,
        course: &CourseKey,
        country: Country,
        rule_type: RuleType,
    ) -> EngineResult<CountryAccessRule> {
        let rule = CountryAccessRule::new(course.clone(), country, rule_type);
        let commit = self.evaluator.begin_commit();
        if self.store.restricted_course(course)?.is_none() {
            return Err(EngineError::CourseNotRestricted(course.clone()));
        }
        let written = self.store.insert_access_rule(rule.clone());
        commit.invalidate(course);
        written?;
        tracing::info!(course = %course, rule = %rule, "country access rule added");
        self.record_history(course, None);
        Ok(rule)
    }

    /// Change the type of an existing rule.
    ///
    /// Returns `Ok(None)` if the course has no rule for `country`.
    pub fn update_access_rule(
        &self,
        course: &CourseKey,
        country: &CountryCode,
        rule_type: RuleType,
    ) -> EngineResult<Option<CountryAccessRule>> {
        let commit = self.evaluator.begin_commit();
        let Some(mut rule) = self
            .store
            .access_rules(course)?
            .into_iter()
            .find(|r| r.country.code() == country)
        else {
            return Ok(None);
        };
        rule.rule_type = rule_type;
        let written = self.store.update_access_rule(rule.clone());
        commit.invalidate(course);
        if !written? {
            return Ok(None);
        }
        tracing::info!(course = %course, rule = %rule, "country access rule updated");
        self.record_history(course, None);
        Ok(Some(rule))
    }

    /// Remove the rule for `country` from `course`.
    ///
    /// Returns `false` if there was no such rule.
    pub fn remove_access_rule(&self, course: &CourseKey, country: &CountryCode) -> EngineResult<bool> {
        let commit = self.evaluator.begin_commit();
        let removed = self.store.delete_access_rule(course, country);
        commit.invalidate(course);
        if !removed? {
            return Ok(false);
        }
        tracing::info!(course = %course, country = %country, "country access rule removed");
        self.record_history(course, None);
        Ok(true)
    }

    // -- History ------------------------------------------------------------------

    /// Append one history entry for `course`: `snapshot` if given, else the
    /// captured current state. Must be called with the commit gate held.
    fn record_history(&self, course: &CourseKey, snapshot: Option<HistorySnapshot>) {
        let result = match snapshot {
            Some(snapshot) => self.recorder.append(course, snapshot),
            None => self.recorder.record(course),
        };
        if let Err(err) = result {
            self.history_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(course = %course, error = %err, "failed to append rule history entry");
        }
    }
}
