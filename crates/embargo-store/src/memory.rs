//! # In-Process Rule Store
//!
//! Thread-safe, cloneable implementation of [`RuleStore`] over in-memory
//! tables. Clones share the same tables.
//!
//! All operations are synchronous (the lock is `parking_lot`, not
//! `tokio::sync`) and take the table lock exactly once, so every trait call
//! is atomic. The lock does not poison, so a panicking writer leaves the
//! tables usable.
//!
//! Every trait call increments an access counter, readable through
//! [`InMemoryRuleStore::access_count`]. Cache tests assert on its deltas.
//!
//! History snapshots are held in their text column form
//! ([`HistorySnapshot::encode`]) and decoded on every read, the same
//! boundary a database-backed store has.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use embargo_core::{ContentDigest, CountryCode, CourseKey};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    CountryAccessRule, CourseEmbargo, GlobalCountryBlock, HistoryEntry, HistorySnapshot,
    IpFilterList, RestrictedCourse,
};
use crate::store::{CourseRuleSet, RuleStore};

/// A stored history row. The snapshot is kept as encoded text.
#[derive(Debug, Clone)]
struct HistoryRow {
    id: Uuid,
    sequence: u64,
    course: CourseKey,
    snapshot: String,
    created_at: DateTime<Utc>,
    previous_digest: Option<ContentDigest>,
    digest: ContentDigest,
}

impl HistoryRow {
    fn encode(entry: &HistoryEntry) -> StoreResult<Self> {
        Ok(Self {
            id: entry.id,
            sequence: entry.sequence,
            course: entry.course.clone(),
            snapshot: entry.snapshot.encode()?,
            created_at: entry.created_at,
            previous_digest: entry.previous_digest,
            digest: entry.digest,
        })
    }

    fn decode(&self) -> StoreResult<HistoryEntry> {
        let snapshot = HistorySnapshot::decode(&self.snapshot).map_err(|e| {
            tracing::warn!(
                course = %self.course,
                sequence = self.sequence,
                error = %e,
                "undecodable history row"
            );
            e
        })?;
        Ok(HistoryEntry {
            id: self.id,
            sequence: self.sequence,
            course: self.course.clone(),
            snapshot,
            created_at: self.created_at,
            previous_digest: self.previous_digest,
            digest: self.digest,
        })
    }
}

#[derive(Debug, Default)]
struct Tables {
    embargoes: HashMap<CourseKey, CourseEmbargo>,
    country_blocks: Vec<GlobalCountryBlock>,
    ip_filters: Vec<IpFilterList>,
    restricted: HashMap<CourseKey, RestrictedCourse>,
    // Per-course rules in creation order.
    rules: HashMap<CourseKey, Vec<CountryAccessRule>>,
    history: Vec<HistoryRow>,
    next_sequence: u64,
}

/// In-memory [`RuleStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleStore {
    tables: Arc<RwLock<Tables>>,
    accesses: Arc<AtomicU64>,
}

impl InMemoryRuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far, reads and writes alike.
    pub fn access_count(&self) -> u64 {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Number of history rows across all courses.
    pub fn history_len(&self) -> usize {
        self.tables.read().history.len()
    }

    fn touch(&self) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
    }
}

impl RuleStore for InMemoryRuleStore {
    fn course_embargo(&self, course: &CourseKey) -> StoreResult<Option<CourseEmbargo>> {
        self.touch();
        Ok(self.tables.read().embargoes.get(course).cloned())
    }

    fn put_course_embargo(&self, row: CourseEmbargo) -> StoreResult<()> {
        self.touch();
        self.tables.write().embargoes.insert(row.course.clone(), row);
        Ok(())
    }

    fn latest_country_block(&self) -> StoreResult<Option<GlobalCountryBlock>> {
        self.touch();
        Ok(self.tables.read().country_blocks.last().cloned())
    }

    fn append_country_block(&self, row: GlobalCountryBlock) -> StoreResult<()> {
        self.touch();
        self.tables.write().country_blocks.push(row);
        Ok(())
    }

    fn latest_ip_filter(&self) -> StoreResult<Option<IpFilterList>> {
        self.touch();
        Ok(self.tables.read().ip_filters.last().cloned())
    }

    fn append_ip_filter(&self, row: IpFilterList) -> StoreResult<()> {
        self.touch();
        self.tables.write().ip_filters.push(row);
        Ok(())
    }

    fn restricted_course(&self, course: &CourseKey) -> StoreResult<Option<RestrictedCourse>> {
        self.touch();
        Ok(self.tables.read().restricted.get(course).cloned())
    }

    fn restricted_courses(&self) -> StoreResult<Vec<RestrictedCourse>> {
        self.touch();
        let mut rows: Vec<_> = self.tables.read().restricted.values().cloned().collect();
        rows.sort_by(|a, b| a.course.cmp(&b.course));
        Ok(rows)
    }

    fn insert_restricted_course(&self, row: RestrictedCourse) -> StoreResult<()> {
        self.touch();
        let mut tables = self.tables.write();
        if tables.restricted.contains_key(&row.course) {
            tracing::debug!(course = %row.course, "duplicate restricted course rejected");
            return Err(StoreError::DuplicateRestrictedCourse(row.course));
        }
        tables.restricted.insert(row.course.clone(), row);
        Ok(())
    }

    fn update_restricted_course(&self, row: RestrictedCourse) -> StoreResult<bool> {
        self.touch();
        let mut tables = self.tables.write();
        match tables.restricted.get_mut(&row.course) {
            Some(existing) => {
                *existing = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_restricted_course_cascade(&self, course: &CourseKey) -> StoreResult<Option<usize>> {
        self.touch();
        let mut tables = self.tables.write();
        if tables.restricted.remove(course).is_none() {
            return Ok(None);
        }
        let rules = tables.rules.remove(course).map_or(0, |rules| rules.len());
        tracing::debug!(course = %course, rules, "restricted course deleted");
        Ok(Some(rules))
    }

    fn access_rules(&self, course: &CourseKey) -> StoreResult<Vec<CountryAccessRule>> {
        self.touch();
        Ok(self
            .tables
            .read()
            .rules
            .get(course)
            .cloned()
            .unwrap_or_default())
    }

    fn course_rule_set(&self, course: &CourseKey) -> StoreResult<Option<CourseRuleSet>> {
        self.touch();
        let tables = self.tables.read();
        Ok(tables.restricted.get(course).map(|row| CourseRuleSet {
            course: row.clone(),
            rules: tables.rules.get(course).cloned().unwrap_or_default(),
        }))
    }

    fn insert_access_rule(&self, rule: CountryAccessRule) -> StoreResult<()> {
        self.touch();
        let mut tables = self.tables.write();
        if !tables.restricted.contains_key(&rule.course) {
            return Err(StoreError::MissingRestrictedCourse(rule.course));
        }
        let rules = tables.rules.entry(rule.course.clone()).or_default();
        if rules.iter().any(|r| r.country == rule.country) {
            tracing::debug!(
                course = %rule.course,
                country = %rule.country.code(),
                "duplicate access rule rejected"
            );
            return Err(StoreError::ConstraintViolation {
                course: rule.course,
                country: rule.country.code().clone(),
            });
        }
        rules.push(rule);
        Ok(())
    }

    fn update_access_rule(&self, rule: CountryAccessRule) -> StoreResult<bool> {
        self.touch();
        let mut tables = self.tables.write();
        let Some(rules) = tables.rules.get_mut(&rule.course) else {
            return Ok(false);
        };
        match rules.iter_mut().find(|r| r.country == rule.country) {
            Some(existing) => {
                *existing = rule;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_access_rule(&self, course: &CourseKey, country: &CountryCode) -> StoreResult<bool> {
        self.touch();
        let mut tables = self.tables.write();
        let Some(rules) = tables.rules.get_mut(course) else {
            return Ok(false);
        };
        let before = rules.len();
        rules.retain(|r| r.country.code() != country);
        let removed = rules.len() < before;
        if rules.is_empty() {
            tables.rules.remove(course);
        }
        Ok(removed)
    }

    fn append_history(&self, mut entry: HistoryEntry) -> StoreResult<HistoryEntry> {
        self.touch();
        let mut tables = self.tables.write();
        entry.sequence = tables.next_sequence + 1;
        let row = HistoryRow::encode(&entry)?;
        tables.next_sequence = entry.sequence;
        tables.history.push(row);
        Ok(entry)
    }

    fn latest_history(&self, course: &CourseKey) -> StoreResult<Option<HistoryEntry>> {
        self.touch();
        self.tables
            .read()
            .history
            .iter()
            .rev()
            .find(|row| &row.course == course)
            .map(HistoryRow::decode)
            .transpose()
    }

    fn history(&self, course: &CourseKey) -> StoreResult<Vec<HistoryEntry>> {
        self.touch();
        self.tables
            .read()
            .history
            .iter()
            .filter(|row| &row.course == course)
            .map(HistoryRow::decode)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleType;
    use embargo_core::{Country, CountrySet};

    fn key(s: &str) -> CourseKey {
        CourseKey::parse(s).unwrap()
    }

    fn rule(course: &str, country: &str, rule_type: RuleType) -> CountryAccessRule {
        CountryAccessRule::new(key(course), Country::new(country).unwrap(), rule_type)
    }

    fn entry(course: &str) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            sequence: 0,
            course: key(course),
            snapshot: HistorySnapshot::Deleted,
            created_at: Utc::now(),
            previous_digest: None,
            digest: ContentDigest::from_bytes([0; 32]),
        }
    }

    #[test]
    fn access_counter_counts_every_call() {
        let store = InMemoryRuleStore::new();
        assert_eq!(store.access_count(), 0);
        store.restricted_course(&key("abc/123/doremi")).unwrap();
        store.latest_ip_filter().unwrap();
        assert_eq!(store.access_count(), 2);
    }

    #[test]
    fn clones_share_tables() {
        let store = InMemoryRuleStore::new();
        let other = store.clone();
        store
            .insert_restricted_course(RestrictedCourse::new(key("abc/123/doremi")))
            .unwrap();
        assert!(other
            .restricted_course(&key("abc/123/doremi"))
            .unwrap()
            .is_some());
        assert_eq!(other.access_count(), 2);
    }

    #[test]
    fn course_embargo_upsert() {
        let store = InMemoryRuleStore::new();
        let course = key("abc/123/doremi");
        assert!(store.course_embargo(&course).unwrap().is_none());
        store
            .put_course_embargo(CourseEmbargo { course: course.clone(), embargoed: true })
            .unwrap();
        store
            .put_course_embargo(CourseEmbargo { course: course.clone(), embargoed: false })
            .unwrap();
        assert!(!store.course_embargo(&course).unwrap().unwrap().embargoed);
    }

    #[test]
    fn latest_filter_revision_wins() {
        let store = InMemoryRuleStore::new();
        assert!(store.latest_country_block().unwrap().is_none());
        store
            .append_country_block(GlobalCountryBlock::new(CountrySet::parse("US").unwrap()))
            .unwrap();
        store
            .append_country_block(GlobalCountryBlock::new(CountrySet::parse("US, IM").unwrap()))
            .unwrap();
        let latest = store.latest_country_block().unwrap().unwrap();
        assert_eq!(latest.embargoed_countries.to_delimited(), "US, IM");
    }

    #[test]
    fn duplicate_restricted_course_rejected() {
        let store = InMemoryRuleStore::new();
        let rc = RestrictedCourse::new(key("abc/123/doremi"));
        store.insert_restricted_course(rc.clone()).unwrap();
        assert!(matches!(
            store.insert_restricted_course(rc),
            Err(StoreError::DuplicateRestrictedCourse(_))
        ));
    }

    #[test]
    fn rule_uniqueness_ignores_type() {
        let store = InMemoryRuleStore::new();
        store
            .insert_restricted_course(RestrictedCourse::new(key("abc/123/doremi")))
            .unwrap();
        store
            .insert_access_rule(rule("abc/123/doremi", "NZ", RuleType::Whitelist))
            .unwrap();
        let err = store
            .insert_access_rule(rule("abc/123/doremi", "NZ", RuleType::Blacklist))
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert_eq!(store.access_rules(&key("abc/123/doremi")).unwrap().len(), 1);
    }

    #[test]
    fn rule_requires_parent_course() {
        let store = InMemoryRuleStore::new();
        assert!(matches!(
            store.insert_access_rule(rule("abc/123/doremi", "NZ", RuleType::Whitelist)),
            Err(StoreError::MissingRestrictedCourse(_))
        ));
    }

    #[test]
    fn rules_keep_creation_order_through_update_and_delete() {
        let store = InMemoryRuleStore::new();
        let course = key("edx/DemoX/Demo_Course");
        store
            .insert_restricted_course(RestrictedCourse::new(course.clone()))
            .unwrap();
        for cc in ["US", "AU", "NZ"] {
            store
                .insert_access_rule(rule("edx/DemoX/Demo_Course", cc, RuleType::Whitelist))
                .unwrap();
        }
        assert!(store
            .update_access_rule(rule("edx/DemoX/Demo_Course", "AU", RuleType::Blacklist))
            .unwrap());
        assert!(store
            .delete_access_rule(&course, &CountryCode::new("US").unwrap())
            .unwrap());
        assert!(!store
            .delete_access_rule(&course, &CountryCode::new("US").unwrap())
            .unwrap());

        let set = store.course_rule_set(&course).unwrap().unwrap();
        let codes: Vec<_> = set
            .rules
            .iter()
            .map(|r| (r.country.code().as_str().to_string(), r.rule_type))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("AU".to_string(), RuleType::Blacklist),
                ("NZ".to_string(), RuleType::Whitelist)
            ]
        );
    }

    #[test]
    fn cascade_removes_course_and_rules_together() {
        let store = InMemoryRuleStore::new();
        let course = key("abc/123/doremi");
        assert_eq!(store.delete_restricted_course_cascade(&course).unwrap(), None);

        store
            .insert_restricted_course(RestrictedCourse::new(course.clone()))
            .unwrap();
        for cc in ["US", "AU"] {
            store
                .insert_access_rule(rule("abc/123/doremi", cc, RuleType::Whitelist))
                .unwrap();
        }
        assert_eq!(store.delete_restricted_course_cascade(&course).unwrap(), Some(2));
        assert!(store.restricted_course(&course).unwrap().is_none());
        assert!(store.access_rules(&course).unwrap().is_empty());

        // A recreated course starts with no rules.
        store
            .insert_restricted_course(RestrictedCourse::new(course.clone()))
            .unwrap();
        assert!(store.course_rule_set(&course).unwrap().unwrap().rules.is_empty());
    }

    #[test]
    fn course_rule_set_absent_for_unrestricted_course() {
        let store = InMemoryRuleStore::new();
        assert!(store
            .course_rule_set(&key("abc/123/doremi"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn history_sequence_increases_per_append() {
        let store = InMemoryRuleStore::new();
        let a = store.append_history(entry("abc/123/doremi")).unwrap();
        let b = store.append_history(entry("def/123/doremi")).unwrap();
        let c = store.append_history(entry("abc/123/doremi")).unwrap();
        assert!(a.sequence < b.sequence && b.sequence < c.sequence);
        assert_eq!(
            store
                .latest_history(&key("abc/123/doremi"))
                .unwrap()
                .unwrap()
                .id,
            c.id
        );
        assert_eq!(store.history(&key("abc/123/doremi")).unwrap().len(), 2);
        assert_eq!(store.history_len(), 3);
    }

    #[test]
    fn history_rows_hold_encoded_snapshots() {
        let store = InMemoryRuleStore::new();
        let stored = store.append_history(entry("abc/123/doremi")).unwrap();
        assert_eq!(store.tables.read().history[0].snapshot, "DELETED");
        let back = store.latest_history(&key("abc/123/doremi")).unwrap().unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn undecodable_history_row_is_corrupt() {
        let store = InMemoryRuleStore::new();
        store.append_history(entry("abc/123/doremi")).unwrap();
        store.tables.write().history[0].snapshot = "GONE".to_string();

        assert!(matches!(
            store.latest_history(&key("abc/123/doremi")),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            store.history(&key("abc/123/doremi")),
            Err(StoreError::Corrupt(_))
        ));
        // Other courses are unaffected.
        assert!(store.history(&key("def/123/doremi")).unwrap().is_empty());
    }
}
