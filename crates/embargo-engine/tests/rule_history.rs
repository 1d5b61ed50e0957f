//! # Rule History Tests
//!
//! Exactly one history entry per mutating event, each holding the full
//! post-event rule state in rule creation order.

use std::sync::Arc;

use embargo_core::{Country, CountryCode, CourseKey};
use embargo_engine::{EmbargoService, EngineConfig};
use embargo_store::{HistorySnapshot, InMemoryRuleStore, RuleType};

fn key(s: &str) -> CourseKey {
    CourseKey::parse(s).unwrap()
}

fn code(s: &str) -> CountryCode {
    CountryCode::new(s).unwrap()
}

fn country(s: &str) -> Country {
    Country::new(s).unwrap()
}

fn setup() -> (EmbargoService, InMemoryRuleStore) {
    let store = InMemoryRuleStore::new();
    let service = EmbargoService::new(Arc::new(store.clone()), EngineConfig::default()).unwrap();
    (service, store)
}

/// The `(country, rule_type)` pairs recorded in each entry.
fn recorded_rules(service: &EmbargoService, course: &CourseKey) -> Vec<Option<Vec<(String, RuleType)>>> {
    service
        .history(course)
        .unwrap()
        .into_iter()
        .map(|entry| {
            entry.snapshot.rules().map(|r| {
                r.country_rules
                    .iter()
                    .map(|e| (e.country.as_str().to_string(), e.rule_type))
                    .collect()
            })
        })
        .collect()
}

#[test]
fn test_new_course_snapshot_has_default_keys_and_no_rules() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();

    let latest = service.latest_history(&course).unwrap().unwrap();
    assert_eq!(latest.course, course);
    let rules = latest.snapshot.rules().unwrap();
    assert_eq!(rules.enroll_msg, "default");
    assert_eq!(rules.access_msg, "default");
    assert!(rules.country_rules.is_empty());
}

#[test]
fn test_add_then_remove_rules_one_entry_per_event() {
    let (service, store) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service
        .add_access_rule(&course, country("US"), RuleType::Whitelist)
        .unwrap();
    service
        .add_access_rule(&course, country("AU"), RuleType::Blacklist)
        .unwrap();
    service.remove_access_rule(&course, &code("US")).unwrap();
    service.remove_access_rule(&course, &code("AU")).unwrap();

    let us = ("US".to_string(), RuleType::Whitelist);
    let au = ("AU".to_string(), RuleType::Blacklist);
    assert_eq!(
        recorded_rules(&service, &course),
        vec![
            Some(vec![]),
            Some(vec![us.clone()]),
            Some(vec![us, au.clone()]),
            Some(vec![au]),
            Some(vec![]),
        ]
    );
    assert_eq!(store.history_len(), 5);
}

#[test]
fn test_removing_missing_rule_records_nothing() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    assert!(!service.remove_access_rule(&course, &code("US")).unwrap());
    assert_eq!(service.history(&course).unwrap().len(), 1);
}

#[test]
fn test_cascade_delete_records_single_deleted_entry() {
    let (service, store) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    for c in ["US", "NZ", "AU"] {
        service
            .add_access_rule(&course, country(c), RuleType::Blacklist)
            .unwrap();
    }
    let before = store.history_len();

    assert!(service.delete_restricted_course(&course).unwrap());
    assert_eq!(store.history_len(), before + 1);
    let latest = service.latest_history(&course).unwrap().unwrap();
    assert_eq!(latest.snapshot, HistorySnapshot::Deleted);
    assert_eq!(latest.snapshot.encode().unwrap(), "DELETED");
}

#[test]
fn test_deleting_unrestricted_course_records_nothing() {
    let (service, store) = setup();
    assert!(!service.delete_restricted_course(&key("abc/123/doremi")).unwrap());
    assert_eq!(store.history_len(), 0);
}

#[test]
fn test_rule_type_update_records_new_type() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service
        .add_access_rule(&course, country("US"), RuleType::Whitelist)
        .unwrap();
    service
        .add_access_rule(&course, country("NZ"), RuleType::Whitelist)
        .unwrap();
    service
        .update_access_rule(&course, &code("US"), RuleType::Blacklist)
        .unwrap();

    let latest = recorded_rules(&service, &course).pop().unwrap().unwrap();
    assert_eq!(
        latest,
        vec![
            ("US".to_string(), RuleType::Blacklist),
            ("NZ".to_string(), RuleType::Whitelist),
        ]
    );
}

#[test]
fn test_message_key_change_recorded() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service
        .add_access_rule(&course, country("US"), RuleType::Whitelist)
        .unwrap();
    service
        .update_message_keys(&course, "embargo", "embargo")
        .unwrap();

    let latest = service.latest_history(&course).unwrap().unwrap();
    let json = serde_json::to_value(&latest.snapshot).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "enroll_msg": "embargo",
            "access_msg": "embargo",
            "country_rules": [{"country": "US", "rule_type": "whitelist"}],
        })
    );
}

#[test]
fn test_recreated_course_continues_chain() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service.delete_restricted_course(&course).unwrap();
    service.create_restricted_course(&course).unwrap();

    let entries = service.history(&course).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries[1].snapshot.is_deleted());
    assert!(!entries[2].snapshot.is_deleted());
    assert!(entries.windows(2).all(|w| w[0].sequence < w[1].sequence));

    let check = service.verify_history(&course).unwrap();
    assert!(check.chain_valid);
    assert_eq!(check.total_entries, 3);
}

#[test]
fn test_histories_are_per_course() {
    let (service, _) = setup();
    let first = key("abc/123/doremi");
    let second = key("def/123/doremi");
    service.create_restricted_course(&first).unwrap();
    service.create_restricted_course(&second).unwrap();
    service
        .add_access_rule(&second, country("NZ"), RuleType::Blacklist)
        .unwrap();

    assert_eq!(service.history(&first).unwrap().len(), 1);
    assert_eq!(service.history(&second).unwrap().len(), 2);
    assert!(service.latest_history(&key("ghi/1/2")).unwrap().is_none());
}
