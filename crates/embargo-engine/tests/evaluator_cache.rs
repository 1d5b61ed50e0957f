//! # Evaluator Cache Tests
//!
//! Cache cost is asserted in store accesses: every `RuleStore` call made by
//! the engine increments `InMemoryRuleStore::access_count`.

use std::sync::Arc;

use embargo_core::{Country, CountryCode, CountrySet, CourseKey};
use embargo_engine::{EmbargoService, EngineConfig};
use embargo_store::{InMemoryRuleStore, RuleType};

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

/// Run `f` and return how many store accesses it made.
fn accesses<T>(store: &InMemoryRuleStore, f: impl FnOnce() -> T) -> (T, u64) {
    let before = store.access_count();
    let out = f();
    (out, store.access_count() - before)
}

// -- Restricted flag ------------------------------------------------------------

#[test]
fn test_is_restricted_miss_then_hit() {
    let (service, store) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();

    let (restricted, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert!(restricted);
    assert_eq!(cost, 1);

    let (restricted, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert!(restricted);
    assert_eq!(cost, 0);
}

#[test]
fn test_unrestricted_answer_is_cached_too() {
    let (service, store) = setup();
    let course = key("def/123/doremi");

    let (_, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert_eq!(cost, 1);
    let (restricted, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert!(!restricted);
    assert_eq!(cost, 0);
}

// -- Country decisions ------------------------------------------------------------

#[test]
fn test_country_check_miss_costs_one_access_and_fills_flag() {
    let (service, store) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service
        .add_access_rule(&course, country("US"), RuleType::Whitelist)
        .unwrap();
    service
        .add_access_rule(&course, country("NZ"), RuleType::Blacklist)
        .unwrap();

    let (allowed, cost) = accesses(&store, || {
        service.check_country_access(&course, &code("US")).unwrap()
    });
    assert!(allowed);
    assert_eq!(cost, 1);

    let (_, cost) = accesses(&store, || {
        assert!(!service.check_country_access(&course, &code("NZ")).unwrap());
        assert!(!service.check_country_access(&course, &code("CA")).unwrap());
        assert!(service.is_restricted_course(&course).unwrap());
    });
    assert_eq!(cost, 0);
}

#[test]
fn test_write_invalidates_cached_decision() {
    let (service, store) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    assert!(service.check_country_access(&course, &code("NZ")).unwrap());

    service
        .add_access_rule(&course, country("NZ"), RuleType::Blacklist)
        .unwrap();
    let (allowed, cost) = accesses(&store, || {
        service.check_country_access(&course, &code("NZ")).unwrap()
    });
    assert!(!allowed);
    assert_eq!(cost, 1);

    service.remove_access_rule(&course, &code("NZ")).unwrap();
    assert!(service.check_country_access(&course, &code("NZ")).unwrap());
}

#[test]
fn test_write_to_one_course_keeps_other_courses_cached() {
    let (service, store) = setup();
    let first = key("abc/123/doremi");
    let second = key("def/123/doremi");
    service.create_restricted_course(&first).unwrap();
    service.create_restricted_course(&second).unwrap();
    service.check_country_access(&first, &code("US")).unwrap();
    service.check_country_access(&second, &code("US")).unwrap();

    service
        .add_access_rule(&first, country("US"), RuleType::Blacklist)
        .unwrap();

    let (_, cost) = accesses(&store, || {
        service.check_country_access(&second, &code("US")).unwrap()
    });
    assert_eq!(cost, 0);
}

#[test]
fn test_delete_course_invalidates_flag() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service
        .add_access_rule(&course, country("US"), RuleType::Whitelist)
        .unwrap();
    assert!(service.is_restricted_course(&course).unwrap());
    assert!(!service.check_country_access(&course, &code("NZ")).unwrap());

    assert!(service.delete_restricted_course(&course).unwrap());
    assert!(!service.is_restricted_course(&course).unwrap());
    assert!(service.check_country_access(&course, &code("NZ")).unwrap());
    assert!(service.access_rules(&course).unwrap().is_empty());
}

#[test]
fn test_whitelist_takes_precedence_over_blacklist() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    service
        .add_access_rule(&course, country("NZ"), RuleType::Blacklist)
        .unwrap();
    service
        .add_access_rule(&course, country("US"), RuleType::Whitelist)
        .unwrap();

    assert!(service.check_country_access(&course, &code("US")).unwrap());
    assert!(!service.check_country_access(&course, &code("NZ")).unwrap());
    assert!(!service.check_country_access(&course, &code("CA")).unwrap());
}

#[test]
fn test_restricted_course_without_rules_admits_everyone() {
    let (service, _) = setup();
    let course = key("abc/123/doremi");
    service.create_restricted_course(&course).unwrap();
    assert!(service.check_country_access(&course, &code("KP")).unwrap());
}

// -- Capacity -----------------------------------------------------------------------

#[test]
fn test_capacity_overflow_clears_cache() {
    let store = InMemoryRuleStore::new();
    let config = EngineConfig {
        cache_capacity: 3,
        ..EngineConfig::default()
    };
    let service = EmbargoService::new(Arc::new(store.clone()), config).unwrap();

    let courses: Vec<CourseKey> = (0..3).map(|i| key(&format!("org/c/{i}"))).collect();
    for c in &courses {
        service.is_restricted_course(c).unwrap();
    }
    assert_eq!(service.evaluator().cached_courses(), 3);

    service.is_restricted_course(&key("org/c/99")).unwrap();
    assert_eq!(service.evaluator().cached_courses(), 1);

    let (_, cost) = accesses(&store, || service.is_restricted_course(&courses[0]).unwrap());
    assert_eq!(cost, 1);
}

// -- Global filters -----------------------------------------------------------------

#[test]
fn test_ip_filters_cached_until_saved() {
    let (service, store) = setup();
    let ip = "1.0.0.5".parse().unwrap();
    assert!(!service.ip_in_blacklist(ip).unwrap());

    let (_, cost) = accesses(&store, || service.ip_in_blacklist(ip).unwrap());
    assert_eq!(cost, 0);

    service.save_ip_filter(&["10.0.0.1"], &["1.0.0.0/24"]).unwrap();
    assert!(service.ip_in_blacklist(ip).unwrap());
    assert!(service.ip_in_whitelist("10.0.0.1".parse().unwrap()).unwrap());
    assert!(!service.ip_in_whitelist("10.0.0.2".parse().unwrap()).unwrap());
}

#[test]
fn test_latest_country_block_wins() {
    let (service, store) = setup();
    assert!(service.blocked_countries().unwrap().is_empty());

    service
        .save_country_block(CountrySet::parse("US, AQ").unwrap())
        .unwrap();
    assert!(service.is_country_blocked(&code("AQ")).unwrap());

    service.save_country_block(CountrySet::parse("NZ").unwrap()).unwrap();
    assert!(!service.is_country_blocked(&code("AQ")).unwrap());
    assert!(service.is_country_blocked(&code("NZ")).unwrap());

    let (_, cost) = accesses(&store, || service.blocked_countries().unwrap());
    assert_eq!(cost, 0);
}

#[test]
fn test_country_block_superset_update() {
    let (service, _) = setup();
    service
        .save_country_block(CountrySet::parse("US, AQ").unwrap())
        .unwrap();
    assert_eq!(service.blocked_countries().unwrap().to_delimited(), "US, AQ");
    assert!(!service.is_country_blocked(&code("IM")).unwrap());

    service
        .save_country_block(CountrySet::parse("US, AQ, IM").unwrap())
        .unwrap();
    let blocked = service.blocked_countries().unwrap();
    assert_eq!(blocked.to_delimited(), "US, AQ, IM");
    assert!(blocked.contains(&code("IM")));
}

#[test]
fn test_ip_cidr_membership() {
    let (service, _) = setup();
    service
        .save_ip_filter(&["1.0.0.0/24"], &["1.1.0.0/16", "1.1.0.0/24"])
        .unwrap();

    assert!(service.ip_in_whitelist("1.0.0.100".parse().unwrap()).unwrap());
    assert!(!service.ip_in_whitelist("1.0.1.0".parse().unwrap()).unwrap());
    assert!(service.ip_in_blacklist("1.1.0.1".parse().unwrap()).unwrap());
    assert!(service.ip_in_blacklist("1.1.255.255".parse().unwrap()).unwrap());
    assert!(!service.ip_in_blacklist("1.2.0.0".parse().unwrap()).unwrap());
}

#[test]
fn test_cost_after_create_and_delete() {
    let (service, store) = setup();
    let course = key("abc/123/doremi");

    let (_, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert_eq!(cost, 1);
    let (_, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert_eq!(cost, 0);

    service.create_restricted_course(&course).unwrap();
    let (restricted, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert!(restricted);
    assert_eq!(cost, 1);
    let (_, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert_eq!(cost, 0);

    service.delete_restricted_course(&course).unwrap();
    let (restricted, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert!(!restricted);
    assert_eq!(cost, 1);
    let (_, cost) = accesses(&store, || service.is_restricted_course(&course).unwrap());
    assert_eq!(cost, 0);
}
