//! # Policy Files
//!
//! A YAML document describing a complete embargo policy. Loading one seeds
//! an in-process store through [`EmbargoService`], so every restricted
//! course and rule in the file produces the same history entries an
//! operator making the changes by hand would.
//!
//! ```yaml
//! engine: { cache_capacity: 500 }
//! embargoed_courses: ["abc/123/doremi"]
//! blocked_countries: "US, AQ"
//! ip_filter: { whitelist: ["127.0.0.1"], blacklist: ["1.1.0.0/16"] }
//! geoip: { "1.0.0.0/24": "NZ" }
//! restricted_courses:
//!   - course: edx/DemoX/Demo_Course
//!     access_msg_key: embargo
//!     rules:
//!       - { country: US, rule_type: whitelist }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use embargo_core::{Country, CountrySet, CourseKey};
use embargo_engine::{EmbargoService, EngineConfig, StaticCountryResolver};
use embargo_store::{InMemoryRuleStore, RuleType, DEFAULT_MESSAGE_KEY};
use serde::{Deserialize, Serialize};

/// Top-level policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    /// Engine tunables. Replaces environment configuration when present.
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    /// Courses flagged as embargoed.
    #[serde(default)]
    pub embargoed_courses: Vec<CourseKey>,
    /// Globally blocked countries, e.g. `"US, AQ"`.
    #[serde(default)]
    pub blocked_countries: Option<CountrySet>,
    /// Global IP filters.
    #[serde(default)]
    pub ip_filter: Option<IpFilterSpec>,
    /// Static geo-IP table: address or CIDR block to country code.
    #[serde(default)]
    pub geoip: BTreeMap<String, String>,
    /// Restricted courses and their rules.
    #[serde(default)]
    pub restricted_courses: Vec<RestrictedCourseSpec>,
}

/// The `ip_filter` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IpFilterSpec {
    /// Always-allowed addresses or blocks.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Always-denied addresses or blocks.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

/// One entry of `restricted_courses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestrictedCourseSpec {
    /// The course key.
    pub course: CourseKey,
    /// Enrollment message key; `default` when omitted.
    #[serde(default)]
    pub enroll_msg_key: Option<String>,
    /// Access message key; `default` when omitted.
    #[serde(default)]
    pub access_msg_key: Option<String>,
    /// Country rules in creation order.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// One country rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Ruled country.
    pub country: Country,
    /// `whitelist` or `blacklist`.
    pub rule_type: RuleType,
}

/// What applying a policy produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    /// Courses flagged as embargoed.
    pub embargoed_courses: usize,
    /// Globally blocked countries.
    pub blocked_countries: usize,
    /// IP whitelist entries.
    pub ip_whitelist: usize,
    /// IP blacklist entries.
    pub ip_blacklist: usize,
    /// Restricted courses created.
    pub restricted_courses: usize,
    /// Country rules created.
    pub country_rules: usize,
    /// Geo-IP ranges loaded.
    pub geoip_ranges: usize,
}

impl std::fmt::Display for PolicySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Embargoed courses:  {}", self.embargoed_courses)?;
        writeln!(f, "Blocked countries:  {}", self.blocked_countries)?;
        writeln!(
            f,
            "IP filter:          {} whitelisted, {} blacklisted",
            self.ip_whitelist, self.ip_blacklist
        )?;
        writeln!(
            f,
            "Restricted courses: {} ({} country rules)",
            self.restricted_courses, self.country_rules
        )?;
        write!(f, "Geo-IP ranges:      {}", self.geoip_ranges)
    }
}

impl PolicyFile {
    /// Parse a policy from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("failed to parse policy YAML")
    }

    /// Read and parse a policy file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid policy file {}", path.display()))
    }

    /// The engine configuration: the `engine` section if present, else the
    /// environment.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        match &self.engine {
            Some(config) => {
                config.validate().context("invalid engine section")?;
                Ok(config.clone())
            }
            None => EngineConfig::from_env().context("invalid engine environment"),
        }
    }

    /// Build the static geo-IP resolver from the `geoip` section.
    pub fn resolver(&self) -> Result<StaticCountryResolver> {
        let mut resolver = StaticCountryResolver::new();
        for (range, country) in &self.geoip {
            resolver
                .insert(range, country)
                .with_context(|| format!("invalid geoip entry {range}: {country}"))?;
        }
        Ok(resolver)
    }

    /// Apply every section through `service`.
    pub fn apply(&self, service: &EmbargoService) -> Result<PolicySummary> {
        let mut summary = PolicySummary::default();

        for course in &self.embargoed_courses {
            service
                .set_course_embargo(course, true)
                .with_context(|| format!("failed to embargo {course}"))?;
            summary.embargoed_courses += 1;
        }

        if let Some(countries) = &self.blocked_countries {
            let row = service
                .save_country_block(countries.clone())
                .context("failed to save blocked countries")?;
            summary.blocked_countries = row.embargoed_countries.len();
        }

        if let Some(filter) = &self.ip_filter {
            let row = service
                .save_ip_filter(&filter.whitelist, &filter.blacklist)
                .context("failed to save IP filter")?;
            summary.ip_whitelist = row.whitelist.len();
            summary.ip_blacklist = row.blacklist.len();
        }

        for spec in &self.restricted_courses {
            let course = &spec.course;
            service
                .create_restricted_course(course)
                .with_context(|| format!("failed to restrict {course}"))?;
            summary.restricted_courses += 1;

            if spec.enroll_msg_key.is_some() || spec.access_msg_key.is_some() {
                service
                    .update_message_keys(
                        course,
                        spec.enroll_msg_key.as_deref().unwrap_or(DEFAULT_MESSAGE_KEY),
                        spec.access_msg_key.as_deref().unwrap_or(DEFAULT_MESSAGE_KEY),
                    )
                    .with_context(|| format!("failed to set message keys of {course}"))?;
            }

            for rule in &spec.rules {
                service
                    .add_access_rule(course, rule.country.clone(), rule.rule_type)
                    .with_context(|| {
                        format!("failed to add {} rule for {} on {course}", rule.rule_type, rule.country)
                    })?;
                summary.country_rules += 1;
            }
        }

        summary.geoip_ranges = self.geoip.len();
        tracing::info!(
            restricted_courses = summary.restricted_courses,
            country_rules = summary.country_rules,
            "policy applied"
        );
        Ok(summary)
    }
}

/// A loaded policy: the seeded service and its geo-IP resolver.
#[derive(Debug)]
pub struct LoadedPolicy {
    /// Service over the seeded in-process store.
    pub service: EmbargoService,
    /// Resolver built from the `geoip` section.
    pub resolver: StaticCountryResolver,
    /// What was applied.
    pub summary: PolicySummary,
}

impl LoadedPolicy {
    /// Load `path` into a fresh in-process store.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_policy(&PolicyFile::load(path)?)
    }

    /// Seed a fresh in-process store from `policy`.
    pub fn from_policy(policy: &PolicyFile) -> Result<Self> {
        let config = policy.engine_config()?;
        let store = Arc::new(InMemoryRuleStore::new());
        let service = EmbargoService::new(store, config).context("failed to build service")?;
        let resolver = policy.resolver()?;
        let mut summary = policy.apply(&service)?;
        summary.geoip_ranges = resolver.len();
        Ok(Self {
            service,
            resolver,
            summary,
        })
    }
}
