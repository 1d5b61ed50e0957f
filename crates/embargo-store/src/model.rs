//! # Row Models
//!
//! Plain data rows persisted by a [`RuleStore`](crate::RuleStore), plus the
//! history snapshot encoding.
//!
//! Display impls produce the operator-facing strings used in admin
//! listings, e.g. `Whitelist New Zealand (NZ) for abc/123/doremi`.

use chrono::{DateTime, Utc};
use embargo_core::{ContentDigest, Country, CountryCode, CountrySet, CourseKey};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Message key used when none is configured.
pub const DEFAULT_MESSAGE_KEY: &str = "default";

/// Snapshot marker recorded when a restricted course is deleted.
pub const DELETED_MARKER: &str = "DELETED";

// ---------------------------------------------------------------------------
// CourseEmbargo
// ---------------------------------------------------------------------------

/// Per-course embargo flag. At most one row per course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEmbargo {
    /// The embargoed course.
    pub course: CourseKey,
    /// Whether the embargo is in force.
    pub embargoed: bool,
}

impl std::fmt::Display for CourseEmbargo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.embargoed {
            "Embargoed"
        } else {
            "Not Embargoed"
        };
        write!(f, "Course '{}' is {}", self.course, state)
    }
}

// ---------------------------------------------------------------------------
// Global filters (append-only, latest wins)
// ---------------------------------------------------------------------------

/// One revision of the global blocked-country list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalCountryBlock {
    /// Revision identifier.
    pub id: Uuid,
    /// Blocked countries. Encodes as `"US, AQ"` when serialized.
    pub embargoed_countries: CountrySet,
    /// When this revision was saved.
    pub created_at: DateTime<Utc>,
}

impl GlobalCountryBlock {
    /// Create a new revision stamped now.
    pub fn new(embargoed_countries: CountrySet) -> Self {
        Self {
            id: Uuid::new_v4(),
            embargoed_countries,
            created_at: Utc::now(),
        }
    }

    /// The blocked countries of this revision.
    pub fn embargoed_countries_list(&self) -> &CountrySet {
        &self.embargoed_countries
    }
}

/// One revision of the global IP whitelist/blacklist.
///
/// Entries are kept as the operator wrote them (plain addresses or CIDR
/// blocks); parsing into matchable ranges happens in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpFilterList {
    /// Revision identifier.
    pub id: Uuid,
    /// Addresses or blocks always allowed.
    pub whitelist: Vec<String>,
    /// Addresses or blocks always denied.
    pub blacklist: Vec<String>,
    /// When this revision was saved.
    pub created_at: DateTime<Utc>,
}

impl IpFilterList {
    /// Create a new revision stamped now.
    pub fn new(whitelist: Vec<String>, blacklist: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            whitelist,
            blacklist,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// RestrictedCourse / CountryAccessRule
// ---------------------------------------------------------------------------

/// A course with country-based access rules configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedCourse {
    /// The restricted course. Unique.
    pub course: CourseKey,
    /// Message key shown when enrollment is blocked.
    pub enroll_msg_key: String,
    /// Message key shown when courseware access is blocked.
    pub access_msg_key: String,
}

impl RestrictedCourse {
    /// Create a row with default message keys.
    pub fn new(course: CourseKey) -> Self {
        Self {
            course,
            enroll_msg_key: DEFAULT_MESSAGE_KEY.to_string(),
            access_msg_key: DEFAULT_MESSAGE_KEY.to_string(),
        }
    }
}

impl std::fmt::Display for RestrictedCourse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.course)
    }
}

/// Whether a rule admits or excludes its country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Only whitelisted countries may access the course.
    Whitelist,
    /// Blacklisted countries may not access the course.
    Blacklist,
}

impl RuleType {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
        }
    }

    /// Return the capitalized label used in display strings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Whitelist => "Whitelist",
            Self::Blacklist => "Blacklist",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whitelist" => Ok(Self::Whitelist),
            "blacklist" => Ok(Self::Blacklist),
            other => Err(format!("unknown rule type: {other}")),
        }
    }
}

/// A country rule attached to a restricted course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryAccessRule {
    /// Row identifier.
    pub id: Uuid,
    /// Owning restricted course.
    pub course: CourseKey,
    /// Ruled country.
    pub country: Country,
    /// Whitelist or blacklist.
    pub rule_type: RuleType,
    /// Creation time. Rules of a course are ordered by creation.
    pub created_at: DateTime<Utc>,
}

impl CountryAccessRule {
    /// Create a new rule stamped now.
    pub fn new(course: CourseKey, country: Country, rule_type: RuleType) -> Self {
        Self {
            id: Uuid::new_v4(),
            course,
            country,
            rule_type,
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for CountryAccessRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} for {}",
            self.rule_type.label(),
            self.country,
            self.course
        )
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One rule as recorded in a history snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSnapshotEntry {
    /// Country code.
    pub country: CountryCode,
    /// Rule type, `"whitelist"` or `"blacklist"`.
    pub rule_type: RuleType,
}

/// Full rule state of a course at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSnapshot {
    /// Enrollment message key.
    pub enroll_msg: String,
    /// Access message key.
    pub access_msg: String,
    /// Active rules in creation order.
    pub country_rules: Vec<RuleSnapshotEntry>,
}

impl RuleSnapshot {
    /// Build a snapshot from a course row and its rules.
    pub fn capture(course: &RestrictedCourse, rules: &[CountryAccessRule]) -> Self {
        Self {
            enroll_msg: course.enroll_msg_key.clone(),
            access_msg: course.access_msg_key.clone(),
            country_rules: rules
                .iter()
                .map(|r| RuleSnapshotEntry {
                    country: r.country.code().clone(),
                    rule_type: r.rule_type,
                })
                .collect(),
        }
    }
}

/// A history snapshot: the full rule state, or the deletion marker.
///
/// Serializes as the [`RuleSnapshot`] object or as the bare string
/// `"DELETED"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySnapshot {
    /// The course's rule state after the event.
    Rules(RuleSnapshot),
    /// The restricted course was deleted.
    Deleted,
}

impl HistorySnapshot {
    /// Whether this is the deletion marker.
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// The rule snapshot, if any.
    pub fn rules(&self) -> Option<&RuleSnapshot> {
        match self {
            Self::Rules(r) => Some(r),
            Self::Deleted => None,
        }
    }

    /// Encode for a text column: `DELETED` or the snapshot JSON.
    pub fn encode(&self) -> StoreResult<String> {
        match self {
            Self::Deleted => Ok(DELETED_MARKER.to_string()),
            Self::Rules(r) => Ok(serde_json::to_string(r)?),
        }
    }

    /// Decode a text column written by [`encode`](Self::encode).
    pub fn decode(text: &str) -> StoreResult<Self> {
        if text == DELETED_MARKER {
            return Ok(Self::Deleted);
        }
        serde_json::from_str(text)
            .map(Self::Rules)
            .map_err(|e| StoreError::Corrupt(format!("history snapshot: {e}")))
    }
}

impl Serialize for HistorySnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Deleted => serializer.serialize_str(DELETED_MARKER),
            Self::Rules(r) => r.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for HistorySnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Marker(String),
            Rules(RuleSnapshot),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Marker(m) if m == DELETED_MARKER => Ok(Self::Deleted),
            Repr::Marker(m) => Err(D::Error::custom(format!(
                "unknown history snapshot marker: {m}"
            ))),
            Repr::Rules(r) => Ok(Self::Rules(r)),
        }
    }
}

/// An immutable history log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Row identifier.
    pub id: Uuid,
    /// Store-assigned, strictly increasing append position.
    pub sequence: u64,
    /// The course whose restriction state changed.
    pub course: CourseKey,
    /// State after the event.
    pub snapshot: HistorySnapshot,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
    /// Digest of the previous entry for the same course.
    pub previous_digest: Option<ContentDigest>,
    /// Digest of this entry's canonical body.
    pub digest: ContentDigest,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CourseKey {
        CourseKey::parse(s).unwrap()
    }

    #[test]
    fn course_embargo_display() {
        let mut row = CourseEmbargo {
            course: key("abc/123/doremi"),
            embargoed: true,
        };
        assert_eq!(row.to_string(), "Course 'abc/123/doremi' is Embargoed");
        row.embargoed = false;
        assert_eq!(row.to_string(), "Course 'abc/123/doremi' is Not Embargoed");
    }

    #[test]
    fn restricted_course_display_and_defaults() {
        let rc = RestrictedCourse::new(key("abc/123/doremi"));
        assert_eq!(rc.to_string(), "abc/123/doremi");
        assert_eq!(rc.enroll_msg_key, "default");
        assert_eq!(rc.access_msg_key, "default");
    }

    #[test]
    fn access_rule_display() {
        let nz = Country::new("NZ").unwrap();
        let white = CountryAccessRule::new(key("abc/123/doremi"), nz.clone(), RuleType::Whitelist);
        assert_eq!(
            white.to_string(),
            "Whitelist New Zealand (NZ) for abc/123/doremi"
        );
        let black = CountryAccessRule::new(key("def/123/doremi"), nz, RuleType::Blacklist);
        assert_eq!(
            black.to_string(),
            "Blacklist New Zealand (NZ) for def/123/doremi"
        );
    }

    #[test]
    fn rule_type_parse() {
        assert_eq!("Whitelist".parse::<RuleType>().unwrap(), RuleType::Whitelist);
        assert_eq!("blacklist".parse::<RuleType>().unwrap(), RuleType::Blacklist);
        assert!("greylist".parse::<RuleType>().is_err());
    }

    #[test]
    fn snapshot_serializes_with_exact_keys() {
        let rc = RestrictedCourse::new(key("edx/DemoX/Demo_Course"));
        let rules = vec![
            CountryAccessRule::new(rc.course.clone(), Country::new("US").unwrap(), RuleType::Whitelist),
            CountryAccessRule::new(rc.course.clone(), Country::new("AU").unwrap(), RuleType::Blacklist),
        ];
        let snapshot = HistorySnapshot::Rules(RuleSnapshot::capture(&rc, &rules));
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "enroll_msg": "default",
                "access_msg": "default",
                "country_rules": [
                    {"country": "US", "rule_type": "whitelist"},
                    {"country": "AU", "rule_type": "blacklist"},
                ],
            })
        );
    }

    #[test]
    fn deleted_marker_encoding() {
        assert_eq!(HistorySnapshot::Deleted.encode().unwrap(), "DELETED");
        assert_eq!(
            serde_json::to_string(&HistorySnapshot::Deleted).unwrap(),
            "\"DELETED\""
        );
        assert_eq!(
            HistorySnapshot::decode("DELETED").unwrap(),
            HistorySnapshot::Deleted
        );
        let back: HistorySnapshot = serde_json::from_str("\"DELETED\"").unwrap();
        assert!(back.is_deleted());
    }

    #[test]
    fn snapshot_decode_rejects_extra_keys() {
        let text = r#"{"enroll_msg":"default","access_msg":"default","country_rules":[],"extra":1}"#;
        assert!(HistorySnapshot::decode(text).is_err());
        assert!(serde_json::from_str::<HistorySnapshot>(text).is_err());
    }

    #[test]
    fn snapshot_decode_rejects_unknown_marker() {
        assert!(serde_json::from_str::<HistorySnapshot>("\"GONE\"").is_err());
        assert!(HistorySnapshot::decode("GONE").is_err());
    }

    #[test]
    fn snapshot_text_roundtrip() {
        let snapshot = HistorySnapshot::Rules(RuleSnapshot {
            enroll_msg: "embargo".into(),
            access_msg: "embargo".into(),
            country_rules: vec![RuleSnapshotEntry {
                country: CountryCode::new("US").unwrap(),
                rule_type: RuleType::Whitelist,
            }],
        });
        let text = snapshot.encode().unwrap();
        assert_eq!(HistorySnapshot::decode(&text).unwrap(), snapshot);
    }

    #[test]
    fn access_rule_json_roundtrip() {
        let rule = CountryAccessRule::new(
            key("abc/123/doremi"),
            Country::new("NZ").unwrap(),
            RuleType::Blacklist,
        );
        let text = serde_json::to_string(&rule).unwrap();
        assert!(text.contains("\"country\":\"NZ\""));
        let back: CountryAccessRule = serde_json::from_str(&text).unwrap();
        assert_eq!(back, rule);
        assert_eq!(back.to_string(), "Blacklist New Zealand (NZ) for abc/123/doremi");
    }

    #[test]
    fn country_block_serializes_delimited() {
        let block = GlobalCountryBlock::new(CountrySet::parse("US, AQ").unwrap());
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["embargoed_countries"], "US, AQ");
        assert!(block.embargoed_countries_list().contains_str("AQ"));
    }
}
