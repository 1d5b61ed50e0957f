//! # Course Access Check
//!
//! Combines the global IP filters, the course embargo flag, the global
//! country block, and the per-course country rules into one verdict.
//!
//! ## Order
//!
//! 1. Requester IP in the IP blacklist: denied.
//! 2. Requester IP in the IP whitelist: allowed, nothing else consulted.
//! 3. Resolve the request country: the explicit one, else the resolver's
//!    answer for the IP.
//! 4. Course embargoed and a candidate country globally blocked: denied.
//! 5. Course restricted and a candidate country fails its rules: denied.
//! 6. Otherwise allowed.
//!
//! Candidate countries are the request country and the profile country.
//! A country that cannot be determined never causes a denial.

use std::net::IpAddr;

use embargo_core::{CountryCode, CourseKey, ValidationError};
use ipnet::IpNet;
use serde::Serialize;

use crate::error::EngineResult;
use crate::filters::parse_entry;
use crate::service::EmbargoService;

// ---------------------------------------------------------------------------
// Country resolution
// ---------------------------------------------------------------------------

/// Maps a requester IP to a country.
pub trait CountryResolver: Send + Sync {
    /// The country of `ip`, if known.
    fn country_for_ip(&self, ip: IpAddr) -> Option<CountryCode>;
}

/// A resolver that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCountryResolver;

impl CountryResolver for NoCountryResolver {
    fn country_for_ip(&self, _ip: IpAddr) -> Option<CountryCode> {
        None
    }
}

/// Resolver over a fixed table of ranges. The most specific range wins.
#[derive(Debug, Clone, Default)]
pub struct StaticCountryResolver {
    ranges: Vec<(IpNet, CountryCode)>,
}

impl StaticCountryResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `range` (an address or CIDR block) to `country`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if either side does not parse.
    pub fn insert(&mut self, range: &str, country: &str) -> Result<(), ValidationError> {
        let net = parse_entry(range)?;
        let code = CountryCode::new(country)?;
        self.ranges.push((net, code));
        Ok(())
    }

    /// Number of mapped ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges are mapped.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl CountryResolver for StaticCountryResolver {
    fn country_for_ip(&self, ip: IpAddr) -> Option<CountryCode> {
        self.ranges
            .iter()
            .filter(|(net, _)| net.contains(&ip))
            .max_by_key(|(net, _)| net.prefix_len())
            .map(|(_, code)| code.clone())
    }
}

// ---------------------------------------------------------------------------
// Request / verdict
// ---------------------------------------------------------------------------

/// One access attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    /// Target course.
    pub course: CourseKey,
    /// Requester address.
    pub ip: Option<IpAddr>,
    /// Requester country, overriding resolution from `ip`.
    pub country: Option<CountryCode>,
    /// Country recorded on the requester's profile.
    pub profile_country: Option<CountryCode>,
}

impl AccessRequest {
    /// A request for `course` carrying no requester details.
    pub fn new(course: CourseKey) -> Self {
        Self {
            course,
            ip: None,
            country: None,
            profile_country: None,
        }
    }
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The requester IP is in the global IP blacklist.
    IpBlacklisted,
    /// The course is embargoed and the country globally blocked.
    CountryEmbargoed,
    /// The course's country rules exclude the country.
    CountryRestricted,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::IpBlacklisted => "ip blacklisted",
            Self::CountryEmbargoed => "country embargoed",
            Self::CountryRestricted => "country restricted",
        })
    }
}

/// Outcome of [`check_course_access`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessVerdict {
    /// Access may proceed.
    Allowed,
    /// Access must be refused.
    Denied {
        /// Which check refused it.
        reason: DenialReason,
        /// The country that triggered the denial, if country-based.
        country: Option<CountryCode>,
    },
}

impl AccessVerdict {
    /// Whether access may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Decide whether `request` may access its course.
pub fn check_course_access(
    service: &EmbargoService,
    resolver: &dyn CountryResolver,
    request: &AccessRequest,
) -> EngineResult<AccessVerdict> {
    let course = &request.course;

    if let Some(ip) = request.ip {
        if service.ip_in_blacklist(ip)? {
            tracing::info!(course = %course, ip = %ip, "access denied: ip blacklisted");
            return Ok(AccessVerdict::Denied {
                reason: DenialReason::IpBlacklisted,
                country: None,
            });
        }
        if service.ip_in_whitelist(ip)? {
            tracing::debug!(course = %course, ip = %ip, "access allowed: ip whitelisted");
            return Ok(AccessVerdict::Allowed);
        }
    }

    let request_country = request
        .country
        .clone()
        .or_else(|| request.ip.and_then(|ip| resolver.country_for_ip(ip)));

    let mut candidates: Vec<CountryCode> = Vec::with_capacity(2);
    for country in [request_country, request.profile_country.clone()]
        .into_iter()
        .flatten()
    {
        if !candidates.contains(&country) {
            candidates.push(country);
        }
    }
    if candidates.is_empty() {
        return Ok(AccessVerdict::Allowed);
    }

    if service.is_embargoed(course)? {
        let blocked = service.blocked_countries()?;
        if let Some(country) = candidates.iter().find(|c| blocked.contains(c)) {
            tracing::info!(course = %course, country = %country, "access denied: country embargoed");
            return Ok(AccessVerdict::Denied {
                reason: DenialReason::CountryEmbargoed,
                country: Some(country.clone()),
            });
        }
    }

    if service.is_restricted_course(course)? {
        for country in &candidates {
            if !service.check_country_access(course, country)? {
                tracing::info!(course = %course, country = %country, "access denied: country restricted");
                return Ok(AccessVerdict::Denied {
                    reason: DenialReason::CountryRestricted,
                    country: Some(country.clone()),
                });
            }
        }
    }

    Ok(AccessVerdict::Allowed)
}
