//! # Global IP Filters
//!
//! Parses the operator-written entries of an [`IpFilterList`] revision into
//! matchable [`IpNet`] ranges. An entry is either a single address
//! (`"10.0.0.1"`, matched exactly) or a CIDR block (`"1.0.0.0/24"`, matched
//! by containment). IPv4 and IPv6 are both accepted.
//!
//! New entries are validated strictly when a revision is saved. Entries read
//! back from the store are parsed leniently: an unparsable row is skipped
//! with a warning rather than taking every access check down with it.

use std::net::IpAddr;

use embargo_core::ValidationError;
use embargo_store::IpFilterList;
use ipnet::IpNet;

/// Parse one filter entry.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidIpEntry`] if the entry is neither an
/// address nor a CIDR block.
pub fn parse_entry(entry: &str) -> Result<IpNet, ValidationError> {
    let trimmed = entry.trim();
    if let Ok(net) = trimmed.parse::<IpNet>() {
        return Ok(net.trunc());
    }
    trimmed
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| ValidationError::InvalidIpEntry(entry.to_string()))
}

/// Split a delimited entry list such as `"1.0.0.0/24, 10.0.0.1"`.
///
/// Commas and whitespace both separate entries; empty tokens are dropped.
pub fn split_entries(delimited: &str) -> Vec<String> {
    delimited
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a list of entries for storage, returning them trimmed.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidIpEntry`] for the first bad entry.
pub fn normalize_entries<S: AsRef<str>>(entries: &[S]) -> Result<Vec<String>, ValidationError> {
    entries
        .iter()
        .map(AsRef::as_ref)
        .filter(|e| !e.trim().is_empty())
        .map(|e| parse_entry(e).map(|_| e.trim().to_string()))
        .collect()
}

/// A parsed list of address ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpFilterSet {
    nets: Vec<IpNet>,
}

impl IpFilterSet {
    /// Parse entries strictly.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIpEntry`] for the first bad entry.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, ValidationError> {
        let nets = entries
            .iter()
            .map(AsRef::as_ref)
            .filter(|e| !e.trim().is_empty())
            .map(parse_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { nets })
    }

    /// Parse stored entries, skipping any that no longer parse.
    pub fn from_stored(entries: &[String]) -> Self {
        let nets = entries
            .iter()
            .filter(|e| !e.trim().is_empty())
            .filter_map(|e| match parse_entry(e) {
                Ok(net) => Some(net),
                Err(err) => {
                    tracing::warn!(entry = %e, error = %err, "skipping unparsable stored IP filter entry");
                    None
                }
            })
            .collect();
        Self { nets }
    }

    /// Whether any range contains `ip`.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(&ip))
    }

    /// Whether any range contains the textual address `ip`. Unparsable
    /// addresses match nothing.
    pub fn contains_str(&self, ip: &str) -> bool {
        ip.trim()
            .parse::<IpAddr>()
            .map(|addr| self.contains(addr))
            .unwrap_or(false)
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    /// Whether there are no ranges.
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

/// The parsed latest IP filter revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpFilters {
    /// Always-allowed ranges.
    pub whitelist: IpFilterSet,
    /// Always-denied ranges.
    pub blacklist: IpFilterSet,
}

impl IpFilters {
    /// Parse a stored revision; `None` yields empty lists.
    pub fn from_row(row: Option<&IpFilterList>) -> Self {
        match row {
            Some(row) => Self {
                whitelist: IpFilterSet::from_stored(&row.whitelist),
                blacklist: IpFilterSet::from_stored(&row.blacklist),
            },
            None => Self::default(),
        }
    }
}
