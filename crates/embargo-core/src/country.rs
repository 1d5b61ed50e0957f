//! # Country Primitives
//!
//! - [`CountryCode`] — a validated, upper-cased ISO-3166 alpha-2 code.
//! - [`Country`] — a code known to the [catalog](crate::catalog), rendered
//!   as `"<Name> (<CODE>)"`.
//! - [`CountrySet`] — an ordered, de-duplicated set of codes. Encodes as a
//!   comma-delimited string (`"US, AQ"`) at the storage boundary only.

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// CountryCode
// ---------------------------------------------------------------------------

/// An ISO-3166 alpha-2 country code, normalized to upper case.
///
/// # Validation
///
/// Leading and trailing whitespace is trimmed, then the value must be
/// exactly two ASCII letters. Catalog membership is not required here; use
/// [`Country::new`] when a display name is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Create a country code, trimming and upper-casing the input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCountryCode`] if the trimmed value
    /// is not two ASCII letters.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = value.as_ref();
        let trimmed = raw.trim();
        if trimmed.len() != 2 || !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCountryCode(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Access the code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for CountryCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Country
// ---------------------------------------------------------------------------

/// A country present in the catalog.
///
/// Serializes as its bare code; deserialization re-validates against the
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Country {
    code: CountryCode,
    name: &'static str,
}

impl Country {
    /// Look up a country by code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCountryCode`] for malformed input
    /// and [`ValidationError::UnknownCountry`] for codes not in the catalog.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        Self::from_code(CountryCode::new(code)?)
    }

    /// Look up a country for an already-validated code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownCountry`] if the code is not in the
    /// catalog.
    pub fn from_code(code: CountryCode) -> Result<Self, ValidationError> {
        let name = catalog::display_name(code.as_str())?;
        Ok(Self { code, name })
    }

    /// The country's code.
    pub fn code(&self) -> &CountryCode {
        &self.code
    }

    /// The country's catalog name, e.g. `"New Zealand"`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

impl TryFrom<String> for Country {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Country> for String {
    fn from(country: Country) -> Self {
        country.code.0
    }
}

// The catalog name is `&'static str`, so a derived impl would only accept
// `'static` input.
impl<'de> Deserialize<'de> for Country {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Self::new(code).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// CountrySet
// ---------------------------------------------------------------------------

/// An ordered set of country codes.
///
/// Iteration order is first-insertion order; duplicates are dropped.
/// Membership is a linear scan, which is fine for the handful of codes an
/// embargo list carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountrySet(Vec<CountryCode>);

impl CountrySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a delimited list such as `"US, AQ"`.
    ///
    /// Commas and whitespace both separate entries; empty tokens are
    /// ignored, so `""` parses to the empty set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCountryCode`] for the first token
    /// that is not a well-formed code.
    pub fn parse(delimited: &str) -> Result<Self, ValidationError> {
        let mut set = Self::new();
        for token in delimited
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            set.insert(CountryCode::new(token)?);
        }
        Ok(set)
    }

    /// Insert a code. Returns `false` if it was already present.
    pub fn insert(&mut self, code: CountryCode) -> bool {
        if self.0.contains(&code) {
            return false;
        }
        self.0.push(code);
        true
    }

    /// Whether the set contains a code.
    pub fn contains(&self, code: &CountryCode) -> bool {
        self.0.contains(code)
    }

    /// Whether the set contains a raw code string, normalizing it first.
    /// Malformed input is never a member.
    pub fn contains_str(&self, code: &str) -> bool {
        CountryCode::new(code).is_ok_and(|c| self.contains(&c))
    }

    /// Iterate codes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CountryCode> {
        self.0.iter()
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as `"US, AQ"`.
    pub fn to_delimited(&self) -> String {
        self.0
            .iter()
            .map(CountryCode::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<CountryCode> for CountrySet {
    fn from_iter<I: IntoIterator<Item = CountryCode>>(iter: I) -> Self {
        let mut set = Self::new();
        for code in iter {
            set.insert(code);
        }
        set
    }
}

impl TryFrom<String> for CountrySet {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountrySet> for String {
    fn from(set: CountrySet) -> Self {
        set.to_delimited()
    }
}

impl std::fmt::Display for CountrySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_delimited())
    }
}
