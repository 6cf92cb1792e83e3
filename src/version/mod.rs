//! @acp:module "Versions"
//! @acp:summary "Version tokens and the supported-version set"
//! @acp:domain cli
//! @acp:layer model
//!
//! A [`VersionToken`] is a dotted numeric release identifier such as `1.33`.
//! Tokens order numerically per component, so `1.9 < 1.10`. Ordering is only
//! used for rendering; membership is what the gate enforces.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// @acp:summary "A single service release identifier"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(String);

impl VersionToken {
    /// @acp:summary "Parse a dotted numeric version, rejecting anything else"
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("empty version".to_string());
        }
        let well_formed = trimmed
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
        if !well_formed {
            return Err(format!("'{}' is not a dotted numeric version", raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn components(&self) -> impl Iterator<Item = u64> + '_ {
        // Components are all ASCII digits; saturate absurdly long ones.
        self.0.split('.').map(|p| p.parse::<u64>().unwrap_or(u64::MAX))
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components()
            .cmp(other.components())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionToken {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionToken> for String {
    fn from(token: VersionToken) -> Self {
        token.0
    }
}

/// @acp:summary "Non-empty set of versions under standard support"
///
/// Construction fails on an empty input; an empty answer from the source is
/// never a valid state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedVersionSet {
    versions: BTreeSet<VersionToken>,
}

impl SupportedVersionSet {
    /// Returns `None` when `versions` is empty.
    pub fn new<I>(versions: I) -> Option<Self>
    where
        I: IntoIterator<Item = VersionToken>,
    {
        let versions: BTreeSet<VersionToken> = versions.into_iter().collect();
        if versions.is_empty() {
            None
        } else {
            Some(Self { versions })
        }
    }

    pub fn contains(&self, version: &VersionToken) -> bool {
        self.versions.contains(version)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Ascending iteration
    pub fn iter(&self) -> impl Iterator<Item = &VersionToken> {
        self.versions.iter()
    }

    pub fn as_set(&self) -> &BTreeSet<VersionToken> {
        &self.versions
    }

    /// `1.32, 1.33, 1.34`
    pub fn joined(&self) -> String {
        join_versions(self.versions.iter())
    }
}

/// @acp:summary "Render versions as a comma-separated list"
pub fn join_versions<'a, I>(versions: I) -> String
where
    I: IntoIterator<Item = &'a VersionToken>,
{
    versions
        .into_iter()
        .map(VersionToken::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
