//! Declared external package requirements

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::version::{Version, VersionParseError, VersionRange};

/// One declared dependency: where the package lives and which revision of
/// it is acceptable.
///
/// Requirements compare by value; a changed list is what tells the processor
/// to resolve packages again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRequirement {
    pub url: String,
    #[serde(flatten)]
    pub constraint: Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constraint {
    /// Anything from this version up to the next major.
    From(Version),
    Version(VersionSpec),
    Branch(String),
    Tag(String),
    Revision(String),
}

/// Either one exact version or a half-open range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    Exact(Version),
    Range(VersionRange),
}

impl PackageRequirement {
    pub fn new(url: impl Into<String>, constraint: Constraint) -> Self {
        PackageRequirement {
            url: url.into(),
            constraint,
        }
    }

    /// The version range a resolver may pick from, for version-based
    /// constraints.
    pub fn range(&self) -> Option<VersionRange> {
        match &self.constraint {
            Constraint::From(v) => Some(VersionRange::up_to_next_major(v.clone())),
            Constraint::Version(VersionSpec::Range(r)) => Some(r.clone()),
            Constraint::Version(VersionSpec::Exact(v)) => {
                let mut upper = v.clone();
                upper.patch += 1;
                upper.pre = None;
                Some(VersionRange::new(v.clone(), upper))
            }
            Constraint::Branch(_) | Constraint::Tag(_) | Constraint::Revision(_) => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::From(v) => write!(f, "from {v}"),
            Constraint::Version(spec) => write!(f, "version {spec}"),
            Constraint::Branch(b) => write!(f, "branch {b}"),
            Constraint::Tag(t) => write!(f, "tag {t}"),
            Constraint::Revision(r) => write!(f, "revision {r}"),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Exact(v) => v.fmt(f),
            VersionSpec::Range(r) => r.fmt(f),
        }
    }
}

impl FromStr for VersionSpec {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains("..<") {
            s.parse().map(VersionSpec::Range)
        } else {
            s.parse().map(VersionSpec::Exact)
        }
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
