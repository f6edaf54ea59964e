//! Semantic versions and half-open version ranges

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version `{input}`: {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: &'static str,
}

/// `major.minor.patch[-prerelease]`. Missing minor or patch components
/// parse as zero and a leading `v` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    pub fn next_major(&self) -> Version {
        Version::new(self.major + 1, 0, 0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| VersionParseError {
            input: s.to_string(),
            reason,
        };
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(fail("empty prerelease")),
            None => (trimmed, None),
        };
        if core.is_empty() {
            return Err(fail("empty version"));
        }

        let mut parts = [0u64; 3];
        let mut count = 0;
        for component in core.split('.') {
            if count == 3 {
                return Err(fail("too many components"));
            }
            parts[count] = component
                .parse()
                .map_err(|_| fail("components must be unsigned integers"))?;
            count += 1;
        }

        Ok(Version {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            pre,
        })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open range `lower..<upper`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lower: Version,
    pub upper: Version,
}

impl VersionRange {
    pub fn new(lower: Version, upper: Version) -> Self {
        VersionRange { lower, upper }
    }

    /// `version..<next major`
    pub fn up_to_next_major(version: Version) -> Self {
        let upper = version.next_major();
        VersionRange::new(version, upper)
    }

    pub fn contains(&self, version: &Version) -> bool {
        &self.lower <= version && version < &self.upper
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..<{}", self.lower, self.upper)
    }
}

impl FromStr for VersionRange {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lower, upper) = s.split_once("..<").ok_or_else(|| VersionParseError {
            input: s.to_string(),
            reason: "expected `lower..<upper`",
        })?;
        let range = VersionRange::new(lower.parse()?, upper.parse()?);
        if range.lower >= range.upper {
            return Err(VersionParseError {
                input: s.to_string(),
                reason: "range is empty",
            });
        }
        Ok(range)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
