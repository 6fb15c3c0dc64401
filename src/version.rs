//! Chart version parsing and range constraints
//!
//! Chart versions are `major.minor` pairs. They are always compared as integer
//! pairs, never as strings: `8.10` is newer than `8.9`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::{Error, Result};

/// A `major.minor` chart version
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChartVersion {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
}

impl ChartVersion {
    /// Create a version from its components
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The previous minor release line, e.g. `8.8` -> `8.7`
    pub fn previous_minor(&self) -> Result<Self> {
        match self.minor.checked_sub(1) {
            Some(minor) => Ok(Self::new(self.major, minor)),
            None => Err(Error::config(format!("chart version {} has no previous minor", self))),
        }
    }
}

impl FromStr for ChartVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| Error::config(format!("invalid chart version {s:?}: expected X.Y")))?;
        let major = major
            .parse()
            .map_err(|_| Error::config(format!("invalid major in chart version {s:?}")))?;
        let minor = minor
            .parse()
            .map_err(|_| Error::config(format!("invalid minor in chart version {s:?}")))?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for ChartVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Comparison operator of a [`VersionConstraint`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    /// `==X.Y` or bare `X.Y`
    Eq,
    /// `<=X.Y`
    Le,
    /// `>=X.Y`
    Ge,
    /// `<X.Y`
    Lt,
    /// `>X.Y`
    Gt,
}

impl Operator {
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Le => ord != Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
            Self::Lt => ord == Ordering::Less,
            Self::Gt => ord == Ordering::Greater,
        }
    }
}

/// A version range such as `<=8.7`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionConstraint {
    /// Comparison operator
    pub op: Operator,
    /// Version compared against
    pub target: ChartVersion,
}

impl VersionConstraint {
    /// True when `version` satisfies this constraint
    pub fn matches(&self, version: ChartVersion) -> bool {
        self.op.accepts(version.cmp(&self.target))
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::config("empty version constraint"));
        }

        // Two-character operators must be tried before their one-character prefixes.
        let (op, rest) = if let Some(rest) = s.strip_prefix("<=") {
            (Operator::Le, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (Operator::Ge, rest)
        } else if let Some(rest) = s.strip_prefix("==") {
            (Operator::Eq, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Operator::Lt, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Operator::Gt, rest)
        } else {
            (Operator::Eq, s)
        };

        Ok(Self {
            op,
            target: rest.parse()?,
        })
    }
}

/// Compare two `major.minor` version strings as integer pairs.
///
/// Returns `None` if either side does not parse.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a: ChartVersion = a.parse().ok()?;
    let b: ChartVersion = b.parse().ok()?;
    Some(a.cmp(&b))
}

/// Check whether `version` satisfies `constraint`.
///
/// A constraint or version that fails to parse never matches.
pub fn matches_version(constraint: &str, version: &str) -> bool {
    let constraint: VersionConstraint = match constraint.parse() {
        Ok(c) => c,
        Err(e) => {
            debug!(constraint = %constraint, error = %e, "Ignoring unparseable version constraint");
            return false;
        }
    };
    match version.parse() {
        Ok(v) => constraint.matches(v),
        Err(e) => {
            debug!(version = %version, error = %e, "Version does not parse, constraint cannot match");
            false
        }
    }
}
