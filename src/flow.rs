//! Deployment flows and version-based flow permissions

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::PermittedFlowRule;
use crate::version::matches_version;

/// The deployment lifecycle exercised by a matrix entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Flow {
    /// Fresh install of the chart
    Install,
    /// Install the previous patch release, then upgrade to the branch chart
    UpgradePatch,
    /// Install the previous minor release, then upgrade to the branch chart
    UpgradeMinor,
    /// Any other flow name, passed through verbatim
    Other(String),
}

impl Flow {
    /// Canonical flow name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Install => "install",
            Self::UpgradePatch => "upgrade-patch",
            Self::UpgradeMinor => "upgrade-minor",
            Self::Other(name) => name,
        }
    }

    /// Short form used in namespace names
    pub fn abbrev(&self) -> &str {
        match self {
            Self::Install => "inst",
            Self::UpgradePatch => "upgp",
            Self::UpgradeMinor => "upgm",
            Self::Other(name) if name.is_empty() => "inst",
            Self::Other(name) => match name.char_indices().nth(4) {
                Some((end, _)) => &name[..end],
                None => name,
            },
        }
    }
}

impl From<&str> for Flow {
    fn from(s: &str) -> Self {
        match s {
            "install" => Self::Install,
            "upgrade-patch" => Self::UpgradePatch,
            "upgrade-minor" => Self::UpgradeMinor,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Flow {
    fn from(s: String) -> Self {
        Flow::from(s.as_str())
    }
}

impl From<Flow> for String {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a comma-joined flow specification into an ordered flow list.
///
/// An empty specification means `install`. Whitespace is trimmed and empty
/// segments are dropped.
pub fn parse_flow_spec(spec: &str) -> Vec<Flow> {
    let spec = spec.trim();
    if spec.is_empty() {
        return vec![Flow::Install];
    }
    spec.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(Flow::from)
        .collect()
}

/// Remove the flows denied for `version` by any matching rule.
///
/// Denials of every matching rule are unioned. Kept flows preserve their
/// input order. An empty result is a normal outcome meaning "nothing to run
/// for this version".
pub fn filter_flows(rules: &[PermittedFlowRule], version: &str, flows: &[Flow]) -> Vec<Flow> {
    let denied: HashSet<&str> = rules
        .iter()
        .filter(|rule| matches_version(&rule.match_, version))
        .flat_map(|rule| rule.deny.iter().map(String::as_str))
        .collect();

    flows
        .iter()
        .filter(|flow| !denied.contains(flow.as_str()))
        .cloned()
        .collect()
}
