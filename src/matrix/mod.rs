//! Test matrix model: entries, generation, filtering and naming
//!
//! The matrix is the ordered list of [`Entry`] cells produced from the chart
//! repository's declarative inputs. Order is version, then scenario declaration,
//! then flow, then platform, and everything downstream relies on it.

mod filter;
mod generate;
mod namespace;
mod print;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::flow::Flow;

pub use filter::{filter, FilterOptions};
pub use generate::{expand_scenarios, generate, GenerateOptions};
pub use namespace::{base_namespace, build_namespace};
pub use print::{render, OutputFormat};

/// One immutable cell of the test matrix
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Chart version, `major.minor`
    pub version: String,
    /// Path of the chart directory on disk
    pub chart_path: PathBuf,
    /// Scenario name
    pub scenario: String,
    /// Compact scenario identifier; may be empty
    #[serde(default)]
    pub shortname: String,
    /// Auth scenario name
    #[serde(default)]
    pub auth: String,
    /// Deployment flow
    pub flow: Flow,
    /// Target platform; `None` means the executor resolves a default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Excluded test suites
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Whether the scenario is enabled in its declaration
    pub enabled: bool,
    /// Explicit identity layer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,
    /// Explicit persistence layer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub persistence: String,
    /// Explicit feature layers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Infrastructure pool type by platform
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub infra_type: BTreeMap<String, String>,
}

impl Entry {
    /// The shortname, falling back to the scenario name when empty
    pub fn short_id(&self) -> &str {
        if self.shortname.is_empty() {
            &self.scenario
        } else {
            &self.shortname
        }
    }

    /// Infrastructure pool type declared for `platform`, if any
    pub fn infra_type_for(&self, platform: &str) -> Option<&str> {
        self.infra_type.get(platform).map(String::as_str)
    }
}

/// Unique versions in the order they first appear
pub fn version_order(entries: &[Entry]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for entry in entries {
        if !order.contains(&entry.version) {
            order.push(entry.version.clone());
        }
    }
    order
}

/// Entries grouped by version, each group preserving input order
pub fn group_by_version(entries: &[Entry]) -> HashMap<String, Vec<&Entry>> {
    let mut groups: HashMap<String, Vec<&Entry>> = HashMap::new();
    for entry in entries {
        groups.entry(entry.version.clone()).or_default().push(entry);
    }
    groups
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build an entry with the fields matrix tests care about
    pub fn entry(version: &str, scenario: &str, flow: &str, platform: Option<&str>) -> Entry {
        Entry {
            version: version.to_string(),
            chart_path: PathBuf::from(format!("charts/camunda-platform-{version}")),
            scenario: scenario.to_string(),
            shortname: String::new(),
            auth: "keycloak".to_string(),
            flow: Flow::from(flow),
            platform: platform.map(str::to_string),
            exclude: Vec::new(),
            enabled: true,
            identity: String::new(),
            persistence: String::new(),
            features: Vec::new(),
            infra_type: BTreeMap::new(),
        }
    }
}
