//! Declarative matrix inputs read from the chart repository
//!
//! Three YAML files drive the matrix:
//! - `charts/chart-versions.yaml` - chart versions grouped into support tiers
//! - `charts/camunda-platform-<version>/test/ci-test-config.yaml` - scenarios per version
//! - `.github/config/permitted-flows.yaml` - version-range flow deny rules

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Location of the version catalog relative to the repository root
pub const CHART_VERSIONS_FILE: &str = "charts/chart-versions.yaml";

/// Location of the permitted-flow rules relative to the repository root
pub const PERMITTED_FLOWS_FILE: &str = ".github/config/permitted-flows.yaml";

/// Location of the scenario declarations relative to a chart directory
pub const CI_TEST_CONFIG_FILE: &str = "test/ci-test-config.yaml";

/// Directory name prefix of a versioned chart under `charts/`
pub const CHART_DIR_PREFIX: &str = "camunda-platform-";

/// Chart directory for a version, e.g. `<root>/charts/camunda-platform-8.8`
pub fn chart_dir(repo_root: &Path, version: &str) -> PathBuf {
    repo_root
        .join("charts")
        .join(format!("{CHART_DIR_PREFIX}{version}"))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
    serde_yaml::from_str(&data)
        .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
}

// =============================================================================
// chart-versions.yaml
// =============================================================================

/// Parsed `charts/chart-versions.yaml`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersions {
    /// Chart versions by support tier
    #[serde(default)]
    pub camunda_versions: VersionTiers,
}

/// Chart versions grouped by support tier
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionTiers {
    /// Pre-release versions
    pub alpha: Vec<String>,
    /// Versions under standard support
    pub support_standard: Vec<String>,
    /// Versions under extended support (not tested by the matrix)
    pub support_extended: Vec<String>,
    /// Versions no longer supported
    pub end_of_life: Vec<String>,
}

impl ChartVersions {
    /// Active versions: alpha followed by standard support, in file order
    pub fn active_versions(&self) -> Vec<String> {
        let tiers = &self.camunda_versions;
        tiers
            .alpha
            .iter()
            .chain(tiers.support_standard.iter())
            .cloned()
            .collect()
    }
}

/// Load `charts/chart-versions.yaml` from the repository root
pub fn load_chart_versions(repo_root: &Path) -> Result<ChartVersions> {
    read_yaml(&repo_root.join(CHART_VERSIONS_FILE))
}

// =============================================================================
// ci-test-config.yaml
// =============================================================================

/// Parsed `test/ci-test-config.yaml` of one chart version
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CiTestConfig {
    /// Integration test section
    #[serde(default)]
    pub integration: Integration,
}

/// The `integration` section of a ci-test-config
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Integration {
    /// Test cases keyed by trigger
    #[serde(default)]
    pub case: Cases,
}

/// Scenario lists by CI trigger
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Cases {
    /// Scenarios run on pull requests; these feed the matrix
    #[serde(default)]
    pub pr: ScenarioList,
    /// Scenarios run nightly
    #[serde(default)]
    pub nightly: ScenarioList,
}

/// A list of scenario declarations
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScenarioList {
    /// Declared scenarios, in file order
    #[serde(default, rename = "scenario")]
    pub scenarios: Vec<CiScenario>,
}

/// One scenario declaration
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CiScenario {
    /// Scenario name, e.g. `keycloak-original`
    pub name: String,
    /// Whether the scenario runs by default
    pub enabled: bool,
    /// Compact identifier used in namespace names
    pub shortname: String,
    /// Auth scenario name
    pub auth: String,
    /// Comma-joined flow list, e.g. `install,upgrade-patch`
    pub flow: String,
    /// Target platforms; empty means the executor picks its default
    pub platforms: Vec<String>,
    /// Test suites excluded for this scenario
    pub exclude: Vec<String>,
    /// Infrastructure pool type by platform, e.g. `{gke: distroci}`
    #[serde(rename = "infra-type")]
    pub infra_type: BTreeMap<String, String>,
    /// Explicit identity layer
    pub identity: String,
    /// Explicit persistence layer
    pub persistence: String,
    /// Explicit feature layers
    pub features: Vec<String>,
}

/// Load the ci-test-config of a chart directory
pub fn load_ci_test_config(chart_dir: &Path) -> Result<CiTestConfig> {
    read_yaml(&chart_dir.join(CI_TEST_CONFIG_FILE))
}

// =============================================================================
// permitted-flows.yaml
// =============================================================================

/// Parsed `.github/config/permitted-flows.yaml`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PermittedFlows {
    /// Repository-wide flow list; scenarios without a flow still run `install`
    #[serde(default)]
    pub defaults: FlowDefaults,
    /// Deny rules; denials of every matching rule are unioned
    #[serde(default)]
    pub rules: Vec<PermittedFlowRule>,
}

/// Default flow list
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FlowDefaults {
    /// Flows run when nothing else is specified
    #[serde(default)]
    pub flows: Vec<String>,
}

/// A version-range constraint paired with the flows it denies
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PermittedFlowRule {
    /// Version constraint, e.g. `<=8.7` or `==8.9`
    #[serde(rename = "match")]
    pub match_: String,
    /// Flow names denied for matching versions
    #[serde(default)]
    pub deny: Vec<String>,
}

impl PermittedFlowRule {
    /// Create a rule from a constraint and deny list
    pub fn new(match_: impl Into<String>, deny: &[&str]) -> Self {
        Self {
            match_: match_.into(),
            deny: deny.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Load `.github/config/permitted-flows.yaml` from the repository root
pub fn load_permitted_flows(repo_root: &Path) -> Result<PermittedFlows> {
    read_yaml(&repo_root.join(PERMITTED_FLOWS_FILE))
}
