//! Deployment seam between the runner and the chart installer
//!
//! The runner builds one immutable [`DeploymentConfig`] per entry and hands it
//! to a [`Deployer`]. Nothing on this path reads or writes the process
//! environment, so entries can deploy concurrently.
//!
//! Upgrade flows deploy twice: the published `upgrade_from_version` chart
//! first, then the branch chart on top of it.

mod helm;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
use mockall::automock;

use crate::flow::Flow;
use crate::Result;

pub use helm::{read_env_file, HelmDeployer};

/// Helm release name used for every matrix deployment
pub const RELEASE_NAME: &str = "integration";

/// Scenario values directory relative to a chart directory
pub const SCENARIO_SUBDIR: &str = "test/integration/scenarios/chart-full-setup";

/// File name prefix of a scenario's values file inside [`SCENARIO_SUBDIR`]
pub const SCENARIO_FILE_PREFIX: &str = "values-integration-test-ingress-";

/// Local alias of the published chart repository
pub const HELM_REPO_NAME: &str = "camunda";

/// URL of the published chart repository
pub const HELM_REPO_URL: &str = "https://helm.camunda.io";

/// Published chart that upgrade flows install first
pub const HELM_CHART_REF: &str = "camunda/camunda-platform";

/// Everything a deployer needs to install one matrix entry
#[derive(Clone, Debug, PartialEq)]
pub struct DeploymentConfig {
    /// Chart version, `major.minor`
    pub version: String,
    /// Local chart directory
    pub chart_path: PathBuf,
    /// Directory holding the scenario values files
    pub scenario_path: PathBuf,
    /// Helm release name
    pub release: String,
    /// Target namespace
    pub namespace: String,
    /// Cluster context; `None` uses the kubeconfig's current context
    pub kube_context: Option<String>,
    /// Effective platform
    pub platform: String,
    /// Infrastructure pool type for the effective platform
    pub infra_type: Option<String>,
    /// `.env` file whose variables are passed to the installer
    pub env_file: Option<PathBuf>,
    /// Deployment flow
    pub flow: Flow,
    /// Scenario name
    pub scenario: String,
    /// Auth scenario name
    pub auth: String,
    /// Explicit identity layer
    pub identity: String,
    /// Explicit persistence layer
    pub persistence: String,
    /// Explicit feature layers
    pub features: Vec<String>,
    /// Test suites to exclude
    pub test_exclude: Vec<String>,
    /// Run integration tests after the deployment
    pub run_integration_tests: bool,
    /// Run end-to-end tests after the deployment
    pub run_e2e_tests: bool,
    /// Select vault-backed secret stores
    pub use_vault_backed_secrets: bool,
    /// Ingress hostname, when ingress is configured
    pub ingress_host: Option<String>,
    /// Log level for the deployment
    pub log_level: String,
    /// Skip `helm dependency update`
    pub skip_dependency_update: bool,
    /// Delete the namespace before deploying
    pub delete_namespace_first: bool,
    /// Published chart version that upgrade flows start from
    pub upgrade_from_version: Option<String>,
}

impl DeploymentConfig {
    /// The scenario's values file, e.g. `.../values-integration-test-ingress-keycloak.yaml`
    pub fn scenario_values_file(&self) -> PathBuf {
        self.scenario_values_file_in(&self.scenario_path)
    }

    /// The scenario's values file inside another scenario directory
    pub fn scenario_values_file_in(&self, scenario_path: &Path) -> PathBuf {
        scenario_path.join(format!("{}{}.yaml", SCENARIO_FILE_PREFIX, self.scenario))
    }

    /// Whether any test suite runs after the deployment
    pub fn runs_tests(&self) -> bool {
        self.run_integration_tests || self.run_e2e_tests
    }
}

/// Installs one matrix entry
///
/// Implementations must honour `cancel`: once it fires, in-flight work should
/// abort promptly and return an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploy a single entry, blocking until it is ready or has failed
    async fn execute(&self, cancel: &CancellationToken, config: &DeploymentConfig) -> Result<()>;
}
