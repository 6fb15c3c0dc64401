//! Helm-backed deployer
//!
//! Each entry becomes `helm dependency update` (optional), `helm upgrade
//! --install` and, when test suites are enabled, `helm test`. Upgrade flows
//! first install the published chart from the helm repository. Per-entry
//! settings reach helm only through arguments and the child's own
//! environment.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    DeploymentConfig, Deployer, HELM_CHART_REF, HELM_REPO_NAME, HELM_REPO_URL, SCENARIO_SUBDIR,
};
use crate::catalog::CHART_DIR_PREFIX;
use crate::cluster::NamespaceDeleter;
use crate::flow::Flow;
use crate::version::ChartVersion;
use crate::{Error, Result};

/// Default `--timeout` for helm operations
pub const DEFAULT_HELM_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Captured result of a helm invocation
#[derive(Debug, Clone)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Parse `KEY=VALUE` lines of a `.env` file
///
/// Blank lines and `#` comments are skipped, a leading `export ` is accepted
/// and matching surrounding quotes are stripped from values.
pub fn parse_env(contents: &str) -> Result<Vec<(String, String)>> {
    let mut vars = Vec::new();
    for (lineno, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::config(format!("line {}: expected KEY=VALUE, got {:?}", lineno + 1, raw))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::config(format!("line {}: empty variable name", lineno + 1)));
        }
        vars.push((key.to_string(), unquote(value.trim()).to_string()));
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Read and parse a `.env` file
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read env file {}: {}", path.display(), e)))?;
    parse_env(&contents)
        .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
}

/// Deploys entries by shelling out to helm
pub struct HelmDeployer {
    helm: String,
    timeout: Duration,
    namespaces: Arc<dyn NamespaceDeleter>,
}

impl HelmDeployer {
    /// Helm from `PATH`; `namespaces` handles delete-before-deploy
    pub fn new(namespaces: Arc<dyn NamespaceDeleter>) -> Self {
        Self {
            helm: "helm".to_string(),
            timeout: DEFAULT_HELM_TIMEOUT,
            namespaces,
        }
    }

    /// Use a specific helm binary
    pub fn with_helm_binary(mut self, helm: impl Into<String>) -> Self {
        self.helm = helm.into();
        self
    }

    /// Override the helm `--timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn context_args(config: &DeploymentConfig, args: &mut Vec<String>) {
        if let Some(ctx) = &config.kube_context {
            args.push("--kube-context".to_string());
            args.push(ctx.clone());
        }
    }

    fn dependency_update_args(config: &DeploymentConfig) -> Vec<String> {
        vec![
            "dependency".to_string(),
            "update".to_string(),
            config.chart_path.display().to_string(),
        ]
    }

    fn repo_add_args() -> Vec<String> {
        vec![
            "repo".to_string(),
            "add".to_string(),
            HELM_REPO_NAME.to_string(),
            HELM_REPO_URL.to_string(),
            "--force-update".to_string(),
        ]
    }

    fn repo_update_args() -> Vec<String> {
        vec![
            "repo".to_string(),
            "update".to_string(),
            HELM_REPO_NAME.to_string(),
        ]
    }

    fn upgrade_args(
        &self,
        config: &DeploymentConfig,
        step: &ReleaseStep,
        scenario_values: Option<&Path>,
    ) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            config.release.clone(),
        ];
        match &step.chart {
            ChartSource::Local(path) => args.push(path.display().to_string()),
            ChartSource::Published { version } => {
                args.push(HELM_CHART_REF.to_string());
                args.push("--version".to_string());
                args.push(version.clone());
            }
        }
        args.extend([
            "--namespace".to_string(),
            config.namespace.clone(),
            "--create-namespace".to_string(),
        ]);
        Self::context_args(config, &mut args);
        args.push("--wait".to_string());
        args.push("--timeout".to_string());
        args.push(format!("{}s", self.timeout.as_secs()));
        if step.upgrade {
            args.push("--force".to_string());
        }
        if let Some(values) = scenario_values {
            args.push("--values".to_string());
            args.push(values.display().to_string());
        }
        if let Some(host) = &config.ingress_host {
            args.push("--set".to_string());
            args.push(format!("global.ingress.host={}", host));
        }
        if step.upgrade {
            args.push("--set".to_string());
            args.push("orchestration.upgrade.allowPreReleaseImages=true".to_string());
        }
        args
    }

    fn test_args(&self, config: &DeploymentConfig) -> Vec<String> {
        let mut args = vec![
            "test".to_string(),
            config.release.clone(),
            "--namespace".to_string(),
            config.namespace.clone(),
        ];
        Self::context_args(config, &mut args);
        args.push("--timeout".to_string());
        args.push(format!("{}s", self.timeout.as_secs()));
        args
    }

    /// Environment for the helm child; the parent environment is never modified
    fn child_env(config: &DeploymentConfig) -> Result<Vec<(String, String)>> {
        let mut env = match &config.env_file {
            Some(path) => read_env_file(path)?,
            None => Vec::new(),
        };
        let flag = |b: bool| b.to_string();
        env.extend([
            ("CHART_VERSION".to_string(), config.version.clone()),
            ("FLOW".to_string(), config.flow.to_string()),
            ("PLATFORM".to_string(), config.platform.clone()),
            ("LOG_LEVEL".to_string(), config.log_level.clone()),
            ("TEST_EXCLUDE".to_string(), config.test_exclude.join(",")),
            ("RUN_INTEGRATION_TESTS".to_string(), flag(config.run_integration_tests)),
            ("RUN_E2E_TESTS".to_string(), flag(config.run_e2e_tests)),
            (
                "USE_VAULT_BACKED_SECRETS".to_string(),
                flag(config.use_vault_backed_secrets),
            ),
        ]);
        if let Some(infra) = &config.infra_type {
            env.push(("INFRA_TYPE".to_string(), infra.clone()));
        }
        Ok(env)
    }

    async fn helm(
        &self,
        cancel: &CancellationToken,
        what: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<CommandOutput> {
        if cancel.is_cancelled() {
            return Err(Error::deploy(format!("{} aborted: run cancelled", what)));
        }

        let mut cmd = Command::new(&self.helm);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = ?cmd, "Executing helm");

        let child = cmd
            .spawn()
            .map_err(|e| Error::deploy(format!("{}: failed to execute {}: {}", what, self.helm, e)))?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            out = child.wait_with_output() => out
                .map_err(|e| Error::deploy(format!("{}: {}", what, e)))?,
            _ = cancel.cancelled() => {
                return Err(Error::deploy(format!("{} aborted: run cancelled", what)));
            }
        };

        let output = CommandOutput::from(output);
        if !output.success {
            return Err(Error::deploy(format!(
                "{} failed: {}",
                what,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Dependency update (local charts only), then `helm upgrade --install`
    async fn release(
        &self,
        cancel: &CancellationToken,
        config: &DeploymentConfig,
        step: &ReleaseStep,
        env: &[(String, String)],
    ) -> Result<()> {
        match &step.chart {
            ChartSource::Local(_) if !config.skip_dependency_update => {
                let args = Self::dependency_update_args(config);
                self.helm(cancel, "helm dependency update", &args, env).await?;
            }
            ChartSource::Local(_) => {}
            ChartSource::Published { version } => {
                info!(version = %version, chart = HELM_CHART_REF, "installing published chart");
                self.helm(cancel, "helm repo add", &Self::repo_add_args(), env).await?;
                self.helm(cancel, "helm repo update", &Self::repo_update_args(), env).await?;
            }
        }

        let scenario_values = step.values_file.is_file().then_some(step.values_file.as_path());
        if scenario_values.is_none() {
            debug!(
                scenario = %config.scenario,
                path = %step.values_file.display(),
                "no scenario values file, using chart defaults"
            );
        }

        let upgrade = self.upgrade_args(config, step, scenario_values);
        let out = self.helm(cancel, "helm upgrade", &upgrade, env).await?;
        debug!(namespace = %config.namespace, stdout = %out.stdout.trim(), "helm upgrade finished");
        Ok(())
    }
}

/// Chart a release step installs
#[derive(Debug, Clone, PartialEq)]
enum ChartSource {
    /// Chart directory on disk
    Local(PathBuf),
    /// [`HELM_CHART_REF`] at a published version
    Published { version: String },
}

/// One `helm upgrade --install` of a deployment
#[derive(Debug, Clone, PartialEq)]
struct ReleaseStep {
    chart: ChartSource,
    /// Scenario values file, passed when it exists
    values_file: PathBuf,
    /// Upgrades the release installed by the previous step
    upgrade: bool,
}

/// Release steps for the entry's flow
///
/// `upgrade-patch` starts from the published chart with the branch's values.
/// `upgrade-minor` starts from it with the previous minor chart's values.
/// Every other flow is a single install of the branch chart.
fn release_steps(config: &DeploymentConfig) -> Result<Vec<ReleaseStep>> {
    let branch = ReleaseStep {
        chart: ChartSource::Local(config.chart_path.clone()),
        values_file: config.scenario_values_file(),
        upgrade: false,
    };

    let from_values = match config.flow {
        Flow::UpgradePatch => config.scenario_values_file(),
        Flow::UpgradeMinor => {
            let previous = config.version.parse::<ChartVersion>()?.previous_minor()?;
            let chart = config
                .chart_path
                .with_file_name(format!("{}{}", CHART_DIR_PREFIX, previous));
            config.scenario_values_file_in(&chart.join(SCENARIO_SUBDIR))
        }
        _ => return Ok(vec![branch]),
    };

    let version = config
        .upgrade_from_version
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::config(format!(
                "flow {} for chart {} needs an upgrade-from chart version",
                config.flow, config.version
            ))
        })?;

    Ok(vec![
        ReleaseStep {
            chart: ChartSource::Published { version },
            values_file: from_values,
            upgrade: false,
        },
        ReleaseStep {
            upgrade: true,
            ..branch
        },
    ])
}

#[async_trait]
impl Deployer for HelmDeployer {
    async fn execute(&self, cancel: &CancellationToken, config: &DeploymentConfig) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::deploy(format!(
                "deployment of {} aborted: run cancelled",
                config.namespace
            )));
        }

        let env = Self::child_env(config)?;
        let steps = release_steps(config)?;

        if config.delete_namespace_first {
            self.namespaces
                .delete_namespace(config.kube_context.clone(), config.namespace.clone())
                .await?;
        }

        let total = steps.len();
        for (i, step) in steps.iter().enumerate() {
            if total > 1 {
                info!(
                    namespace = %config.namespace,
                    flow = %config.flow,
                    step = i + 1,
                    steps = total,
                    upgrade = step.upgrade,
                    "release step"
                );
            }
            self.release(cancel, config, step, &env)
                .await
                .map_err(|e| match total {
                    1 => e,
                    _ => Error::deploy(format!("step {}/{}: {}", i + 1, total, e)),
                })?;
        }

        if config.runs_tests() {
            info!(namespace = %config.namespace, "running chart tests");
            self.helm(cancel, "helm test", &self.test_args(config), &env).await?;
        }

        Ok(())
    }
}
