//! Run command - deploy every matrix entry
//!
//! Entries deploy through helm into their own namespaces. Ctrl-C cancels the
//! run: no new entry starts and in-flight helm processes are killed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use chart_matrix::cluster::KubeNamespaceDeleter;
use chart_matrix::deploy::HelmDeployer;
use chart_matrix::runner::{RunOptions, Runner};

use super::{parse_key_value, per_key, MatrixArgs};
use crate::{Error, Result};

/// Deploy the matrix
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub matrix: MatrixArgs,

    /// Print the plan without deploying
    #[arg(long)]
    pub dry_run: bool,

    /// Print the layers each entry covers without deploying
    #[arg(long)]
    pub coverage: bool,

    /// Stop at the first failed entry
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Delete every attempted namespace after the run
    #[arg(long)]
    pub cleanup: bool,

    /// Entries deployed concurrently
    #[arg(long, default_value_t = 1)]
    pub max_parallel: usize,

    /// Prefix of every generated namespace
    #[arg(long, default_value = "matrix")]
    pub namespace_prefix: String,

    /// Cluster context used when no platform mapping matches
    #[arg(long, default_value = "")]
    pub kube_context: String,

    /// Cluster context for a platform, as PLATFORM=CONTEXT (repeatable)
    #[arg(long = "kube-context-for", value_parser = parse_key_value)]
    pub kube_context_for: Vec<(String, String)>,

    /// `.env` file used when no version mapping matches
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// `.env` file for a chart version, as VERSION=PATH (repeatable)
    #[arg(long = "env-file-for", value_parser = parse_key_value)]
    pub env_file_for: Vec<(String, String)>,

    /// Use vault-backed secrets when no platform mapping matches
    #[arg(long)]
    pub vault_backed_secrets: bool,

    /// Vault-backed secrets for a platform, as PLATFORM=true|false (repeatable)
    #[arg(long = "vault-backed-secrets-for", value_parser = parse_key_value)]
    pub vault_backed_secrets_for: Vec<(String, String)>,

    /// Ingress base domain used when no platform mapping matches
    #[arg(long, default_value = "")]
    pub ingress_base_domain: String,

    /// Ingress base domain for a platform, as PLATFORM=DOMAIN (repeatable)
    #[arg(long = "ingress-base-domain-for", value_parser = parse_key_value)]
    pub ingress_base_domain_for: Vec<(String, String)>,

    /// Run integration tests after each deployment
    #[arg(long)]
    pub test_integration: bool,

    /// Run end-to-end tests after each deployment
    #[arg(long)]
    pub test_e2e: bool,

    /// Run every test suite after each deployment
    #[arg(long)]
    pub test_all: bool,

    /// Log level passed to deployments
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Skip `helm dependency update`
    #[arg(long)]
    pub skip_dependency_update: bool,

    /// Delete each namespace before deploying into it
    #[arg(long)]
    pub delete_namespace_first: bool,

    /// Published chart version upgrade flows install before upgrading
    #[arg(long)]
    pub upgrade_from_version: Option<String>,

    /// Path to kubeconfig file (default: $KUBECONFIG or ~/.kube/config)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Helm binary
    #[arg(long, default_value = "helm")]
    pub helm: String,

    /// Helm `--timeout` in seconds
    #[arg(long, default_value_t = 1200)]
    pub helm_timeout_secs: u64,
}

impl RunArgs {
    /// Runner options for these arguments
    pub fn run_options(&self) -> Result<RunOptions> {
        if self.max_parallel == 0 {
            return Err(Error::validation("--max-parallel must be at least 1"));
        }
        if self.namespace_prefix.is_empty() {
            return Err(Error::validation("--namespace-prefix must not be empty"));
        }
        for (platform, value) in &self.vault_backed_secrets_for {
            value.parse::<bool>().map_err(|_| {
                Error::validation(format!(
                    "--vault-backed-secrets-for {}={}: expected true or false",
                    platform, value
                ))
            })?;
        }

        Ok(RunOptions {
            dry_run: self.dry_run,
            coverage: self.coverage,
            stop_on_failure: self.stop_on_failure,
            cleanup: self.cleanup,
            max_parallel: self.max_parallel,
            namespace_prefix: self.namespace_prefix.clone(),
            platform: self.matrix.platform.clone().filter(|p| !p.is_empty()),
            repo_root: self.matrix.repo_root.clone(),
            kube_contexts: per_key(
                self.kube_context.clone(),
                &self.kube_context_for,
                str::to_string,
            ),
            env_files: per_key(
                self.env_file.clone().unwrap_or_default(),
                &self.env_file_for,
                |v| PathBuf::from(v),
            ),
            vault_backed_secrets: per_key(
                self.vault_backed_secrets,
                &self.vault_backed_secrets_for,
                |v| v == "true",
            ),
            ingress_base_domains: per_key(
                self.ingress_base_domain.clone(),
                &self.ingress_base_domain_for,
                str::to_string,
            ),
            test_integration: self.test_integration,
            test_e2e: self.test_e2e,
            test_all: self.test_all,
            log_level: self.log_level.clone(),
            skip_dependency_update: self.skip_dependency_update,
            delete_namespace_first: self.delete_namespace_first,
            upgrade_from_version: self.upgrade_from_version.clone().filter(|v| !v.is_empty()),
        })
    }
}

/// Run the run command
pub async fn run(args: RunArgs) -> Result<()> {
    let opts = args.run_options()?;
    let entries = args.matrix.entries()?;

    let mut deleter = KubeNamespaceDeleter::new();
    if let Some(path) = &args.kubeconfig {
        deleter = deleter.with_kubeconfig(path);
    }
    let namespaces = Arc::new(deleter);
    let deployer = HelmDeployer::new(namespaces.clone())
        .with_helm_binary(args.helm.clone())
        .with_timeout(Duration::from_secs(args.helm_timeout_secs));
    let runner = Runner::new(Arc::new(deployer), namespaces);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling matrix run");
            on_interrupt.cancel();
        }
    });

    let report = runner.run(&cancel, &entries, &opts).await?;
    if let Some(plan) = &report.plan {
        print!("{}", plan);
        return Ok(());
    }

    print!("{}", report.summary());
    let (failed, total) = (report.failed(), report.results.len());
    if let Some(stopped) = report.stopped {
        return Err(stopped.into());
    }
    if failed > 0 {
        return Err(Error::RunFailed { failed, total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> RunArgs {
        let argv = ["chart-matrix", "run"].iter().chain(args.iter());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("Expected run command, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_sequential_and_safe() {
        let opts = parse(&[]).run_options().unwrap();
        assert_eq!(opts.max_parallel, 1);
        assert_eq!(opts.namespace_prefix, "matrix");
        assert!(!opts.dry_run && !opts.cleanup && !opts.stop_on_failure);
        assert_eq!(opts.kube_contexts.resolve_set("gke"), None);
        assert_eq!(opts.log_level, "info");
        assert!(!opts.coverage);
        assert_eq!(opts.upgrade_from_version, None);
    }

    #[test]
    fn coverage_and_upgrade_from_version() {
        let opts = parse(&["--coverage", "--upgrade-from-version", "13.1.0"])
            .run_options()
            .unwrap();
        assert!(opts.coverage);
        assert_eq!(opts.upgrade_from_version.as_deref(), Some("13.1.0"));
    }

    #[test]
    fn mappings_become_per_key_settings() {
        let opts = parse(&[
            "--kube-context",
            "fallback",
            "--kube-context-for",
            "eks=eks-ctx",
            "--kube-context-for",
            "gke=gke-ctx",
            "--env-file-for",
            "8.8=.env.88",
            "--vault-backed-secrets",
            "--vault-backed-secrets-for",
            "eks=false",
            "--ingress-base-domain-for",
            "gke=ci.example.com",
            "--platform",
            "eks",
        ])
        .run_options()
        .unwrap();

        assert_eq!(opts.kube_contexts.resolve("eks"), "eks-ctx");
        assert_eq!(opts.kube_contexts.resolve("gke"), "gke-ctx");
        assert_eq!(opts.kube_contexts.resolve("aks"), "fallback");
        assert_eq!(opts.env_files.resolve_set("8.8"), Some(PathBuf::from(".env.88")));
        assert_eq!(opts.env_files.resolve_set("8.9"), None);
        assert!(!opts.vault_backed_secrets.resolve("eks"));
        assert!(opts.vault_backed_secrets.resolve("gke"));
        assert_eq!(
            opts.ingress_base_domains.resolve_set("gke").as_deref(),
            Some("ci.example.com")
        );
        assert_eq!(opts.platform.as_deref(), Some("eks"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            parse(&["--max-parallel", "0"]).run_options(),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            parse(&["--vault-backed-secrets-for", "gke=yes"]).run_options(),
            Err(Error::Validation { .. })
        ));
        assert!(Cli::try_parse_from(["chart-matrix", "run", "--kube-context-for", "gke"]).is_err());
    }
}
