//! Matrix execution: dry-run, coverage, sequential and bounded-parallel modes
//!
//! The runner never fails because an entry failed. Per-entry errors live in
//! [`RunResult`]s; the report's `stopped` error is set only when
//! stop-on-failure halted the run early.

mod cleanup;
mod coverage;
mod execute;
mod plan;
pub mod resolve;
mod summary;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cluster::NamespaceDeleter;
use crate::deploy::Deployer;
use crate::matrix::Entry;
use crate::{Error, Result};

pub use cleanup::cleanup;
pub use coverage::format_coverage;
pub use plan::{format_dry_run, EntryPlan};
pub use resolve::{PerKey, Setting, DEFAULT_PLATFORM};
pub use summary::summarize;

/// How a matrix run executes
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Describe the plan instead of deploying
    pub dry_run: bool,
    /// Report the layers each entry covers instead of deploying
    pub coverage: bool,
    /// Halt on the first failed entry
    pub stop_on_failure: bool,
    /// Delete every attempted namespace after the run
    pub cleanup: bool,
    /// Concurrent entries; 0 or 1 runs sequentially
    pub max_parallel: usize,
    /// Prefix of every generated namespace
    pub namespace_prefix: String,
    /// Run-level platform override
    pub platform: Option<String>,
    /// Chart repository root; entry chart paths are relative to it
    pub repo_root: PathBuf,
    /// Cluster context by platform
    pub kube_contexts: PerKey<String>,
    /// `.env` file by chart version
    pub env_files: PerKey<PathBuf>,
    /// Vault-backed secrets by platform
    pub vault_backed_secrets: PerKey<bool>,
    /// Ingress base domain by platform
    pub ingress_base_domains: PerKey<String>,
    /// Run integration tests after each deployment
    pub test_integration: bool,
    /// Run end-to-end tests after each deployment
    pub test_e2e: bool,
    /// Run every test suite
    pub test_all: bool,
    /// Deployment log level
    pub log_level: String,
    /// Skip `helm dependency update`
    pub skip_dependency_update: bool,
    /// Delete each namespace before deploying into it
    pub delete_namespace_first: bool,
    /// Published chart version that upgrade flows start from
    pub upgrade_from_version: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            coverage: false,
            stop_on_failure: false,
            cleanup: false,
            max_parallel: 1,
            namespace_prefix: "matrix".to_string(),
            platform: None,
            repo_root: PathBuf::from("."),
            kube_contexts: PerKey::default(),
            env_files: PerKey::default(),
            vault_backed_secrets: PerKey::default(),
            ingress_base_domains: PerKey::default(),
            test_integration: false,
            test_e2e: false,
            test_all: false,
            log_level: "info".to_string(),
            skip_dependency_update: false,
            delete_namespace_first: false,
            upgrade_from_version: None,
        }
    }
}

/// Outcome of one dispatched entry
#[derive(Debug)]
pub struct RunResult {
    /// The matrix cell
    pub entry: Entry,
    /// Namespace the entry deployed (or would deploy) into
    pub namespace: String,
    /// Cluster context the namespace lives on
    pub kube_context: Option<String>,
    /// `None` on success
    pub error: Option<Error>,
}

impl RunResult {
    fn from_plan(plan: &EntryPlan<'_>, error: Option<Error>) -> Self {
        Self {
            entry: plan.entry.clone(),
            namespace: plan.namespace.clone(),
            kube_context: plan.kube_context.clone(),
            error,
        }
    }

    /// True when the entry deployed without error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True when the entry was skipped because the run was already cancelled
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(Error::is_cancelled)
    }
}

/// Everything a run produced
#[derive(Debug, Default)]
pub struct RunReport {
    /// Results in submission order; entries never dispatched are absent
    pub results: Vec<RunResult>,
    /// Set when stop-on-failure halted the run
    pub stopped: Option<Error>,
    /// Dry-run plan or coverage report, for runs that deploy nothing
    pub plan: Option<String>,
}

impl RunReport {
    /// Number of failed results, cancelled skips included
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Human-readable summary of the results
    pub fn summary(&self) -> String {
        summarize(&self.results)
    }

    /// The results, or the stop-on-failure error if the run halted early
    pub fn into_result(self) -> Result<Vec<RunResult>> {
        match self.stopped {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }
}

/// Executes matrix entries against a [`Deployer`]
#[derive(Clone)]
pub struct Runner {
    deployer: Arc<dyn Deployer>,
    namespaces: Arc<dyn NamespaceDeleter>,
}

impl Runner {
    /// Runner deploying through `deployer` and cleaning up through `namespaces`
    pub fn new(deployer: Arc<dyn Deployer>, namespaces: Arc<dyn NamespaceDeleter>) -> Self {
        Self {
            deployer,
            namespaces,
        }
    }

    /// Run `entries` with `opts`
    ///
    /// Cancelling `cancel` stops new entries from starting and is passed to
    /// every in-flight deployment. Fails only when `entries` is empty;
    /// everything else is reported through the returned [`RunReport`].
    ///
    /// Dry-run and coverage runs deploy nothing and return their text in
    /// [`RunReport::plan`]; dry-run wins when both are set.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        entries: &[Entry],
        opts: &RunOptions,
    ) -> Result<RunReport> {
        if entries.is_empty() {
            return Err(Error::NoEntries);
        }

        let plan = if opts.dry_run {
            Some(format_dry_run(entries, opts))
        } else if opts.coverage {
            Some(format_coverage(entries, opts))
        } else {
            None
        };
        if plan.is_some() {
            let results = entries
                .iter()
                .map(|entry| RunResult::from_plan(&EntryPlan::resolve(entry, opts), None))
                .collect();
            return Ok(RunReport {
                results,
                stopped: None,
                plan,
            });
        }

        info!(
            entries = entries.len(),
            max_parallel = opts.max_parallel,
            stop_on_failure = opts.stop_on_failure,
            "starting matrix run"
        );

        let report = if opts.max_parallel <= 1 {
            execute::run_sequential(self.deployer.as_ref(), cancel, entries, opts).await
        } else {
            execute::run_parallel(&self.deployer, cancel, entries, opts).await
        };

        if opts.cleanup {
            cleanup(self.namespaces.as_ref(), &report.results).await;
        }

        info!(
            total = report.results.len(),
            failed = report.failed(),
            stopped = report.stopped.is_some(),
            "matrix run finished"
        );
        Ok(report)
    }
}
