//! Sequential and bounded-parallel execution

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::deploy::Deployer;
use crate::matrix::{group_by_version, version_order, Entry};
use crate::Error;

use super::plan::EntryPlan;
use super::{RunOptions, RunReport, RunResult};

/// Build the entry's deployment bundle and make the one deployer call
pub(super) async fn execute_entry(
    deployer: &dyn Deployer,
    cancel: &CancellationToken,
    entry: &Entry,
    opts: &RunOptions,
) -> RunResult {
    let plan = EntryPlan::resolve(entry, opts);
    let config = plan.deployment_config(opts);

    info!(
        version = %entry.version,
        scenario = %entry.scenario,
        flow = %entry.flow,
        platform = %plan.platform,
        namespace = %plan.namespace,
        context = ?plan.kube_context,
        "deploying matrix entry"
    );

    let error = deployer.execute(cancel, &config).await.err();
    match &error {
        None => info!(namespace = %plan.namespace, "matrix entry succeeded"),
        Some(e) => error!(namespace = %plan.namespace, error = %e, "matrix entry failed"),
    }
    RunResult::from_plan(&plan, error)
}

/// One entry at a time in generation order, logged per version
///
/// Once `cancel` fires no further entry starts; those entries are absent from
/// the report.
pub(super) async fn run_sequential(
    deployer: &dyn Deployer,
    cancel: &CancellationToken,
    entries: &[Entry],
    opts: &RunOptions,
) -> RunReport {
    let groups = group_by_version(entries);
    let mut results = Vec::with_capacity(entries.len());

    'versions: for version in version_order(entries) {
        let group = groups.get(&version).map(Vec::as_slice).unwrap_or_default();
        info!(version = %version, entries = group.len(), "running version");

        for entry in group {
            if cancel.is_cancelled() {
                debug!(
                    remaining = entries.len() - results.len(),
                    "run cancelled, not starting further entries"
                );
                break 'versions;
            }

            let result = execute_entry(deployer, cancel, entry, opts).await;
            let failure = result.error.as_ref().map(ToString::to_string);
            results.push(result);

            if let Some(msg) = failure {
                if opts.stop_on_failure {
                    warn!(version = %version, scenario = %entry.scenario, "stopping on failure");
                    return RunReport {
                        results,
                        stopped: Some(Error::StoppedOnFailure(msg)),
                        ..Default::default()
                    };
                }
            }
        }
    }

    RunReport {
        results,
        ..Default::default()
    }
}

/// Up to `max_parallel` entries at once, results in submission order
///
/// A panicking deployment is recorded as that entry's failure.
/// With stop-on-failure, the first failure cancels a run-scoped child of
/// `cancel`. Entries not yet dispatched are dropped; dispatched entries that
/// had not started their deployment record [`Error::Cancelled`].
pub(super) async fn run_parallel(
    deployer: &Arc<dyn Deployer>,
    cancel: &CancellationToken,
    entries: &[Entry],
    opts: &RunOptions,
) -> RunReport {
    let run_token = cancel.child_token();
    let semaphore = Arc::new(Semaphore::new(opts.max_parallel));
    let first_failure: Arc<OnceLock<String>> = Arc::new(OnceLock::new());
    let shared_opts = Arc::new(opts.clone());

    let mut handles: Vec<(usize, JoinHandle<RunResult>)> = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = run_token.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            debug!(remaining = entries.len() - idx, "run cancelled, not dispatching further entries");
            break;
        };

        let deployer = deployer.clone();
        let token = run_token.clone();
        let first_failure = first_failure.clone();
        let opts = shared_opts.clone();
        let entry = entry.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;

            if token.is_cancelled() {
                let plan = EntryPlan::resolve(&entry, &opts);
                debug!(namespace = %plan.namespace, "skipping entry, run cancelled");
                return RunResult::from_plan(&plan, Some(Error::Cancelled));
            }

            let deployment = execute_entry(deployer.as_ref(), &token, &entry, &opts);
            let result = match AssertUnwindSafe(deployment).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let plan = EntryPlan::resolve(&entry, &opts);
                    let msg = panic_message(panic.as_ref());
                    error!(namespace = %plan.namespace, panic = %msg, "matrix worker panicked");
                    let err = Error::internal(format!("worker panicked: {}", msg));
                    RunResult::from_plan(&plan, Some(err))
                }
            };
            if let Some(err) = &result.error {
                if opts.stop_on_failure && first_failure.set(err.to_string()).is_ok() {
                    warn!(namespace = %result.namespace, "first failure, cancelling run");
                    token.cancel();
                }
            }
            result
        });
        handles.push((idx, handle));
    }

    let mut slots: Vec<Option<RunResult>> = (0..entries.len()).map(|_| None).collect();
    for (idx, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                let plan = EntryPlan::resolve(&entries[idx], opts);
                error!(namespace = %plan.namespace, error = %e, "matrix worker failed");
                RunResult::from_plan(&plan, Some(Error::internal(format!("worker failed: {}", e))))
            }
        };
        slots[idx] = Some(result);
    }

    RunReport {
        results: slots.into_iter().flatten().collect(),
        stopped: first_failure
            .get()
            .map(|msg| Error::StoppedOnFailure(msg.clone())),
        ..Default::default()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
