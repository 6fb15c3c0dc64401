//! Post-run namespace deletion

use std::collections::HashSet;

use tracing::{info, warn};

use crate::cluster::NamespaceDeleter;

use super::RunResult;

/// Delete every namespace any result touched, each on its own cluster context
///
/// Success, failure and cancelled skips all count as attempted. Deletion
/// errors are logged and never change the run outcome.
pub async fn cleanup(deleter: &dyn NamespaceDeleter, results: &[RunResult]) {
    let mut seen = HashSet::new();
    let targets: Vec<&RunResult> = results
        .iter()
        .filter(|r| seen.insert(r.namespace.as_str()))
        .collect();

    info!(namespaces = targets.len(), "cleaning up matrix namespaces");

    for result in targets {
        match deleter
            .delete_namespace(result.kube_context.clone(), result.namespace.clone())
            .await
        {
            Ok(()) => info!(namespace = %result.namespace, context = ?result.kube_context, "namespace cleaned up"),
            Err(e) => warn!(
                namespace = %result.namespace,
                context = ?result.kube_context,
                error = %e,
                "failed to clean up namespace"
            ),
        }
    }
}
