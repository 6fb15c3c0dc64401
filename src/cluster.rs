//! Namespace lifecycle against matrix clusters
//!
//! Every entry may land on a different cluster, so clients are built per
//! kube context rather than once per process.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{Error, Result};

/// Connect timeout for matrix cluster clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Read timeout for matrix cluster clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Deletes namespaces on a named cluster context
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NamespaceDeleter: Send + Sync {
    /// Delete `name`; a namespace that is already gone counts as deleted.
    ///
    /// `kube_context` of `None` uses the kubeconfig's current context.
    async fn delete_namespace(&self, kube_context: Option<String>, name: String) -> Result<()>;
}

/// [`NamespaceDeleter`] backed by the Kubernetes API
#[derive(Clone, Debug, Default)]
pub struct KubeNamespaceDeleter {
    kubeconfig: Option<PathBuf>,
    retry: RetryConfig,
}

impl KubeNamespaceDeleter {
    /// Use the default kubeconfig (`$KUBECONFIG` or `~/.kube/config`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Read contexts from a specific kubeconfig file
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn client_for(&self, kube_context: Option<&str>) -> Result<Client> {
        let options = KubeConfigOptions {
            context: kube_context.map(str::to_string),
            ..Default::default()
        };
        let kubeconfig = match &self.kubeconfig {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
        .map_err(|e| Error::kubeconfig(format!("failed to read kubeconfig: {}", e)))?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| {
                Error::kubeconfig(format!(
                    "failed to load context {}: {}",
                    kube_context.unwrap_or("<current>"),
                    e
                ))
            })?;
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

        Client::try_from(config)
            .map_err(|e| Error::kubeconfig(format!("failed to create client: {}", e)))
    }
}

/// Client errors other than conflicts and throttling will not fix themselves.
fn is_transient(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(resp) => !(400..500).contains(&resp.code) || matches!(resp.code, 409 | 429),
        _ => true,
    }
}

#[async_trait]
impl NamespaceDeleter for KubeNamespaceDeleter {
    async fn delete_namespace(&self, kube_context: Option<String>, name: String) -> Result<()> {
        let client = self.client_for(kube_context.as_deref()).await?;
        let namespaces: Api<Namespace> = Api::all(client);

        let deleted = retry_with_backoff(&self.retry, "delete_namespace", is_transient, || {
            let namespaces = namespaces.clone();
            let name = name.clone();
            async move {
                match namespaces.delete(&name, &DeleteParams::background()).await {
                    Ok(_) => Ok(true),
                    Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
                    Err(e) => Err(e),
                }
            }
        })
        .await?;

        if deleted {
            info!(namespace = %name, context = ?kube_context, "namespace deletion requested");
        } else {
            debug!(namespace = %name, context = ?kube_context, "namespace already gone");
        }
        Ok(())
    }
}
