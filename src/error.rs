//! Error types for matrix generation and execution

use thiserror::Error;

/// Main error type for chart-matrix operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A declarative input (chart-versions, ci-test-config, permitted-flows) could not be loaded
    #[error("config error: {0}")]
    Config(String),

    /// An explicitly requested chart version is not part of the active set
    #[error("requested version {requested:?} is not active (active: {})", .active.join(", "))]
    InactiveVersion {
        /// The version that was asked for
        requested: String,
        /// Every version that is currently active, in catalog order
        active: Vec<String>,
    },

    /// `run` was called with nothing to do
    #[error("no matrix entries to run")]
    NoEntries,

    /// The deployer failed for a single entry
    #[error("deploy error: {0}")]
    Deploy(String),

    /// The entry was dispatched after the run had already been cancelled
    #[error("skipped: run cancelled")]
    Cancelled,

    /// The run halted early because an entry failed and stop-on-failure was set
    #[error("stopping on failure: {0}")]
    StoppedOnFailure(String),

    /// Kubeconfig could not be loaded for a cluster context
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a deploy error with the given message
    pub fn deploy(msg: impl Into<String>) -> Self {
        Self::Deploy(msg.into())
    }

    /// Create a kubeconfig error with the given message
    pub fn kubeconfig(msg: impl Into<String>) -> Self {
        Self::Kubeconfig(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for the synthetic error recorded on entries skipped after cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
