//! chart-matrix - CI test-matrix scheduler for Helm chart versions
//!
//! chart-matrix turns a chart repository's declarative test inputs into an
//! ordered matrix of (version, scenario, flow, platform) cells and deploys
//! them, one at a time or with bounded parallelism, into isolated namespaces.
//!
//! # Pipeline
//!
//! 1. [`matrix::generate`] reads the version catalog, per-version scenario
//!    declarations and permitted-flow rules
//! 2. [`matrix::filter`] narrows the matrix by scenario, flow and platform
//! 3. [`runner::Runner`] deploys each entry through a [`deploy::Deployer`]
//!    and optionally deletes every namespace it touched
//!
//! # Modules
//!
//! - [`catalog`] - Declarative inputs read from the chart repository
//! - [`version`] - Chart versions and version constraints
//! - [`flow`] - Deployment flows and permitted-flow filtering
//! - [`matrix`] - Matrix entries, generation, filtering, naming and output
//! - [`runner`] - Dry-run, sequential and bounded-parallel execution
//! - [`deploy`] - Deployer seam and the helm implementation
//! - [`cluster`] - Namespace deletion against matrix clusters
//! - [`retry`] - Bounded retry with backoff
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod catalog;
pub mod cluster;
pub mod deploy;
pub mod error;
pub mod flow;
pub mod matrix;
pub mod retry;
pub mod runner;
pub mod version;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
