//! CLI commands

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use chart_matrix::matrix::{self, Entry, FilterOptions, GenerateOptions};
use chart_matrix::runner::{PerKey, Setting};

use crate::Result;

pub mod list;
pub mod run;

/// Which matrix to build, shared by `list` and `run`
#[derive(Args, Debug, Clone)]
pub struct MatrixArgs {
    /// Chart repository root
    #[arg(long, env = "CHART_MATRIX_REPO_ROOT", default_value = ".")]
    pub repo_root: PathBuf,

    /// Only these chart versions (comma-separated); each must be active
    #[arg(long, value_delimiter = ',')]
    pub versions: Vec<String>,

    /// Include scenarios marked disabled
    #[arg(long)]
    pub include_disabled: bool,

    /// Keep scenarios containing any of these substrings (comma-separated)
    #[arg(long, default_value = "")]
    pub scenario_filter: String,

    /// Keep only this flow
    #[arg(long, default_value = "")]
    pub flow: String,

    /// Keep entries for this platform (entries without a platform always match)
    #[arg(long)]
    pub platform: Option<String>,
}

impl MatrixArgs {
    /// Generate and filter the matrix
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let generated = matrix::generate(
            &self.repo_root,
            &GenerateOptions {
                versions: self.versions.clone(),
                include_disabled: self.include_disabled,
            },
        )?;
        let total = generated.len();

        let filtered = matrix::filter(
            generated,
            &FilterOptions {
                scenario_filter: self.scenario_filter.clone(),
                flow_filter: self.flow.clone(),
                platform: self.platform.clone().unwrap_or_default(),
            },
        );
        debug!(generated = total, kept = filtered.len(), "matrix filtered");
        Ok(filtered)
    }
}

/// Parse a `KEY=VALUE` argument
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("invalid mapping '{}', expected KEY=VALUE", s)),
    }
}

/// Build a per-key setting from a flat fallback and `KEY=VALUE` overrides
pub fn per_key<V, F>(fallback: V, pairs: &[(String, String)], convert: F) -> PerKey<V>
where
    V: Setting,
    F: Fn(&str) -> V,
{
    pairs
        .iter()
        .fold(PerKey::flat(fallback), |acc, (key, value)| {
            acc.with(key.clone(), convert(value))
        })
}
