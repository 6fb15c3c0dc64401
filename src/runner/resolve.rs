//! Per-key settings with a flat fallback
//!
//! Cluster context, `.env` file, vault-backed secrets and ingress base domain
//! are all configured the same way: a map keyed by platform (or version) plus
//! one fallback value. A map entry wins when it is set.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::matrix::Entry;

/// Platform used when neither the run nor the entry names one
pub const DEFAULT_PLATFORM: &str = "gke";

/// Whether a configured value counts as set
pub trait Setting: Clone + Default {
    /// True when this value should override the fallback
    fn is_set(&self) -> bool;
}

impl Setting for String {
    fn is_set(&self) -> bool {
        !self.is_empty()
    }
}

impl Setting for PathBuf {
    fn is_set(&self) -> bool {
        !self.as_os_str().is_empty()
    }
}

impl Setting for bool {
    // An explicit per-key boolean is always meaningful, `false` included.
    fn is_set(&self) -> bool {
        true
    }
}

/// A value resolved by key, falling back to a flat default
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerKey<V> {
    /// Values by key (platform or version)
    pub by_key: BTreeMap<String, V>,
    /// Value used when the key has no set entry
    pub fallback: V,
}

impl<V: Setting> PerKey<V> {
    /// Only a fallback, no per-key entries
    pub fn flat(fallback: V) -> Self {
        Self {
            by_key: BTreeMap::new(),
            fallback,
        }
    }

    /// Add a per-key value
    pub fn with(mut self, key: impl Into<String>, value: V) -> Self {
        self.by_key.insert(key.into(), value);
        self
    }

    /// The value for `key`: its own entry if set, otherwise the fallback
    pub fn resolve(&self, key: &str) -> V {
        match self.by_key.get(key) {
            Some(value) if value.is_set() => value.clone(),
            _ => self.fallback.clone(),
        }
    }

    /// Like [`resolve`](Self::resolve), mapping unset results to `None`
    pub fn resolve_set(&self, key: &str) -> Option<V> {
        Some(self.resolve(key)).filter(V::is_set)
    }
}

/// Effective platform: run-level override, else the entry's own, else [`DEFAULT_PLATFORM`]
pub fn resolve_platform(run_override: Option<&str>, entry: &Entry) -> String {
    run_override
        .filter(|p| !p.is_empty())
        .or(entry.platform.as_deref().filter(|p| !p.is_empty()))
        .unwrap_or(DEFAULT_PLATFORM)
        .to_string()
}

/// Ingress host for a namespace, when a base domain is configured
pub fn ingress_host(namespace: &str, base_domain: Option<&str>) -> Option<String> {
    base_domain
        .filter(|d| !d.is_empty())
        .map(|d| format!("{namespace}.{d}"))
}
