//! Post-generation entry filtering

use super::Entry;

/// Conjunctive filter criteria; empty criteria are ignored
#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    /// Comma-separated substrings; an entry matches if its scenario contains any of them
    pub scenario_filter: String,
    /// Exact flow name
    pub flow_filter: String,
    /// Platform; entries without a platform always match
    pub platform: String,
}

impl FilterOptions {
    fn is_empty(&self) -> bool {
        self.scenario_filter.is_empty() && self.flow_filter.is_empty() && self.platform.is_empty()
    }
}

/// Keep the entries that satisfy every non-empty criterion, preserving order
pub fn filter(entries: Vec<Entry>, opts: &FilterOptions) -> Vec<Entry> {
    if opts.is_empty() {
        return entries;
    }

    let scenario_filters: Vec<&str> = opts
        .scenario_filter
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    entries
        .into_iter()
        .filter(|e| {
            scenario_filters.is_empty()
                || scenario_filters.iter().any(|f| e.scenario.contains(f))
        })
        .filter(|e| opts.flow_filter.is_empty() || e.flow.as_str() == opts.flow_filter)
        .filter(|e| match (&e.platform, opts.platform.as_str()) {
            (_, "") | (None, _) => true,
            (Some(platform), wanted) => platform == wanted,
        })
        .collect()
}
