//! Coverage report: the layers each matrix entry exercises, nothing deployed

use std::collections::HashSet;

use crate::matrix::{version_order, Entry};

use super::plan::EntryPlan;
use super::RunOptions;

/// One row of the layer breakdown
struct Row<'a> {
    entry: &'a Entry,
    platform: String,
    infra_type: String,
}

/// Table of every entry's resolved layers, followed by per-layer totals
///
/// Rows are grouped by version in first-seen order. Layers the scenario does
/// not declare explicitly show as `(derived)`.
pub fn format_coverage(entries: &[Entry], opts: &RunOptions) -> String {
    let order = version_order(entries);
    let rows: Vec<Row<'_>> = order
        .iter()
        .flat_map(|version| entries.iter().filter(move |e| &e.version == version))
        .map(|entry| {
            let plan = EntryPlan::resolve(entry, opts);
            Row {
                infra_type: entry
                    .infra_type_for(&plan.platform)
                    .unwrap_or_default()
                    .to_string(),
                platform: plan.platform,
                entry,
            }
        })
        .collect();

    let mut out = String::from("=== Coverage: Layer Breakdown ===\n\n");
    out.push_str(&format!(
        "{:<6} {:<25} {:<8} {:<16} {:<10} {:<14} {:<20} {:<22} {}\n",
        "VER", "SCENARIO", "ENABLED", "FLOW", "PLATFORM", "INFRA-TYPE", "IDENTITY", "PERSISTENCE", "FEATURES"
    ));
    out.push_str(&format!(
        "{:<6} {:<25} {:<8} {:<16} {:<10} {:<14} {:<20} {:<22} {}\n",
        "---", "--------", "-------", "----", "--------", "----------", "--------", "-----------", "--------"
    ));

    for row in &rows {
        let e = row.entry;
        out.push_str(&format!(
            "{:<6} {:<25} {:<8} {:<16} {:<10} {:<14} {:<20} {:<22} {}\n",
            e.version,
            e.scenario,
            if e.enabled { "yes" } else { "no" },
            e.flow,
            or_placeholder(&row.platform, "-"),
            or_placeholder(&row.infra_type, "-"),
            or_placeholder(&e.identity, "(derived)"),
            or_placeholder(&e.persistence, "(derived)"),
            or_placeholder(&e.features.join(","), "-"),
        ));
    }

    let enabled = rows.iter().filter(|r| r.entry.enabled).count();
    out.push_str(&format!(
        "\n--- {} entries ({} enabled, {} disabled) across {} versions ---\n",
        rows.len(),
        enabled,
        rows.len() - enabled,
        order.len()
    ));

    let features = unique(rows.iter().flat_map(|r| r.entry.features.iter().map(String::as_str)));
    out.push_str("\nLayer Coverage:\n");
    out.push_str(&format!(
        "  identities:   {}\n",
        unique(rows.iter().map(|r| r.entry.identity.as_str())).join(", ")
    ));
    out.push_str(&format!(
        "  persistence:  {}\n",
        unique(rows.iter().map(|r| r.entry.persistence.as_str())).join(", ")
    ));
    out.push_str(&format!(
        "  platforms:    {}\n",
        unique(rows.iter().map(|r| r.platform.as_str())).join(", ")
    ));
    out.push_str(&format!(
        "  infra-types:  {}\n",
        unique(rows.iter().map(|r| r.infra_type.as_str())).join(", ")
    ));
    out.push_str(&format!(
        "  features:     {}\n",
        if features.is_empty() { "-".to_string() } else { features.join(", ") }
    ));
    out.push_str(&format!(
        "  flows:        {}\n",
        unique(rows.iter().map(|r| r.entry.flow.as_str())).join(", ")
    ));
    out
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

/// Non-empty values in first-seen order
fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    values
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::test_support::entry;

    fn layered(version: &str, scenario: &str, flow: &str, platform: Option<&str>) -> Entry {
        let mut e = entry(version, scenario, flow, platform);
        e.identity = "keycloak".to_string();
        e.persistence = "elasticsearch".to_string();
        e.features = vec!["multitenancy".to_string(), "rba".to_string()];
        e
    }

    #[test]
    fn rows_show_resolved_and_derived_layers() {
        let mut eks = layered("8.8", "keycloak-mt", "install", Some("eks"));
        eks.infra_type.insert("eks".to_string(), "arm".to_string());
        let mut plain = entry("8.8", "oidc", "upgrade-patch", None);
        plain.enabled = false;
        let entries = vec![eks, plain];

        let out = format_coverage(&entries, &RunOptions::default());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "=== Coverage: Layer Breakdown ===");
        assert!(lines[2].starts_with("VER    SCENARIO"));
        let cols: Vec<&str> = lines[4].split_whitespace().collect();
        assert_eq!(
            cols,
            ["8.8", "keycloak-mt", "yes", "install", "eks", "arm", "keycloak", "elasticsearch", "multitenancy,rba"]
        );
        let cols: Vec<&str> = lines[5].split_whitespace().collect();
        assert_eq!(
            cols,
            ["8.8", "oidc", "no", "upgrade-patch", "gke", "-", "(derived)", "(derived)", "-"]
        );
        assert!(out.contains("--- 2 entries (1 enabled, 1 disabled) across 1 versions ---"));
    }

    #[test]
    fn layer_totals_are_unique_in_first_seen_order() {
        let entries = vec![
            layered("8.9", "a", "install", Some("gke")),
            layered("8.8", "b", "upgrade-minor", Some("eks")),
            entry("8.9", "c", "install", Some("gke")),
        ];
        let out = format_coverage(&entries, &RunOptions::default());

        assert!(out.contains("  identities:   keycloak\n"));
        assert!(out.contains("  platforms:    gke, eks\n"));
        assert!(out.contains("  features:     multitenancy, rba\n"));
        assert!(out.contains("  flows:        install, upgrade-minor\n"));
        assert!(out.contains("  infra-types:  \n"));

        // 8.9 rows come first, including the later "c"
        let a = out.find("\n8.9    a ").unwrap();
        let c = out.find("\n8.9    c ").unwrap();
        let b = out.find("\n8.8    b ").unwrap();
        assert!(a < c && c < b);
    }

    #[test]
    fn no_features_anywhere() {
        let out = format_coverage(&[entry("8.8", "a", "install", None)], &RunOptions::default());
        assert!(out.contains("  features:     -\n"));
    }
}
