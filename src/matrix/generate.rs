//! Matrix generation from the repository's declarative inputs

use std::path::Path;

use tracing::{debug, info, warn};

use crate::catalog::{
    chart_dir, load_chart_versions, load_ci_test_config, load_permitted_flows, CiScenario,
    PermittedFlowRule,
};
use crate::flow::{filter_flows, parse_flow_spec};
use crate::{Error, Result};

use super::Entry;

/// Controls matrix generation
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    /// Restrict the matrix to these versions, in this order. Empty means every active version.
    pub versions: Vec<String>,
    /// Emit entries for disabled scenarios too
    pub include_disabled: bool,
}

/// Build the full test matrix from the chart repository at `repo_root`.
///
/// Reads the version catalog and permitted-flow rules (both required), then
/// each version's PR scenarios. A version whose scenarios cannot be loaded is
/// skipped with a warning; requesting a version that is not active is fatal.
pub fn generate(repo_root: &Path, opts: &GenerateOptions) -> Result<Vec<Entry>> {
    let catalog = load_chart_versions(repo_root)?;
    let permitted = load_permitted_flows(repo_root)?;

    let active = catalog.active_versions();
    let versions = if opts.versions.is_empty() {
        active
    } else {
        if let Some(missing) = opts.versions.iter().find(|v| !active.contains(v)) {
            return Err(Error::InactiveVersion {
                requested: missing.clone(),
                active,
            });
        }
        opts.versions.clone()
    };

    let mut entries = Vec::new();
    for version in &versions {
        let dir = chart_dir(repo_root, version);
        let config = match load_ci_test_config(&dir) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    version = %version,
                    error = %e,
                    "Skipping version, failed to load ci-test-config.yaml"
                );
                continue;
            }
        };

        let before = entries.len();
        entries.extend(expand_scenarios(
            version,
            &chart_dir(Path::new(""), version),
            &config.integration.case.pr.scenarios,
            &permitted.rules,
            opts.include_disabled,
        ));
        debug!(version = %version, entries = entries.len() - before, "Expanded version");
    }

    info!(
        versions = versions.len(),
        entries = entries.len(),
        "Generated test matrix"
    );
    Ok(entries)
}

/// Expand one version's scenario declarations into entries.
///
/// `chart_dir` is recorded on every entry as its chart path, relative to the
/// repository root.
///
/// Each enabled scenario yields one entry per permitted flow per platform, in
/// flow order then platform order. A scenario that declares no platforms gets
/// a single entry with no platform.
pub fn expand_scenarios(
    version: &str,
    chart_dir: &Path,
    scenarios: &[CiScenario],
    rules: &[PermittedFlowRule],
    include_disabled: bool,
) -> Vec<Entry> {
    let mut entries = Vec::new();

    for scenario in scenarios {
        if !scenario.enabled && !include_disabled {
            continue;
        }

        let flows = parse_flow_spec(&scenario.flow);
        let permitted = filter_flows(rules, version, &flows);
        if permitted.is_empty() {
            debug!(
                version = %version,
                scenario = %scenario.name,
                shortname = %scenario.shortname,
                flows = ?flows.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
                "All flows denied by permitted-flows rules, skipping scenario"
            );
            continue;
        }

        let platforms: Vec<Option<&str>> = if scenario.platforms.is_empty() {
            vec![None]
        } else {
            scenario.platforms.iter().map(|p| Some(p.as_str())).collect()
        };

        for flow in &permitted {
            for platform in &platforms {
                entries.push(Entry {
                    version: version.to_string(),
                    chart_path: chart_dir.to_path_buf(),
                    scenario: scenario.name.clone(),
                    shortname: scenario.shortname.clone(),
                    auth: scenario.auth.clone(),
                    flow: flow.clone(),
                    platform: platform.map(str::to_string),
                    exclude: scenario.exclude.clone(),
                    enabled: scenario.enabled,
                    identity: scenario.identity.clone(),
                    persistence: scenario.persistence.clone(),
                    features: scenario.features.clone(),
                    infra_type: scenario.infra_type.clone(),
                });
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CHART_VERSIONS_FILE, CI_TEST_CONFIG_FILE, PERMITTED_FLOWS_FILE};
    use crate::flow::Flow;

    fn scenario(name: &str, flow: &str, platforms: &[&str]) -> CiScenario {
        CiScenario {
            name: name.to_string(),
            enabled: true,
            shortname: name.chars().take(2).collect(),
            auth: "keycloak".to_string(),
            flow: flow.to_string(),
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
            exclude: vec!["console".to_string()],
            ..Default::default()
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// A repository with 8.9 (alpha), 8.8 and 8.7 active; 8.7 has no ci-test-config.
    fn fixture_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            CHART_VERSIONS_FILE,
            "camundaVersions:\n  alpha: [\"8.9\"]\n  supportStandard: [\"8.8\", \"8.7\"]\n  endOfLife: [\"8.2\"]\n",
        );
        write(
            root,
            PERMITTED_FLOWS_FILE,
            "rules:\n  - match: \"==8.9\"\n    deny: [upgrade-patch, upgrade-minor]\n",
        );
        write(
            root,
            &format!("charts/camunda-platform-8.9/{CI_TEST_CONFIG_FILE}"),
            r#"
integration:
  case:
    pr:
      scenario:
        - name: elasticsearch
          enabled: true
          shortname: es
          flow: install,upgrade-patch
        - name: upgrade-only
          enabled: true
          flow: upgrade-minor
"#,
        );
        write(
            root,
            &format!("charts/camunda-platform-8.8/{CI_TEST_CONFIG_FILE}"),
            r#"
integration:
  case:
    pr:
      scenario:
        - name: keycloak
          enabled: true
          shortname: eske
          flow: install
          platforms: [gke, eks]
        - name: opensearch
          enabled: false
          shortname: os
"#,
        );
        dir
    }

    #[test]
    fn expands_flows_times_platforms_in_order() {
        let scenarios = vec![scenario("oidc", "install,upgrade-patch", &["gke", "eks"])];
        let entries = expand_scenarios("8.8", Path::new("/c"), &scenarios, &[], false);

        let cells: Vec<(String, Option<String>)> = entries
            .iter()
            .map(|e| (e.flow.to_string(), e.platform.clone()))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("install".to_string(), Some("gke".to_string())),
                ("install".to_string(), Some("eks".to_string())),
                ("upgrade-patch".to_string(), Some("gke".to_string())),
                ("upgrade-patch".to_string(), Some("eks".to_string())),
            ]
        );
        assert!(entries.iter().all(|e| e.exclude == vec!["console"]));
        assert!(entries.iter().all(|e| e.shortname == "oi"));
    }

    #[test]
    fn no_platforms_yields_unconstrained_entry() {
        let scenarios = vec![scenario("oidc", "", &[])];
        let entries = expand_scenarios("8.8", Path::new("/c"), &scenarios, &[], false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].flow, Flow::Install);
        assert_eq!(entries[0].platform, None);
    }

    #[test]
    fn disabled_scenarios_need_include_disabled() {
        let mut s = scenario("oidc", "install", &[]);
        s.enabled = false;
        let scenarios = vec![s];

        assert!(expand_scenarios("8.8", Path::new("/c"), &scenarios, &[], false).is_empty());

        let entries = expand_scenarios("8.8", Path::new("/c"), &scenarios, &[], true);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].enabled);
    }

    #[test]
    fn fully_denied_scenario_is_skipped() {
        let rules = vec![PermittedFlowRule::new("<=8.7", &["upgrade-minor"])];
        let scenarios = vec![
            scenario("minor-only", "upgrade-minor", &[]),
            scenario("install", "install", &[]),
        ];
        let entries = expand_scenarios("8.7", Path::new("/c"), &scenarios, &rules, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scenario, "install");
    }

    #[test]
    fn generate_applies_permitted_flows_per_version() {
        let repo = fixture_repo();
        let entries = generate(repo.path(), &GenerateOptions::default()).unwrap();

        let es: Vec<&Entry> = entries
            .iter()
            .filter(|e| e.version == "8.9" && e.scenario == "elasticsearch")
            .collect();
        assert_eq!(es.len(), 1);
        assert_eq!(es[0].flow, Flow::Install);

        // upgrade-only is fully denied on 8.9
        assert!(!entries.iter().any(|e| e.scenario == "upgrade-only"));
    }

    #[test]
    fn generate_orders_by_version_then_declaration() {
        let repo = fixture_repo();
        let entries = generate(repo.path(), &GenerateOptions::default()).unwrap();

        let ids: Vec<String> = entries
            .iter()
            .map(|e| {
                format!(
                    "{}/{}/{}",
                    e.version,
                    e.scenario,
                    e.platform.as_deref().unwrap_or("-")
                )
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                "8.9/elasticsearch/-",
                "8.8/keycloak/gke",
                "8.8/keycloak/eks",
            ]
        );
        assert_eq!(
            entries[1].chart_path,
            Path::new("charts/camunda-platform-8.8")
        );
    }

    #[test]
    fn generate_skips_disabled_unless_requested() {
        let repo = fixture_repo();
        let default = generate(repo.path(), &GenerateOptions::default()).unwrap();
        assert!(!default.iter().any(|e| e.scenario == "opensearch"));

        let opts = GenerateOptions {
            include_disabled: true,
            ..Default::default()
        };
        let all = generate(repo.path(), &opts).unwrap();
        assert!(all.iter().any(|e| e.scenario == "opensearch" && !e.enabled));
    }

    #[test]
    fn generate_honours_allowlist_order() {
        let repo = fixture_repo();
        let opts = GenerateOptions {
            versions: vec!["8.8".to_string(), "8.9".to_string()],
            ..Default::default()
        };
        let entries = generate(repo.path(), &opts).unwrap();
        assert_eq!(entries.first().map(|e| e.version.as_str()), Some("8.8"));
        assert_eq!(entries.last().map(|e| e.version.as_str()), Some("8.9"));
    }

    #[test]
    fn generate_rejects_inactive_version() {
        let repo = fixture_repo();
        let opts = GenerateOptions {
            versions: vec!["99.99".to_string()],
            ..Default::default()
        };
        let err = generate(repo.path(), &opts).unwrap_err();
        match &err {
            Error::InactiveVersion { requested, active } => {
                assert_eq!(requested, "99.99");
                assert_eq!(active, &vec!["8.9", "8.8", "8.7"]);
            }
            other => panic!("Expected InactiveVersion, got {other:?}"),
        }
        assert!(err.to_string().contains("8.9, 8.8, 8.7"));
    }

    #[test]
    fn generate_tolerates_missing_version_config() {
        let repo = fixture_repo();
        let opts = GenerateOptions {
            versions: vec!["8.7".to_string(), "8.8".to_string()],
            ..Default::default()
        };
        let entries = generate(repo.path(), &opts).unwrap();
        assert!(entries.iter().all(|e| e.version == "8.8"));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn generate_fails_without_catalog() {
        let dir = tempfile::tempdir().unwrap();
        assert!(generate(dir.path(), &GenerateOptions::default()).is_err());
    }
}
