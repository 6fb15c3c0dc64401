//! Per-entry resolution of run settings, and the dry-run plan text

use std::path::PathBuf;

use crate::deploy::{DeploymentConfig, RELEASE_NAME, SCENARIO_SUBDIR};
use crate::matrix::{build_namespace, version_order, Entry};

use super::resolve::{ingress_host, resolve_platform};
use super::RunOptions;

/// Everything the runner resolves for one entry before deploying it
#[derive(Clone, Debug, PartialEq)]
pub struct EntryPlan<'a> {
    /// The matrix cell
    pub entry: &'a Entry,
    /// Target namespace
    pub namespace: String,
    /// Effective platform
    pub platform: String,
    /// Cluster context, when one is configured
    pub kube_context: Option<String>,
    /// `.env` file, when one is configured
    pub env_file: Option<PathBuf>,
    /// Vault-backed secrets toggle
    pub use_vault_backed_secrets: bool,
    /// Ingress hostname, when a base domain is configured
    pub ingress_host: Option<String>,
}

impl<'a> EntryPlan<'a> {
    /// Resolve run settings for `entry`
    pub fn resolve(entry: &'a Entry, opts: &RunOptions) -> Self {
        let namespace = build_namespace(&opts.namespace_prefix, entry);
        let platform = resolve_platform(opts.platform.as_deref(), entry);
        let base_domain = opts.ingress_base_domains.resolve_set(&platform);
        Self {
            kube_context: opts.kube_contexts.resolve_set(&platform),
            env_file: opts.env_files.resolve_set(&entry.version),
            use_vault_backed_secrets: opts.vault_backed_secrets.resolve(&platform),
            ingress_host: ingress_host(&namespace, base_domain.as_deref()),
            entry,
            namespace,
            platform,
        }
    }

    /// The immutable deployment bundle for this entry
    pub fn deployment_config(&self, opts: &RunOptions) -> DeploymentConfig {
        let entry = self.entry;
        let chart_path = opts.repo_root.join(&entry.chart_path);
        DeploymentConfig {
            version: entry.version.clone(),
            scenario_path: chart_path.join(SCENARIO_SUBDIR),
            chart_path,
            release: RELEASE_NAME.to_string(),
            namespace: self.namespace.clone(),
            kube_context: self.kube_context.clone(),
            platform: self.platform.clone(),
            infra_type: entry.infra_type_for(&self.platform).map(str::to_string),
            env_file: self.env_file.clone(),
            flow: entry.flow.clone(),
            scenario: entry.scenario.clone(),
            auth: entry.auth.clone(),
            identity: entry.identity.clone(),
            persistence: entry.persistence.clone(),
            features: entry.features.clone(),
            test_exclude: entry.exclude.clone(),
            run_integration_tests: opts.test_integration || opts.test_all,
            run_e2e_tests: opts.test_e2e || opts.test_all,
            use_vault_backed_secrets: self.use_vault_backed_secrets,
            ingress_host: self.ingress_host.clone(),
            log_level: opts.log_level.clone(),
            skip_dependency_update: opts.skip_dependency_update,
            delete_namespace_first: opts.delete_namespace_first,
            upgrade_from_version: opts.upgrade_from_version.clone(),
        }
    }
}

/// Describe what a run would do, grouped by version in first-seen order
pub fn format_dry_run(entries: &[Entry], opts: &RunOptions) -> String {
    let order = version_order(entries);
    let mut out = String::new();

    for version in &order {
        let group: Vec<&Entry> = entries.iter().filter(|e| &e.version == version).collect();
        out.push_str(&format!("=== Version {} ({} entries) ===\n", version, group.len()));

        for entry in group {
            let plan = EntryPlan::resolve(entry, opts);
            out.push_str(&format!(
                "  - {} (shortname={}, flow={}, platform={})\n",
                entry.scenario,
                entry.short_id(),
                entry.flow,
                plan.platform
            ));
            out.push_str(&format!("      namespace: {}\n", plan.namespace));
            if let Some(ctx) = &plan.kube_context {
                out.push_str(&format!("      kube-context: {}\n", ctx));
            }
            if let Some(env_file) = &plan.env_file {
                out.push_str(&format!("      env-file: {}\n", env_file.display()));
            }
            if let Some(host) = &plan.ingress_host {
                out.push_str(&format!("      ingress-host: {}\n", host));
            }
            if plan.use_vault_backed_secrets {
                out.push_str("      vault-backed-secrets: true\n");
            }
            if !entry.exclude.is_empty() {
                out.push_str(&format!("      exclude: {}\n", entry.exclude.join(",")));
            }
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "--- {} entries across {} versions (dry-run, nothing deployed) ---\n",
        entries.len(),
        order.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Flow;
    use crate::matrix::test_support::entry;
    use crate::runner::resolve::{PerKey, DEFAULT_PLATFORM};

    fn opts() -> RunOptions {
        RunOptions {
            namespace_prefix: "matrix".to_string(),
            repo_root: PathBuf::from("/repo"),
            kube_contexts: PerKey::flat("default-ctx".to_string()).with("eks", "eks-ctx".to_string()),
            env_files: PerKey::flat(PathBuf::new()).with("8.8", PathBuf::from(".env.88")),
            ingress_base_domains: PerKey::flat("ci.example.com".to_string()),
            log_level: "debug".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_per_platform_and_per_version_settings() {
        let mut e = entry("8.8", "keycloak", "install", Some("eks"));
        e.shortname = "eske".to_string();
        let plan = EntryPlan::resolve(&e, &opts());

        assert_eq!(plan.namespace, "matrix-88-eske-inst-eks");
        assert_eq!(plan.platform, "eks");
        assert_eq!(plan.kube_context.as_deref(), Some("eks-ctx"));
        assert_eq!(plan.env_file, Some(PathBuf::from(".env.88")));
        assert_eq!(
            plan.ingress_host.as_deref(),
            Some("matrix-88-eske-inst-eks.ci.example.com")
        );
        assert!(!plan.use_vault_backed_secrets);
    }

    #[test]
    fn missing_platform_uses_default_and_fallbacks() {
        let e = entry("8.9", "opensearch", "upgrade-minor", None);
        let plan = EntryPlan::resolve(&e, &opts());
        assert_eq!(plan.platform, DEFAULT_PLATFORM);
        assert_eq!(plan.kube_context.as_deref(), Some("default-ctx"));
        assert_eq!(plan.env_file, None);
    }

    #[test]
    fn run_platform_override_wins() {
        let e = entry("8.8", "keycloak", "install", Some("gke"));
        let o = RunOptions {
            platform: Some("eks".to_string()),
            ..opts()
        };
        let plan = EntryPlan::resolve(&e, &o);
        assert_eq!(plan.platform, "eks");
        assert_eq!(plan.kube_context.as_deref(), Some("eks-ctx"));
        // the namespace follows the entry, not the override
        assert_eq!(plan.namespace, "matrix-88-keycloak-inst-gke");
    }

    #[test]
    fn deployment_config_is_fully_populated() {
        let mut e = entry("8.8", "keycloak", "upgrade-patch", Some("gke"));
        e.exclude = vec!["connectors".to_string()];
        e.infra_type.insert("gke".to_string(), "preemptible".to_string());
        let o = RunOptions {
            test_all: true,
            vault_backed_secrets: PerKey::flat(true),
            ..opts()
        };

        let cfg = EntryPlan::resolve(&e, &o).deployment_config(&o);
        assert_eq!(cfg.chart_path, PathBuf::from("/repo/charts/camunda-platform-8.8"));
        assert_eq!(
            cfg.scenario_path,
            PathBuf::from("/repo/charts/camunda-platform-8.8").join(SCENARIO_SUBDIR)
        );
        assert_eq!(cfg.release, RELEASE_NAME);
        assert_eq!(cfg.flow, Flow::UpgradePatch);
        assert_eq!(cfg.infra_type.as_deref(), Some("preemptible"));
        assert_eq!(cfg.test_exclude, vec!["connectors"]);
        assert!(cfg.run_integration_tests && cfg.run_e2e_tests);
        assert!(cfg.use_vault_backed_secrets);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.upgrade_from_version, None);
    }

    #[test]
    fn upgrade_from_version_reaches_the_deployment() {
        let e = entry("8.8", "keycloak", "upgrade-minor", None);
        let o = RunOptions {
            upgrade_from_version: Some("12.7.4".to_string()),
            ..opts()
        };
        let cfg = EntryPlan::resolve(&e, &o).deployment_config(&o);
        assert_eq!(cfg.upgrade_from_version.as_deref(), Some("12.7.4"));
    }

    #[test]
    fn dry_run_groups_by_version() {
        let entries = vec![
            entry("8.9", "oidc", "install", None),
            entry("8.8", "keycloak", "install", Some("eks")),
            entry("8.9", "oidc", "upgrade-minor", None),
        ];
        let out = format_dry_run(&entries, &opts());

        let v89 = out.find("=== Version 8.9 (2 entries) ===").unwrap();
        let v88 = out.find("=== Version 8.8 (1 entries) ===").unwrap();
        assert!(v89 < v88);
        assert!(out.contains("namespace: matrix-89-oidc-upgm"));
        assert!(out.contains("kube-context: eks-ctx"));
        assert!(out.contains("env-file: .env.88"));
        assert!(out.ends_with("--- 3 entries across 2 versions (dry-run, nothing deployed) ---\n"));
    }
}
