//! Deterministic namespace naming for matrix entries
//!
//! Pattern: `<prefix>-<version-digits>-<shortname>-<flow>[-<platform>]`, e.g.
//! `matrix-88-eske-inst-gke`. The flow suffix separates the flows of one
//! scenario; the platform suffix separates the same cell on two platforms.

use super::Entry;

/// Namespace for `entry` without the run prefix, e.g. `87-es-upgp`
pub fn base_namespace(entry: &Entry) -> String {
    let version = entry.version.replace('.', "");
    let mut name = format!("{}-{}-{}", version, entry.short_id(), entry.flow.abbrev());
    if let Some(platform) = entry.platform.as_deref().filter(|p| !p.is_empty()) {
        name.push('-');
        name.push_str(platform);
    }
    name
}

/// Namespace for `entry` in a run using `prefix`
pub fn build_namespace(prefix: &str, entry: &Entry) -> String {
    format!("{}-{}", prefix, base_namespace(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::test_support::entry;

    fn with_shortname(mut e: Entry, shortname: &str) -> Entry {
        e.shortname = shortname.to_string();
        e
    }

    #[test]
    fn install_with_platform() {
        let e = with_shortname(entry("8.8", "keycloak", "install", Some("eks")), "eske");
        assert_eq!(build_namespace("matrix", &e), "matrix-88-eske-inst-eks");
    }

    #[test]
    fn upgrade_patch_without_platform() {
        let e = with_shortname(entry("8.7", "elasticsearch", "upgrade-patch", None), "es");
        assert_eq!(build_namespace("matrix", &e), "matrix-87-es-upgp");
        assert_eq!(base_namespace(&e), "87-es-upgp");
    }

    #[test]
    fn falls_back_to_scenario_name() {
        let e = entry("8.9", "opensearch", "upgrade-minor", None);
        assert_eq!(build_namespace("ci", &e), "ci-89-opensearch-upgm");
    }

    #[test]
    fn unknown_flow_uses_prefix_of_name() {
        let e = with_shortname(entry("8.9", "os", "modular-upgrade-minor", None), "os");
        assert_eq!(build_namespace("m", &e), "m-89-os-modu");
    }

    #[test]
    fn platform_changes_the_name() {
        let base = with_shortname(entry("8.8", "keycloak", "install", None), "eske");
        let gke = Entry {
            platform: Some("gke".to_string()),
            ..base.clone()
        };
        let eks = Entry {
            platform: Some("eks".to_string()),
            ..base.clone()
        };

        let names = [
            build_namespace("matrix", &base),
            build_namespace("matrix", &gke),
            build_namespace("matrix", &eks),
        ];
        assert_ne!(names[0], names[1]);
        assert_ne!(names[1], names[2]);
        assert_ne!(names[0], names[2]);
        // deterministic
        assert_eq!(build_namespace("matrix", &gke), names[1]);
    }
}
