//! Boundary configuration and loading.

use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment prefix for overrides, e.g. `PERMKIT_REQUIRE_AUTH=false`.
pub const ENV_PREFIX: &str = "PERMKIT_";

/// Default header carrying the tenant the caller intends to act in.
pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionBoundaryConfig {
    /// Reject requests without a usable session instead of running them
    /// anonymously.
    pub require_auth: bool,

    /// Header compared against the token tenant. Absent header means no check.
    pub tenant_header: String,

    /// Treat a parsed session whose `expires_at` has passed as unauthenticated.
    pub reject_expired: bool,
}

impl Default for SessionBoundaryConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            tenant_header: DEFAULT_TENANT_HEADER.to_owned(),
            reject_expired: true,
        }
    }
}

/// Load the boundary config from a YAML file, then apply `PERMKIT_*`
/// environment overrides on top of it.
///
/// Fields missing from both sources keep their defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid YAML, or
/// contains unknown keys.
pub fn load_config(path: &Path) -> anyhow::Result<SessionBoundaryConfig> {
    Figment::from(Serialized::defaults(SessionBoundaryConfig::default()))
        .merge(Yaml::file_exact(path))
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()
        .with_context(|| format!("failed to load session boundary config from {}", path.display()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_require_auth() {
        let cfg = SessionBoundaryConfig::default();
        assert!(cfg.require_auth);
        assert!(cfg.reject_expired);
        assert_eq!(cfg.tenant_header, "X-Tenant-ID");
    }

    #[test]
    fn yaml_overrides_only_given_fields() {
        let file = yaml_file("require_auth: false\ntenant_header: X-Org\n");

        let cfg = load_config(file.path()).unwrap();

        assert!(!cfg.require_auth);
        assert_eq!(cfg.tenant_header, "X-Org");
        assert!(cfg.reject_expired);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let file = yaml_file("require_authn: false\n");

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to load session boundary config"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        assert!(load_config(&path).is_err());
    }
}
