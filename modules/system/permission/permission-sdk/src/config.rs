//! Configuration for the permission engine.

use permkit_security::scope_properties;
use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Narrow every resolved data scope to the session tenant.
    ///
    /// A session without a tenant then resolves to deny-all.
    pub tenant_isolation: bool,

    /// Row property the tenant filter is applied to.
    pub tenant_property: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tenant_isolation: true,
            tenant_property: scope_properties::TENANT_ID.to_owned(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert!(cfg.tenant_isolation);
        assert_eq!(cfg.tenant_property, "tenant_id");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<EngineConfig>(r#"{"tenant_isolaton": false}"#);
        assert!(err.is_err());
    }
}
