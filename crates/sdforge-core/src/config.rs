//! Compile-wide configuration
//!
//! Loaded from an `sdforge.toml` file by the CLI, or built directly by
//! library callers. Every field has a default so a partial file is valid.

use serde::Deserialize;

use crate::errors::{CompileError, Result};

/// Default publication status for every compiled definition
pub const DEFAULT_STATUS: &str = "draft";

/// Settings shared by every definition compiled in one run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExporterConfig {
    /// Canonical root; artifact urls are `{canonical}/StructureDefinition/{id}`
    pub canonical: String,
    /// Version stamped on every artifact (rules may override it)
    pub version: Option<String>,
    /// FHIR version stamped on every artifact
    pub fhir_version: Option<String>,
    /// Status stamped on every artifact
    pub status: String,
    /// Mirror an extension's title/description onto its root element
    pub apply_extension_metadata_to_root: bool,
    /// Reject numeric indices into slices; slices must be addressed by name
    pub require_named_slices: bool,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            canonical: "http://example.org".to_string(),
            version: None,
            fhir_version: None,
            status: DEFAULT_STATUS.to_string(),
            apply_extension_metadata_to_root: true,
            require_named_slices: false,
        }
    }
}

impl ExporterConfig {
    /// Config with the given canonical root and defaults otherwise
    pub fn with_canonical(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the document is not valid TOML or a field
    /// has the wrong type.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: ExporterConfig =
            toml::from_str(source).map_err(|e| CompileError::InvalidConfig {
                message: e.to_string(),
            })?;
        if config.canonical.trim().is_empty() {
            return Err(CompileError::InvalidConfig {
                message: "canonical cannot be empty".to_string(),
            });
        }
        Ok(config)
    }

    /// Canonical url for a structure definition with the given id
    pub fn structure_definition_url(&self, id: &str) -> String {
        format!(
            "{}/StructureDefinition/{}",
            self.canonical.trim_end_matches('/'),
            id
        )
    }

    /// Canonical url for any other resource type
    pub fn resource_url(&self, resource_type: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.canonical.trim_end_matches('/'),
            resource_type,
            id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ExporterConfig::from_toml_str(
            r#"
            canonical = "http://acme.org/fhir"
            version = "1.2.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.canonical, "http://acme.org/fhir");
        assert_eq!(config.version.as_deref(), Some("1.2.0"));
        assert_eq!(config.status, DEFAULT_STATUS);
        assert!(config.apply_extension_metadata_to_root);
        assert!(!config.require_named_slices);
    }

    #[test]
    fn test_camel_case_flags() {
        let config = ExporterConfig::from_toml_str(
            r#"
            canonical = "http://acme.org"
            requireNamedSlices = true
            applyExtensionMetadataToRoot = false
            "#,
        )
        .unwrap();
        assert!(config.require_named_slices);
        assert!(!config.apply_extension_metadata_to_root);
    }

    #[test]
    fn test_empty_canonical_rejected() {
        let result = ExporterConfig::from_toml_str(r#"canonical = "  ""#);
        assert!(matches!(result, Err(CompileError::InvalidConfig { .. })));
    }

    #[test]
    fn test_structure_definition_url_trims_slash() {
        let config = ExporterConfig::with_canonical("http://acme.org/");
        assert_eq!(
            config.structure_definition_url("foo"),
            "http://acme.org/StructureDefinition/foo"
        );
    }
}
