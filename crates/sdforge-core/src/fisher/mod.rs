//! Symbol resolution ("fishing")
//!
//! Names, ids and canonical urls are resolved one kind at a time, in the
//! order the query lists them (`FishKind::ALL` when it lists none). For
//! each kind the tank of declarations is searched first, then the package
//! of already-published artifacts, then the external definition library.
//! The first match wins, so a higher-priority kind anywhere beats a
//! lower-priority kind in the tank.

pub mod library;
pub mod master;
pub mod package;
pub mod tank;

use serde::Serialize;
use serde_json::Value;

use crate::model::{Derivation, InstanceUsage, StructureDefinition, StructureKind};

pub use library::{DefinitionLibrary, FhirDefinitions, LibraryFisher};
pub use master::MasterFisher;
pub use package::{ArtifactRef, Package, Partition};
pub use tank::TankFisher;

/// Kinds of thing a name can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FishKind {
    Profile,
    Extension,
    Logical,
    Resource,
    Type,
    ValueSet,
    CodeSystem,
    Instance,
    Invariant,
    RuleSet,
    Mapping,
}

impl FishKind {
    /// Every kind, in the order used when a query does not restrict kinds
    pub const ALL: &'static [FishKind] = &[
        FishKind::Profile,
        FishKind::Extension,
        FishKind::Logical,
        FishKind::Resource,
        FishKind::Type,
        FishKind::ValueSet,
        FishKind::CodeSystem,
        FishKind::Instance,
        FishKind::Invariant,
        FishKind::RuleSet,
        FishKind::Mapping,
    ];

    /// The kinds a query actually searches; an empty list means all of them
    pub fn or_all(kinds: &[FishKind]) -> &[FishKind] {
        if kinds.is_empty() {
            FishKind::ALL
        } else {
            kinds
        }
    }

    /// Kinds that resolve to structure definitions
    pub const STRUCTURES: &'static [FishKind] = &[
        FishKind::Profile,
        FishKind::Extension,
        FishKind::Logical,
        FishKind::Resource,
        FishKind::Type,
    ];
}

/// Summary of a resolved item, available without compiling it
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub id: String,
    pub name: String,
    pub kind: Option<FishKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_usage: Option<InstanceUsage>,
    pub is_abstract: bool,
    pub can_bind: bool,
    pub can_be_target: bool,
}

impl Metadata {
    /// Metadata of a compiled or library structure definition
    pub fn from_structure(sd: &StructureDefinition, kind: FishKind) -> Self {
        Self {
            id: sd.id.clone(),
            name: sd.name.clone(),
            kind: Some(kind),
            sd_type: Some(sd.sd_type.clone()),
            url: Some(sd.url.clone()),
            parent: sd.base_definition.clone(),
            resource_type: Some(sd.resource_type.clone()),
            version: sd.version.clone(),
            derivation: sd.derivation,
            instance_usage: None,
            is_abstract: sd.is_abstract,
            can_bind: sd.kind == StructureKind::Logical && sd.has_characteristic("can-bind"),
            can_be_target: sd.kind == StructureKind::Logical && sd.can_be_target(),
        }
    }

    /// Metadata read straight from a raw library definition
    pub fn from_raw(raw: &Value, kind: FishKind) -> Self {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        let derivation = match raw.get("derivation").and_then(Value::as_str) {
            Some("constraint") => Some(Derivation::Constraint),
            Some("specialization") => Some(Derivation::Specialization),
            _ => None,
        };
        let characteristics: Vec<&str> = raw
            .get("extension")
            .and_then(Value::as_array)
            .map(|exts| {
                exts.iter()
                    .filter(|e| {
                        e.get("url").and_then(Value::as_str)
                            == Some(crate::model::urls::TYPE_CHARACTERISTICS)
                    })
                    .filter_map(|e| e.get("valueCode").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let is_logical = kind == FishKind::Logical;

        Self {
            id: text("id").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            kind: Some(kind),
            sd_type: text("type"),
            url: text("url"),
            parent: text("baseDefinition"),
            resource_type: text("resourceType"),
            version: text("version"),
            derivation,
            instance_usage: None,
            is_abstract: raw.get("abstract").and_then(Value::as_bool).unwrap_or(false),
            can_bind: is_logical && characteristics.contains(&"can-bind"),
            can_be_target: is_logical && characteristics.contains(&"can-be-target"),
        }
    }
}

/// Anything that can resolve names to metadata
pub trait Fishable {
    /// Resolve `item` (a name, id or canonical url, optionally `|version`)
    /// trying `kinds` in order
    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata>;
}

/// Split `url|version` into its parts
pub fn split_version(item: &str) -> (&str, Option<&str>) {
    match item.split_once('|') {
        Some((base, version)) => (base, Some(version)),
        None => (item, None),
    }
}

/// Classify a raw definition into the kind it answers to
pub fn classify_raw(raw: &Value) -> Option<FishKind> {
    let field = |key: &str| raw.get(key).and_then(Value::as_str);
    match field("resourceType")? {
        "StructureDefinition" => {
            if field("kind") == Some("logical") {
                Some(FishKind::Logical)
            } else if field("derivation") == Some("constraint") {
                if field("type") == Some("Extension") {
                    Some(FishKind::Extension)
                } else {
                    Some(FishKind::Profile)
                }
            } else if field("kind") == Some("resource") {
                Some(FishKind::Resource)
            } else {
                Some(FishKind::Type)
            }
        }
        "ValueSet" => Some(FishKind::ValueSet),
        "CodeSystem" => Some(FishKind::CodeSystem),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_version() {
        assert_eq!(split_version("http://a/b|1.0"), ("http://a/b", Some("1.0")));
        assert_eq!(split_version("Patient"), ("Patient", None));
    }

    #[test]
    fn test_default_kind_order() {
        assert_eq!(
            &FishKind::ALL[..4],
            &[
                FishKind::Profile,
                FishKind::Extension,
                FishKind::Logical,
                FishKind::Resource
            ]
        );
        assert_eq!(FishKind::or_all(&[]), FishKind::ALL);
        assert_eq!(FishKind::or_all(&[FishKind::Invariant]), &[FishKind::Invariant]);
    }

    #[test]
    fn test_classify_raw() {
        let ext = json!({ "resourceType": "StructureDefinition", "kind": "complex-type",
                          "derivation": "constraint", "type": "Extension" });
        assert_eq!(classify_raw(&ext), Some(FishKind::Extension));

        let base_ext = json!({ "resourceType": "StructureDefinition", "kind": "complex-type",
                               "derivation": "specialization", "type": "Extension" });
        assert_eq!(classify_raw(&base_ext), Some(FishKind::Type));

        let vs = json!({ "resourceType": "ValueSet" });
        assert_eq!(classify_raw(&vs), Some(FishKind::ValueSet));
        assert_eq!(classify_raw(&json!({ "resourceType": "Patient" })), None);
    }

    #[test]
    fn test_metadata_from_raw_logical_characteristics() {
        let raw = json!({
            "resourceType": "StructureDefinition", "id": "Thing", "name": "Thing",
            "kind": "logical", "type": "http://acme.org/Thing",
            "extension": [{ "url": crate::model::urls::TYPE_CHARACTERISTICS, "valueCode": "can-bind" }]
        });
        let meta = Metadata::from_raw(&raw, FishKind::Logical);
        assert!(meta.can_bind);
        assert!(!meta.can_be_target);
        assert_eq!(meta.sd_type.as_deref(), Some("http://acme.org/Thing"));
    }
}
