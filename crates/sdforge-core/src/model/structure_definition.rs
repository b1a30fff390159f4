use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::element::{ElementDefinition, ExtensionMarker};
use super::entity::EntityKind;
use super::json_path;
use super::urls;
use crate::errors::{CompileError, Result};
use crate::tree::ElementTree;

fn default_resource_type() -> String {
    "StructureDefinition".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureKind {
    PrimitiveType,
    ComplexType,
    Resource,
    Logical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Derivation {
    Specialization,
    Constraint,
}

/// Where an extension may be used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageContext {
    /// `element`, `extension` or `fhirpath`
    #[serde(rename = "type")]
    pub kind: String,
    pub expression: String,
}

impl UsageContext {
    pub fn new(kind: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            expression: expression.into(),
        }
    }
}

/// A compiled (or library-provided) structure definition
///
/// Typed fields cover what compilation reads or writes; every other
/// property survives untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<ExtensionMarker>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fhir_version: Option<String>,
    pub kind: StructureKind,
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<UsageContext>,
    #[serde(rename = "type")]
    pub sd_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
    #[serde(default)]
    pub snapshot: ElementTree,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Published but still receiving rules
    #[serde(skip)]
    pub in_progress: bool,
}

impl StructureDefinition {
    /// Parse a raw JSON definition
    ///
    /// # Errors
    ///
    /// Returns `Serialization` when the JSON does not have the shape of a
    /// structure definition.
    pub fn from_json(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| CompileError::Serialization {
            message: e.to_string(),
        })
    }

    /// Render as FHIR JSON
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if a value cannot be represented as JSON.
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| CompileError::Serialization {
            message: e.to_string(),
        })
    }

    /// Placeholder published for an entity that is needed before its own
    /// parent has been resolved
    ///
    /// It carries the entity's identity and a bare root element only.
    pub fn placeholder(kind: EntityKind, id: &str, name: &str, url: String) -> Self {
        let (sd_kind, sd_type) = match kind {
            EntityKind::Extension => (StructureKind::ComplexType, "Extension"),
            EntityKind::Logical => (StructureKind::Logical, id),
            EntityKind::Profile | EntityKind::Resource => (StructureKind::Resource, id),
        };
        Self {
            resource_type: default_resource_type(),
            id: id.to_string(),
            extension: Vec::new(),
            url,
            version: None,
            name: name.to_string(),
            title: None,
            status: String::new(),
            description: None,
            fhir_version: None,
            kind: sd_kind,
            is_abstract: false,
            context: Vec::new(),
            sd_type: sd_type.to_string(),
            base_definition: None,
            derivation: Some(if kind == EntityKind::Logical {
                Derivation::Specialization
            } else {
                Derivation::Constraint
            }),
            snapshot: ElementTree::new(vec![ElementDefinition::new(sd_type, sd_type)]),
            extra: Map::new(),
            in_progress: true,
        }
    }

    pub fn root(&self) -> Option<&ElementDefinition> {
        self.snapshot.root()
    }

    pub fn is_constraint(&self) -> bool {
        self.derivation == Some(Derivation::Constraint)
    }

    /// True if this definition constrains Extension
    pub fn is_extension(&self) -> bool {
        self.sd_type == "Extension" && self.is_constraint()
    }

    /// True if a type-characteristics marker lists `code`
    pub fn has_characteristic(&self, code: &str) -> bool {
        self.extension
            .iter()
            .any(|e| e.url == urls::TYPE_CHARACTERISTICS && e.value_code() == Some(code))
    }

    /// True if this logical model may be the target of a reference
    pub fn can_be_target(&self) -> bool {
        self.has_characteristic("can-be-target")
            || self.extension.iter().any(|e| {
                e.url == urls::LOGICAL_TARGET
                    && e.value.get("valueBoolean") == Some(&Value::Bool(true))
            })
    }

    /// Set a top-level property by caret path (`^status`, `^contact[0].name`)
    ///
    /// The element tree itself cannot be addressed this way.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCaretPath` when the path targets the snapshot, cannot
    /// be written, or leaves a definition that no longer parses.
    pub fn set_property(&mut self, caret_path: &str, value: Value) -> Result<()> {
        let invalid = |reason: String| CompileError::InvalidCaretPath {
            path: caret_path.to_string(),
            reason,
        };
        if caret_path.starts_with("snapshot") || caret_path.starts_with("differential") {
            return Err(invalid("the element tree is managed by rules".to_string()));
        }

        let snapshot = std::mem::take(&mut self.snapshot);
        let in_progress = self.in_progress;
        let updated = serde_json::to_value(&*self)
            .map_err(|e| invalid(e.to_string()))
            .and_then(|mut json| {
                json_path::set_at(&mut json, caret_path, value).map_err(invalid)?;
                serde_json::from_value::<StructureDefinition>(json)
                    .map_err(|e| invalid(e.to_string()))
            });

        match updated {
            Ok(mut updated) => {
                updated.snapshot = snapshot;
                updated.in_progress = in_progress;
                *self = updated;
                Ok(())
            }
            Err(e) => {
                self.snapshot = snapshot;
                Err(e)
            }
        }
    }

    /// Clear compile-time bookkeeping before the definition is final
    pub fn finalize(&mut self) {
        self.in_progress = false;
    }
}
