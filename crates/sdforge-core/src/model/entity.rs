use sdforge_core_types::SourceLocation;
use serde::{Deserialize, Serialize};

use super::rule::Rule;

/// The four kinds of structure entity the exporter compiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Profile,
    Extension,
    Logical,
    Resource,
}

impl EntityKind {
    /// Parent used when the entity declares none
    ///
    /// Profiles have no default and must name a parent.
    pub fn default_parent(&self) -> Option<&'static str> {
        match self {
            EntityKind::Profile => None,
            EntityKind::Extension => Some("Extension"),
            EntityKind::Logical => Some("Base"),
            EntityKind::Resource => Some("DomainResource"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Profile => "Profile",
            EntityKind::Extension => "Extension",
            EntityKind::Logical => "Logical",
            EntityKind::Resource => "Resource",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared extension context
///
/// Quoted values are FHIRPath expressions; unquoted values name an element
/// path or another extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDecl {
    pub value: String,
    #[serde(default)]
    pub is_quoted: bool,
}

/// A profile, extension, logical model or resource declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    /// Defaults to `name` when not declared
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Extension contexts (extensions only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<ContextDecl>,
    /// Type characteristics such as `can-bind` (logical models only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characteristics: Vec<String>,
    #[serde(default)]
    pub source: SourceLocation,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            id: name.clone(),
            name,
            parent: None,
            title: None,
            description: None,
            rules: Vec::new(),
            contexts: Vec::new(),
            characteristics: Vec::new(),
            source: SourceLocation::default(),
        }
    }

    pub fn profile(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Profile, name)
    }

    pub fn extension(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Extension, name)
    }

    pub fn logical(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Logical, name)
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Resource, name)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_context(mut self, value: impl Into<String>, is_quoted: bool) -> Self {
        self.contexts.push(ContextDecl {
            value: value.into(),
            is_quoted,
        });
        self
    }

    pub fn with_characteristic(mut self, code: impl Into<String>) -> Self {
        self.characteristics.push(code.into());
        self
    }

    /// Fill in the id from the name when the declaration omitted it
    pub(crate) fn normalize(&mut self) {
        if self.id.trim().is_empty() {
            self.id = self.name.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parents() {
        assert_eq!(EntityKind::Profile.default_parent(), None);
        assert_eq!(EntityKind::Extension.default_parent(), Some("Extension"));
        assert_eq!(EntityKind::Logical.default_parent(), Some("Base"));
        assert_eq!(EntityKind::Resource.default_parent(), Some("DomainResource"));
    }

    #[test]
    fn test_id_defaults_to_name() {
        let entity = Entity::profile("MyPatient");
        assert_eq!(entity.id, "MyPatient");

        let json = serde_json::json!({ "kind": "profile", "name": "Foo", "parent": "Patient" });
        let mut parsed: Entity = serde_json::from_value(json).unwrap();
        assert!(parsed.id.is_empty());
        parsed.normalize();
        assert_eq!(parsed.id, "Foo");
    }
}
