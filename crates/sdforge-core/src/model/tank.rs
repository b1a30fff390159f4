//! The tank: every declaration of one compile run

use sdforge_core_types::SourceLocation;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};
use super::rule::{Rule, RuleKind};
use super::value::FshValue;

/// How an instance is meant to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceUsage {
    #[default]
    Example,
    Definition,
    Inline,
}

/// A declared instance of some resource or type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub id: String,
    pub instance_of: String,
    #[serde(default)]
    pub usage: InstanceUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub source: SourceLocation,
}

impl Instance {
    pub fn new(name: impl Into<String>, instance_of: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            instance_of: instance_of.into(),
            usage: InstanceUsage::Example,
            title: None,
            rules: Vec::new(),
            source: SourceLocation::default(),
        }
    }

    pub fn with_usage(mut self, usage: InstanceUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The string or code assigned at a top-level path, if any
    pub fn assigned_text(&self, path: &str) -> Option<&str> {
        self.rules
            .iter()
            .filter(|r| r.path == path)
            .find_map(|r| match &r.kind {
                RuleKind::Assignment { value, .. } | RuleKind::CaretValue { value, .. } => {
                    match value {
                        FshValue::String(s) => Some(s.as_str()),
                        FshValue::Code(c) => Some(c.code.as_str()),
                        _ => None,
                    }
                }
                _ => None,
            })
    }

    /// Structure kind this instance defines, when it is a definitional
    /// instance of StructureDefinition
    pub fn defined_structure_kind(&self) -> Option<EntityKind> {
        if self.usage != InstanceUsage::Definition || self.instance_of != "StructureDefinition" {
            return None;
        }
        let derivation = self.assigned_text("derivation");
        let kind = self.assigned_text("kind");
        let sd_type = self.assigned_text("type");
        match (kind, derivation) {
            (Some("logical"), _) => Some(EntityKind::Logical),
            (_, Some("constraint")) if sd_type == Some("Extension") => Some(EntityKind::Extension),
            (_, Some("constraint")) => Some(EntityKind::Profile),
            (Some("resource"), _) => Some(EntityKind::Resource),
            _ => None,
        }
    }
}

/// A declared value set or code system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminologyDecl {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TerminologyDecl {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            url: None,
            title: None,
        }
    }
}

/// A declared invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invariant {
    /// Also the constraint key
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    /// `error` or `warning`
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub source: SourceLocation,
}

fn default_severity() -> String {
    "error".to_string()
}

impl Invariant {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expression: None,
            xpath: None,
            severity: default_severity(),
            source: SourceLocation::default(),
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }
}

/// A named, reusable group of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDecl {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A declared mapping to another specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDecl {
    pub name: String,
    #[serde(default)]
    pub id: String,
    /// Name of the definition the mapping belongs to
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Key identifying an entity by its position in the tank
///
/// Memoization and cycle tracking use this rather than names, so two
/// entities sharing a name are still compiled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub usize);

/// Every declaration of one compile run, as produced by the entity-model builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tank {
    /// Profiles, extensions, logical models and resources in declaration order
    pub entities: Vec<Entity>,
    pub instances: Vec<Instance>,
    pub value_sets: Vec<TerminologyDecl>,
    pub code_systems: Vec<TerminologyDecl>,
    pub invariants: Vec<Invariant>,
    pub rule_sets: Vec<RuleSetDecl>,
    pub mappings: Vec<MappingDecl>,
}

impl Tank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill in defaulted ids across all declarations
    pub fn normalize(&mut self) {
        for entity in &mut self.entities {
            entity.normalize();
        }
        for instance in &mut self.instances {
            if instance.id.trim().is_empty() {
                instance.id = instance.name.clone();
            }
        }
        for decl in self.value_sets.iter_mut().chain(self.code_systems.iter_mut()) {
            if decl.id.trim().is_empty() {
                decl.id = decl.name.clone();
            }
        }
        for mapping in &mut self.mappings {
            if mapping.id.trim().is_empty() {
                mapping.id = mapping.name.clone();
            }
        }
    }

    pub fn with_entity(mut self, mut entity: Entity) -> Self {
        entity.normalize();
        self.entities.push(entity);
        self
    }

    pub fn with_instance(mut self, instance: Instance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_value_set(mut self, decl: TerminologyDecl) -> Self {
        self.value_sets.push(decl);
        self
    }

    pub fn with_code_system(mut self, decl: TerminologyDecl) -> Self {
        self.code_systems.push(decl);
        self
    }

    pub fn with_invariant(mut self, invariant: Invariant) -> Self {
        self.invariants.push(invariant);
        self
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key.0)
    }

    pub fn keys(&self) -> impl Iterator<Item = EntityKey> {
        (0..self.entities.len()).map(EntityKey)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances
            .iter()
            .find(|i| i.name == name)
            .or_else(|| self.instances.iter().find(|i| i.id == name))
    }

    pub fn invariant(&self, name: &str) -> Option<&Invariant> {
        self.invariants.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::FshCode;

    #[test]
    fn test_tank_from_json_with_defaults() {
        let json = serde_json::json!({
            "entities": [{ "kind": "profile", "name": "Foo", "parent": "Patient" }],
            "valueSets": [{ "name": "MyVS" }]
        });
        let mut tank: Tank = serde_json::from_value(json).unwrap();
        tank.normalize();
        assert_eq!(tank.entities[0].id, "Foo");
        assert_eq!(tank.value_sets[0].id, "MyVS");
        assert!(tank.instances.is_empty());
    }

    #[test]
    fn test_definitional_instance_kind() {
        let inst = Instance::new("MyProfileDef", "StructureDefinition")
            .with_usage(InstanceUsage::Definition)
            .with_rule(Rule::assignment(
                "derivation",
                FshValue::Code(FshCode::new("constraint")),
            ))
            .with_rule(Rule::assignment("type", FshValue::String("Extension".into())));
        assert_eq!(inst.defined_structure_kind(), Some(EntityKind::Extension));

        let example = Instance::new("Bob", "Patient");
        assert_eq!(example.defined_structure_kind(), None);
    }
}
