use super::{split_version, FishKind, Fishable, Metadata};
use crate::config::ExporterConfig;
use crate::model::{
    Derivation, Entity, EntityKey, EntityKind, FshValue, Instance, RuleKind, Tank,
    TerminologyDecl,
};

fn entity_kind_for(kind: FishKind) -> Option<EntityKind> {
    match kind {
        FishKind::Profile => Some(EntityKind::Profile),
        FishKind::Extension => Some(EntityKind::Extension),
        FishKind::Logical => Some(EntityKind::Logical),
        FishKind::Resource => Some(EntityKind::Resource),
        _ => None,
    }
}

/// Root-level caret override of a metadata field, e.g. `^url = "..."`
fn caret_override<'e>(entity: &'e Entity, field: &str) -> Option<&'e str> {
    entity.rules.iter().rev().find_map(|r| match &r.kind {
        RuleKind::CaretValue { caret_path, value } if r.path.is_empty() && caret_path == field => {
            match value {
                FshValue::String(s) => Some(s.as_str()),
                FshValue::Code(c) => Some(c.code.as_str()),
                _ => None,
            }
        }
        _ => None,
    })
}

/// Resolves names against the declarations of the current run
pub struct TankFisher<'a> {
    tank: &'a Tank,
    config: &'a ExporterConfig,
}

impl<'a> TankFisher<'a> {
    pub fn new(tank: &'a Tank, config: &'a ExporterConfig) -> Self {
        Self { tank, config }
    }

    pub fn tank(&self) -> &'a Tank {
        self.tank
    }

    /// Canonical url an entity will be published under
    pub fn entity_url(&self, entity: &Entity) -> String {
        caret_override(entity, "url")
            .map(str::to_string)
            .unwrap_or_else(|| self.config.structure_definition_url(&entity.id))
    }

    fn entity_version<'e>(&'e self, entity: &'e Entity) -> Option<&'e str> {
        caret_override(entity, "version").or(self.config.version.as_deref())
    }

    fn entity_matches(&self, entity: &Entity, base: &str, version: Option<&str>) -> bool {
        (entity.name == base || entity.id == base || self.entity_url(entity) == base)
            && version.map_or(true, |v| self.entity_version(entity) == Some(v))
    }

    /// Structure entity matching `item`, trying `kinds` in order
    ///
    /// Only profiles, extensions, logical models and resources are
    /// considered; definitional instances are not compilable entities.
    pub fn find_entity(&self, item: &str, kinds: &[FishKind]) -> Option<EntityKey> {
        let (base, version) = split_version(item);
        kinds.iter().filter_map(|k| entity_kind_for(*k)).find_map(|kind| {
            self.tank
                .keys()
                .find(|key| {
                    self.tank
                        .entity(*key)
                        .is_some_and(|e| e.kind == kind && self.entity_matches(e, base, version))
                })
        })
    }

    fn entity_metadata(&self, entity: &Entity, kind: FishKind) -> Metadata {
        let sd_type = match entity.kind {
            EntityKind::Extension => Some("Extension".to_string()),
            EntityKind::Logical => Some(entity.id.clone()),
            // Profiles and resources take their type from the parent chain
            EntityKind::Profile | EntityKind::Resource => None,
        };
        let parent = entity
            .parent
            .clone()
            .or_else(|| entity.kind.default_parent().map(str::to_string));
        Metadata {
            id: entity.id.clone(),
            name: entity.name.clone(),
            kind: Some(kind),
            sd_type,
            url: Some(self.entity_url(entity)),
            parent,
            resource_type: Some("StructureDefinition".to_string()),
            version: self.entity_version(entity).map(str::to_string),
            derivation: Some(if entity.kind == EntityKind::Logical {
                Derivation::Specialization
            } else {
                Derivation::Constraint
            }),
            instance_usage: None,
            is_abstract: false,
            can_bind: entity.kind == EntityKind::Logical
                && entity.characteristics.iter().any(|c| c == "can-bind"),
            can_be_target: entity.kind == EntityKind::Logical
                && entity.characteristics.iter().any(|c| c == "can-be-target"),
        }
    }

    fn definition_instance_metadata(&self, instance: &Instance, kind: FishKind) -> Metadata {
        let url = instance
            .assigned_text("url")
            .map(str::to_string)
            .unwrap_or_else(|| self.config.structure_definition_url(&instance.id));
        Metadata {
            id: instance.id.clone(),
            name: instance
                .assigned_text("name")
                .unwrap_or(instance.name.as_str())
                .to_string(),
            kind: Some(kind),
            sd_type: instance.assigned_text("type").map(str::to_string),
            url: Some(url),
            parent: instance.assigned_text("baseDefinition").map(str::to_string),
            resource_type: Some("StructureDefinition".to_string()),
            version: instance
                .assigned_text("version")
                .or(self.config.version.as_deref())
                .map(str::to_string),
            derivation: match instance.assigned_text("derivation") {
                Some("constraint") => Some(Derivation::Constraint),
                Some("specialization") => Some(Derivation::Specialization),
                _ => None,
            },
            instance_usage: Some(instance.usage),
            ..Metadata::default()
        }
    }

    fn terminology_metadata(
        &self,
        decl: &TerminologyDecl,
        resource_type: &str,
        kind: FishKind,
    ) -> Metadata {
        Metadata {
            id: decl.id.clone(),
            name: decl.name.clone(),
            kind: Some(kind),
            url: Some(
                decl.url
                    .clone()
                    .unwrap_or_else(|| self.config.resource_url(resource_type, &decl.id)),
            ),
            resource_type: Some(resource_type.to_string()),
            version: self.config.version.clone(),
            ..Metadata::default()
        }
    }

    fn fish_kind(&self, base: &str, version: Option<&str>, kind: FishKind) -> Option<Metadata> {
        match kind {
            FishKind::Profile | FishKind::Extension | FishKind::Logical | FishKind::Resource => {
                let entity_kind = entity_kind_for(kind)?;
                if let Some(entity) = self
                    .tank
                    .entities
                    .iter()
                    .find(|e| e.kind == entity_kind && self.entity_matches(e, base, version))
                {
                    return Some(self.entity_metadata(entity, kind));
                }
                self.tank
                    .instances
                    .iter()
                    .filter(|i| i.defined_structure_kind() == Some(entity_kind))
                    .map(|i| self.definition_instance_metadata(i, kind))
                    .find(|m| {
                        (m.name == base || m.id == base || m.url.as_deref() == Some(base))
                            && version.map_or(true, |v| m.version.as_deref() == Some(v))
                    })
            }
            FishKind::ValueSet | FishKind::CodeSystem => {
                let (decls, resource_type) = if kind == FishKind::ValueSet {
                    (&self.tank.value_sets, "ValueSet")
                } else {
                    (&self.tank.code_systems, "CodeSystem")
                };
                decls
                    .iter()
                    .map(|d| self.terminology_metadata(d, resource_type, kind))
                    .find(|m| m.name == base || m.id == base || m.url.as_deref() == Some(base))
            }
            FishKind::Instance => self
                .tank
                .instances
                .iter()
                .find(|i| i.name == base || i.id == base)
                .map(|i| Metadata {
                    id: i.id.clone(),
                    name: i.name.clone(),
                    kind: Some(kind),
                    resource_type: Some(i.instance_of.clone()),
                    instance_usage: Some(i.usage),
                    ..Metadata::default()
                }),
            FishKind::Invariant => self.tank.invariant(base).map(|i| Metadata {
                id: i.name.clone(),
                name: i.name.clone(),
                kind: Some(kind),
                ..Metadata::default()
            }),
            FishKind::RuleSet => self
                .tank
                .rule_sets
                .iter()
                .find(|r| r.name == base)
                .map(|r| Metadata {
                    id: r.name.clone(),
                    name: r.name.clone(),
                    kind: Some(kind),
                    ..Metadata::default()
                }),
            FishKind::Mapping => self
                .tank
                .mappings
                .iter()
                .find(|m| m.name == base || m.id == base)
                .map(|m| Metadata {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    kind: Some(kind),
                    ..Metadata::default()
                }),
            FishKind::Type => None,
        }
    }

    /// True if a declared instance with this name exists
    pub fn has_instance(&self, name: &str) -> bool {
        self.tank.instance(name).is_some()
    }
}

impl Fishable for TankFisher<'_> {
    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        let (base, version) = split_version(item);
        kinds
            .iter()
            .find_map(|kind| self.fish_kind(base, version, *kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Invariant, Rule};

    fn tank() -> Tank {
        Tank::new()
            .with_entity(Entity::profile("MyPatient").with_id("my-patient").with_parent("Patient"))
            .with_entity(Entity::extension("Birthsex"))
            .with_entity(Entity::logical("Thing").with_characteristic("can-be-target"))
            .with_value_set(TerminologyDecl::new("MyVS"))
            .with_invariant(Invariant::new("inv-1", "Must be so"))
            .with_instance(Instance::new("Bob", "Patient"))
    }

    #[test]
    fn test_find_entity_by_name_id_and_url() {
        let tank = tank();
        let config = ExporterConfig::with_canonical("http://acme.org");
        let fisher = TankFisher::new(&tank, &config);

        let by_name = fisher.find_entity("MyPatient", FishKind::STRUCTURES);
        let by_id = fisher.find_entity("my-patient", FishKind::STRUCTURES);
        let by_url = fisher.find_entity(
            "http://acme.org/StructureDefinition/my-patient",
            FishKind::STRUCTURES,
        );
        assert_eq!(by_name, Some(EntityKey(0)));
        assert_eq!(by_id, by_name);
        assert_eq!(by_url, by_name);
        assert_eq!(fisher.find_entity("MyPatient", &[FishKind::Extension]), None);
    }

    #[test]
    fn test_metadata_for_each_kind() {
        let tank = tank();
        let config = ExporterConfig::with_canonical("http://acme.org");
        let fisher = TankFisher::new(&tank, &config);

        let ext = fisher
            .fish_for_metadata("Birthsex", FishKind::STRUCTURES)
            .unwrap();
        assert_eq!(ext.sd_type.as_deref(), Some("Extension"));
        assert_eq!(ext.parent.as_deref(), Some("Extension"));

        let thing = fisher
            .fish_for_metadata("Thing", &[FishKind::Logical])
            .unwrap();
        assert!(thing.can_be_target);
        assert!(!thing.can_bind);

        let vs = fisher
            .fish_for_metadata("MyVS", &[FishKind::ValueSet])
            .unwrap();
        assert_eq!(vs.url.as_deref(), Some("http://acme.org/ValueSet/MyVS"));

        assert!(fisher
            .fish_for_metadata("inv-1", &[FishKind::Invariant])
            .is_some());
        let bob = fisher
            .fish_for_metadata("Bob", &[FishKind::Instance])
            .unwrap();
        assert_eq!(bob.resource_type.as_deref(), Some("Patient"));
    }

    #[test]
    fn test_caret_url_override() {
        let tank = Tank::new().with_entity(Entity::profile("Foo").with_parent("Patient").with_rule(
            Rule::caret("", "url", FshValue::String("http://other.org/Foo".to_string())),
        ));
        let config = ExporterConfig::default();
        let fisher = TankFisher::new(&tank, &config);
        assert!(fisher
            .find_entity("http://other.org/Foo", FishKind::STRUCTURES)
            .is_some());
    }
}
