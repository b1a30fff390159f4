//! Instance export collaborator
//!
//! Structure definitions can reference instances (`^contact = MyContact`,
//! `* code = MyCodeInstance`). Building those instances is delegated
//! through `InstanceExporter`; the default implementation renders an
//! instance from its assignment rules.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use super::values;
use crate::fisher::{FishKind, MasterFisher};
use crate::model::{FshValue, Instance, RuleKind, StructureKind};
use crate::model::json_path;

/// Builds instances on demand
pub trait InstanceExporter {
    /// JSON form of `instance`, or None if it cannot be built yet
    ///
    /// An instance cannot be built while the definition it instantiates is
    /// unpublished or still receiving rules.
    fn export_instance(&mut self, instance: &Instance, fisher: &MasterFisher<'_>) -> Option<Value>;
}

/// Renders instances from their assignment rules, caching each result
#[derive(Debug, Default)]
pub struct AssignmentInstanceExporter {
    cache: HashMap<String, Value>,
    building: HashSet<String>,
}

impl AssignmentInstanceExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(&mut self, instance: &Instance, fisher: &MasterFisher<'_>) -> Option<Value> {
        let definition = fisher.fish_for_fhir(&instance.instance_of, FishKind::STRUCTURES)?;
        if definition.in_progress {
            return None;
        }

        let mut doc = Value::Object(Map::new());
        if definition.kind == StructureKind::Resource {
            json_path::set_at(&mut doc, "resourceType", Value::String(definition.sd_type.clone()))
                .ok()?;
            json_path::set_at(&mut doc, "id", Value::String(instance.id.clone())).ok()?;
            if definition.is_constraint() {
                json_path::set_at(&mut doc, "meta.profile[0]", Value::String(definition.url))
                    .ok()?;
            }
        }

        for rule in &instance.rules {
            let RuleKind::Assignment { value, .. } = &rule.kind else {
                continue;
            };
            let rendered = match value {
                FshValue::Instance(name) => {
                    let nested = fisher.tank().tank().instance(name)?;
                    self.export_instance(nested, fisher)?
                }
                other => match values::plain_json(fisher, other) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(instance = %instance.name, path = %rule.path, error = %e, "skipped instance rule");
                        continue;
                    }
                },
            };
            if let Err(reason) = json_path::set_at(&mut doc, &rule.path, rendered) {
                tracing::debug!(instance = %instance.name, path = %rule.path, %reason, "skipped instance rule");
            }
        }
        Some(doc)
    }
}

impl InstanceExporter for AssignmentInstanceExporter {
    fn export_instance(&mut self, instance: &Instance, fisher: &MasterFisher<'_>) -> Option<Value> {
        if let Some(cached) = self.cache.get(&instance.name) {
            return Some(cached.clone());
        }
        if !self.building.insert(instance.name.clone()) {
            return None;
        }
        let built = self.build(instance, fisher);
        self.building.remove(&instance.name);

        let built = built?;
        self.cache.insert(instance.name.clone(), built.clone());
        Some(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;
    use crate::fisher::{FhirDefinitions, Package};
    use crate::model::{FshCode, Rule, Tank};
    use serde_json::json;

    fn library() -> FhirDefinitions {
        FhirDefinitions::new().with(json!({
            "resourceType": "StructureDefinition", "id": "Patient", "name": "Patient",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "kind": "resource", "type": "Patient", "derivation": "specialization",
            "snapshot": { "element": [{ "id": "Patient", "path": "Patient" }] }
        }))
    }

    #[test]
    fn test_builds_from_assignments() {
        let bob = Instance::new("Bob", "Patient")
            .with_rule(Rule::assignment("active", FshValue::Boolean(true)))
            .with_rule(Rule::assignment(
                "gender",
                FshValue::Code(FshCode::new("male")),
            ))
            .with_rule(Rule::assignment(
                "name[0].family",
                FshValue::String("Smith".to_string()),
            ));
        let tank = Tank::new().with_instance(bob.clone());
        let package = Package::new();
        let lib = library();
        let config = ExporterConfig::default();
        let fisher = MasterFisher::new(&tank, &package, &lib, &config);

        let mut exporter = AssignmentInstanceExporter::new();
        let json = exporter.export_instance(&bob, &fisher).unwrap();
        assert_eq!(json["resourceType"], "Patient");
        assert_eq!(json["id"], "Bob");
        assert_eq!(json["gender"], "male");
        assert_eq!(json["name"][0]["family"], "Smith");
    }

    #[test]
    fn test_unknown_definition_is_not_built() {
        let inst = Instance::new("Thing1", "NotYetCompiled");
        let tank = Tank::new().with_instance(inst.clone());
        let package = Package::new();
        let lib = library();
        let config = ExporterConfig::default();
        let fisher = MasterFisher::new(&tank, &package, &lib, &config);

        let mut exporter = AssignmentInstanceExporter::new();
        assert!(exporter.export_instance(&inst, &fisher).is_none());
    }
}
