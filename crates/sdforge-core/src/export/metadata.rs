//! Metadata inherited from the parent, and what replaces it

use serde_json::Value;

use crate::config::ExporterConfig;
use crate::model::urls::{TYPE_CHARACTERISTICS, UNINHERITED_EXTENSIONS};
use crate::model::{
    Derivation, Entity, EntityKind, ExtensionMarker, StructureDefinition, StructureKind,
};
use crate::tree::find_element;

/// Properties that describe the parent only
const UNINHERITED_PROPERTIES: &[&str] = &[
    "text",
    "contained",
    "experimental",
    "date",
    "publisher",
    "contact",
    "useContext",
    "jurisdiction",
    "purpose",
    "copyright",
    "keyword",
    "identifier",
    "differential",
];

/// Turn a clone of the parent into the skeleton of `entity`'s artifact
///
/// Identity, status and derivation are replaced, parent-only properties
/// and markers are dropped, and the kind-specific adjustments for logical
/// models and extensions are made. Usage contexts are set by the caller.
pub fn reset_metadata(
    sd: &mut StructureDefinition,
    entity: &Entity,
    url: String,
    base_url: String,
    config: &ExporterConfig,
) {
    for key in UNINHERITED_PROPERTIES {
        sd.extra.remove(*key);
    }
    sd.extension
        .retain(|e| !UNINHERITED_EXTENSIONS.contains(&e.url.as_str()));

    sd.id = entity.id.clone();
    sd.name = entity.name.clone();
    sd.url = url;
    sd.version = config.version.clone();
    sd.status = config.status.clone();
    sd.title = entity.title.clone();
    sd.description = entity.description.clone();
    sd.base_definition = Some(base_url);
    sd.derivation = Some(if entity.kind == EntityKind::Logical {
        Derivation::Specialization
    } else {
        Derivation::Constraint
    });
    sd.is_abstract = false;
    if config.fhir_version.is_some() {
        sd.fhir_version = config.fhir_version.clone();
    }

    match entity.kind {
        EntityKind::Logical => reset_logical(sd, entity),
        EntityKind::Extension => reset_extension(sd, entity, config),
        EntityKind::Profile | EntityKind::Resource => {}
    }
}

fn reset_logical(sd: &mut StructureDefinition, entity: &Entity) {
    sd.kind = StructureKind::Logical;
    sd.sd_type = entity.id.clone();
    sd.context.clear();
    sd.snapshot.rebase(&entity.id);

    sd.extension.retain(|e| e.url != TYPE_CHARACTERISTICS);
    for code in &entity.characteristics {
        sd.extension
            .push(ExtensionMarker::code(TYPE_CHARACTERISTICS, code.as_str()));
    }
}

fn reset_extension(sd: &mut StructureDefinition, entity: &Entity, config: &ExporterConfig) {
    if config.apply_extension_metadata_to_root {
        if let Some(root) = sd.snapshot.root_mut() {
            if let Some(title) = &entity.title {
                root.short = Some(title.clone());
            }
            if let Some(description) = &entity.description {
                root.definition = Some(description.clone());
            }
        }
    }

    let url = sd.url.clone();
    match find_element(&sd.snapshot, "url").and_then(|i| sd.snapshot.get_mut(i)) {
        Some(url_element) => {
            url_element
                .extra
                .insert("fixedUri".to_string(), Value::String(url));
        }
        None => tracing::debug!(entity = %entity.name, "extension has no url element"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementDefinition, StructureKind};
    use crate::tree::ElementTree;
    use serde_json::json;

    fn base_extension() -> StructureDefinition {
        let mut sd = StructureDefinition::placeholder(
            EntityKind::Extension,
            "Extension",
            "Extension",
            "http://hl7.org/fhir/StructureDefinition/Extension".to_string(),
        );
        sd.kind = StructureKind::ComplexType;
        sd.derivation = Some(Derivation::Specialization);
        sd.in_progress = false;
        sd.snapshot = ElementTree::new(vec![
            ElementDefinition::new("Extension", "Extension"),
            ElementDefinition::new("Extension.url", "Extension.url"),
        ]);
        sd.extension.push(ExtensionMarker::code(
            crate::model::urls::STANDARDS_STATUS,
            "normative",
        ));
        sd.extra.insert("publisher".to_string(), json!("HL7"));
        sd
    }

    #[test]
    fn test_extension_reset() {
        let mut sd = base_extension();
        let entity = Entity::extension("Birthsex")
            .with_title("Birth sex")
            .with_description("Sex assigned at birth");
        let config = ExporterConfig::default();
        reset_metadata(
            &mut sd,
            &entity,
            "http://acme.org/StructureDefinition/Birthsex".to_string(),
            "http://hl7.org/fhir/StructureDefinition/Extension".to_string(),
            &config,
        );

        assert_eq!(sd.id, "Birthsex");
        assert_eq!(sd.derivation, Some(Derivation::Constraint));
        assert!(sd.extension.is_empty());
        assert!(!sd.extra.contains_key("publisher"));
        assert_eq!(sd.root().unwrap().short.as_deref(), Some("Birth sex"));
        assert_eq!(
            sd.snapshot.by_id("Extension.url").unwrap().extra["fixedUri"],
            "http://acme.org/StructureDefinition/Birthsex"
        );
    }

    #[test]
    fn test_extension_root_untouched_when_disabled() {
        let mut sd = base_extension();
        let entity = Entity::extension("Birthsex").with_title("Birth sex");
        let config = ExporterConfig {
            apply_extension_metadata_to_root: false,
            ..ExporterConfig::default()
        };
        reset_metadata(&mut sd, &entity, "u".to_string(), "b".to_string(), &config);
        assert!(sd.root().unwrap().short.is_none());
        assert_eq!(sd.title.as_deref(), Some("Birth sex"));
    }

    #[test]
    fn test_logical_gets_own_type_and_characteristics() {
        let mut sd = StructureDefinition::placeholder(
            EntityKind::Logical,
            "Base",
            "Base",
            "http://hl7.org/fhir/StructureDefinition/Base".to_string(),
        );
        sd.snapshot = ElementTree::new(vec![ElementDefinition::new("Base", "Base")]);
        let entity = Entity::logical("Thing").with_characteristic("can-be-target");
        reset_metadata(
            &mut sd,
            &entity,
            "http://acme.org/StructureDefinition/Thing".to_string(),
            "http://hl7.org/fhir/StructureDefinition/Base".to_string(),
            &ExporterConfig::default(),
        );

        assert_eq!(sd.sd_type, "Thing");
        assert_eq!(sd.kind, StructureKind::Logical);
        assert_eq!(sd.derivation, Some(Derivation::Specialization));
        assert_eq!(sd.root().unwrap().id, "Thing");
        assert!(sd.can_be_target());
    }
}
