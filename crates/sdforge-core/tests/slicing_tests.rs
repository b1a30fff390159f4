#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{acme_config, at_line, element_ids, fhir_library};
use sdforge_core::model::{ContainsItem, Max, TypeRef};
use sdforge_core::{compile, Entity, ExporterConfig, Rule, Severity, Tank};

#[test]
fn test_slices_follow_sliced_element_in_declaration_order() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp")
            .with_parent("Observation")
            .with_rule(Rule::contains(
                "component",
                vec![ContainsItem::slice("systolic"), ContainsItem::slice("diastolic")],
            ))
            .with_rule(Rule::cardinality("component[systolic]", Some(1), Some(Max::Bounded(1))))
            .with_rule(Rule::only(
                "component[diastolic].value[x]",
                vec![TypeRef::named("Quantity")],
            )),
    );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    assert!(output.is_success(), "{:?}", output.diagnostics.all());
    let sd = &output.package.profiles()[0];
    let ids = element_ids(sd);
    let component = ids.iter().position(|id| *id == "Observation.component").unwrap();
    assert_eq!(
        &ids[component..],
        &[
            "Observation.component",
            "Observation.component.code",
            "Observation.component.value[x]",
            "Observation.component:systolic",
            "Observation.component:diastolic",
            "Observation.component:diastolic.code",
            "Observation.component:diastolic.value[x]",
        ]
    );

    let systolic = sd.snapshot.by_id("Observation.component:systolic").unwrap();
    assert_eq!(systolic.slice_name.as_deref(), Some("systolic"));
    assert_eq!((systolic.min, systolic.max), (Some(1), Some(Max::Bounded(1))));
    let diastolic_value = sd
        .snapshot
        .by_id("Observation.component:diastolic.value[x]")
        .unwrap();
    assert_eq!(diastolic_value.type_codes(), vec!["Quantity"]);
    // the sliced element keeps all of its types
    assert_eq!(
        sd.snapshot
            .by_id("Observation.component.value[x]")
            .unwrap()
            .types
            .len(),
        3
    );
}

#[test]
fn test_unknown_slice_is_not_created_by_lookup() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp")
            .with_parent("Observation")
            .with_rule(Rule::contains("component", vec![ContainsItem::slice("systolic")]))
            .with_rule(Rule::cardinality("component[missing].code", Some(1), None).at(at_line(4))),
    );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    let errors = output.diagnostics.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, Some("ERR_PATH_RESOLUTION"));
    assert_eq!(errors[0].location, Some(at_line(4)));

    let sd = &output.package.profiles()[0];
    assert!(element_ids(sd).iter().all(|id| !id.contains("missing")));
}

#[test]
fn test_failed_lookup_leaves_tree_untouched() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp")
            .with_parent("Observation")
            .with_rule(Rule::contains("component", vec![ContainsItem::slice("systolic")]))
            .with_rule(Rule::cardinality("component[systolic].nickname", Some(1), None)),
    );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    assert_eq!(output.diagnostics.errors().len(), 1);
    let sd = &output.package.profiles()[0];
    assert!(sd.snapshot.by_id("Observation.component:systolic").is_some());
    assert!(sd
        .snapshot
        .by_id("Observation.component:systolic.code")
        .is_none());
}

#[test]
fn test_redeclared_slice_is_an_error() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp")
            .with_parent("Observation")
            .with_rule(Rule::contains("component", vec![ContainsItem::slice("systolic")]))
            .with_rule(Rule::contains("component", vec![ContainsItem::slice("systolic")])),
    );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    assert_eq!(output.diagnostics.errors()[0].code, Some("ERR_CONFLICT"));
    let sd = &output.package.profiles()[0];
    let count = element_ids(sd)
        .iter()
        .filter(|id| **id == "Observation.component:systolic")
        .count();
    assert_eq!(count, 1);
}

#[test]
fn test_typed_slice_outside_extension_is_rejected() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp").with_parent("Observation").with_rule(Rule::contains(
            "component",
            vec![
                ContainsItem::typed("systolic", "Quantity"),
                ContainsItem::slice("diastolic"),
            ],
        )),
    );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    let errors = output.diagnostics.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, Some("ERR_INVALID_TYPE"));
    let sd = &output.package.profiles()[0];
    assert!(sd.snapshot.by_id("Observation.component:systolic").is_none());
    assert!(sd.snapshot.by_id("Observation.component:diastolic").is_some());
}

#[test]
fn test_numeric_index_addresses_slice_in_order() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp")
            .with_parent("Observation")
            .with_rule(Rule::contains(
                "component",
                vec![ContainsItem::slice("systolic"), ContainsItem::slice("diastolic")],
            ))
            .with_rule(Rule::cardinality("component[1]", Some(1), None)),
    );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    assert!(output.is_success(), "{:?}", output.diagnostics.all());
    let sd = &output.package.profiles()[0];
    assert_eq!(
        sd.snapshot.by_id("Observation.component:diastolic").unwrap().min,
        Some(1)
    );
}

#[test]
fn test_numeric_index_rejected_when_named_slices_required() {
    let tank = Tank::new().with_entity(
        Entity::profile("Bp")
            .with_parent("Observation")
            .with_rule(Rule::contains("component", vec![ContainsItem::slice("systolic")]))
            .with_rule(Rule::cardinality("component[0]", Some(1), None)),
    );
    let library = fhir_library();
    let config = ExporterConfig {
        require_named_slices: true,
        ..acme_config()
    };
    let output = compile(&tank, &library, &config);

    let errors = output.diagnostics.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, Some("ERR_PATH_RESOLUTION"));
}

#[test]
fn test_extension_slice_redeclared_for_same_extension_warns() {
    let tank = Tank::new()
        .with_entity(Entity::extension("Birthsex").with_rule(Rule::only(
            "value[x]",
            vec![TypeRef::named("code")],
        )))
        .with_entity(
            Entity::profile("UsPatient")
                .with_parent("Patient")
                .with_rule(Rule::contains(
                    "extension",
                    vec![ContainsItem::typed("birthsex", "Birthsex")],
                ))
                .with_rule(
                    Rule::contains("extension", vec![ContainsItem::typed("birthsex", "Birthsex")])
                        .at(at_line(21)),
                ),
        );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    assert!(output.is_success(), "{:?}", output.diagnostics.all());
    let warnings = output.diagnostics.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(warnings[0].location, Some(at_line(21)));

    let sd = &output.package.profiles()[0];
    let slices: Vec<_> = sd
        .snapshot
        .iter()
        .filter(|e| e.id == "Patient.extension:birthsex")
        .collect();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].types[0].code, "Extension");
    assert_eq!(
        slices[0].types[0].profile,
        vec!["http://acme.org/fhir/StructureDefinition/Birthsex".to_string()]
    );
    let slot = sd.snapshot.by_id("Patient.extension").unwrap();
    assert_eq!(slot.slicing.as_ref().unwrap().discriminator[0].path, "url");
}

#[test]
fn test_extension_slice_redeclared_for_other_extension_fails() {
    let tank = Tank::new()
        .with_entity(Entity::extension("Birthsex"))
        .with_entity(Entity::extension("GenderIdentity"))
        .with_entity(
            Entity::profile("UsPatient")
                .with_parent("Patient")
                .with_rule(Rule::contains(
                    "extension",
                    vec![ContainsItem::typed("sex", "Birthsex")],
                ))
                .with_rule(Rule::contains(
                    "extension",
                    vec![ContainsItem::typed("sex", "GenderIdentity")],
                )),
        );
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    let errors = output.diagnostics.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, Some("ERR_CONFLICT"));
    let sd = &output.package.profiles()[0];
    let slice = sd.snapshot.by_id("Patient.extension:sex").unwrap();
    assert_eq!(
        slice.types[0].profile,
        vec!["http://acme.org/fhir/StructureDefinition/Birthsex".to_string()]
    );
}

#[test]
fn test_unknown_extension_is_reported() {
    let tank = Tank::new().with_entity(Entity::profile("UsPatient").with_parent("Patient").with_rule(
        Rule::contains("extension", vec![ContainsItem::typed("race", "UsCoreRace")]),
    ));
    let library = fhir_library();
    let config = acme_config();
    let output = compile(&tank, &library, &config);

    let errors = output.diagnostics.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, Some("ERR_REFERENCE_RESOLUTION"));
    assert!(errors[0].message.contains("UsCoreRace"));
    let sd = &output.package.profiles()[0];
    assert!(sd.snapshot.by_id("Patient.extension:race").is_none());
}
