use sdforge_core::{ExporterConfig, FhirDefinitions, StructureDefinition};
use sdforge_core_types::SourceLocation;
use serde_json::{json, Value};

const FHIR_BASE: &str = "http://hl7.org/fhir/StructureDefinition";

/// One snapshot element; an empty `types` list leaves `type` out
fn element(path: &str, min: u32, max: &str, types: &[&str]) -> Value {
    let mut el = json!({ "id": path, "path": path, "min": min, "max": max });
    if !types.is_empty() {
        el["type"] = Value::Array(types.iter().map(|t| json!({ "code": t })).collect());
    }
    el
}

fn definition(id: &str, kind: &str, base: Option<&str>, elements: Vec<Value>) -> Value {
    let mut sd = json!({
        "resourceType": "StructureDefinition",
        "id": id,
        "name": id,
        "url": format!("{}/{}", FHIR_BASE, id),
        "status": "active",
        "publisher": "HL7 International",
        "kind": kind,
        "abstract": false,
        "type": id,
        "derivation": "specialization",
        "snapshot": { "element": elements }
    });
    if let Some(base) = base {
        sd["baseDefinition"] = json!(format!("{}/{}", FHIR_BASE, base));
    }
    sd
}

fn primitive(id: &str) -> Value {
    definition(
        id,
        "primitive-type",
        Some("Element"),
        vec![
            element(id, 0, "*", &[]),
            element(&format!("{}.id", id), 0, "1", &["string"]),
        ],
    )
}

/// A small slice of the core definitions, enough to profile Patient and
/// Observation and to define extensions and logical models
#[allow(dead_code)]
pub fn fhir_library() -> FhirDefinitions {
    let mut library = FhirDefinitions::new();
    for id in ["string", "boolean", "code", "uri", "integer", "decimal", "dateTime"] {
        library.add(primitive(id));
    }

    library.add(definition("Base", "complex-type", None, vec![element("Base", 0, "*", &[])]));
    library.add(definition(
        "Element",
        "complex-type",
        Some("Base"),
        vec![
            element("Element", 0, "*", &[]),
            element("Element.id", 0, "1", &["string"]),
            element("Element.extension", 0, "*", &["Extension"]),
        ],
    ));
    library.add(definition(
        "BackboneElement",
        "complex-type",
        Some("Element"),
        vec![
            element("BackboneElement", 0, "*", &[]),
            element("BackboneElement.id", 0, "1", &["string"]),
            element("BackboneElement.extension", 0, "*", &["Extension"]),
        ],
    ));
    library.add(definition(
        "Extension",
        "complex-type",
        Some("Element"),
        vec![
            element("Extension", 0, "*", &[]),
            element("Extension.id", 0, "1", &["string"]),
            element("Extension.extension", 0, "*", &["Extension"]),
            element("Extension.url", 1, "1", &["uri"]),
            element(
                "Extension.value[x]",
                0,
                "1",
                &["string", "boolean", "code", "Coding", "CodeableConcept", "Quantity"],
            ),
        ],
    ));
    library.add(definition(
        "Coding",
        "complex-type",
        Some("Element"),
        vec![
            element("Coding", 0, "*", &[]),
            element("Coding.system", 0, "1", &["uri"]),
            element("Coding.code", 0, "1", &["code"]),
            element("Coding.display", 0, "1", &["string"]),
        ],
    ));
    library.add(definition(
        "CodeableConcept",
        "complex-type",
        Some("Element"),
        vec![
            element("CodeableConcept", 0, "*", &[]),
            element("CodeableConcept.coding", 0, "*", &["Coding"]),
            element("CodeableConcept.text", 0, "1", &["string"]),
        ],
    ));
    library.add(definition(
        "Quantity",
        "complex-type",
        Some("Element"),
        vec![
            element("Quantity", 0, "*", &[]),
            element("Quantity.value", 0, "1", &["decimal"]),
            element("Quantity.unit", 0, "1", &["string"]),
            element("Quantity.system", 0, "1", &["uri"]),
            element("Quantity.code", 0, "1", &["code"]),
        ],
    ));
    library.add(definition(
        "HumanName",
        "complex-type",
        Some("Element"),
        vec![
            element("HumanName", 0, "*", &[]),
            element("HumanName.family", 0, "1", &["string"]),
            element("HumanName.given", 0, "*", &["string"]),
        ],
    ));
    library.add(definition(
        "Reference",
        "complex-type",
        Some("Element"),
        vec![
            element("Reference", 0, "*", &[]),
            element("Reference.reference", 0, "1", &["string"]),
            element("Reference.display", 0, "1", &["string"]),
        ],
    ));

    let mut resource = definition(
        "Resource",
        "resource",
        Some("Base"),
        vec![
            element("Resource", 0, "*", &[]),
            element("Resource.id", 0, "1", &["string"]),
        ],
    );
    resource["abstract"] = json!(true);
    library.add(resource);
    let mut domain_resource = definition(
        "DomainResource",
        "resource",
        Some("Resource"),
        vec![
            element("DomainResource", 0, "*", &[]),
            element("DomainResource.id", 0, "1", &["string"]),
            element("DomainResource.extension", 0, "*", &["Extension"]),
        ],
    );
    domain_resource["abstract"] = json!(true);
    library.add(domain_resource);

    library.add(definition(
        "Patient",
        "resource",
        Some("DomainResource"),
        vec![
            element("Patient", 0, "*", &[]),
            element("Patient.id", 0, "1", &["string"]),
            element("Patient.extension", 0, "*", &["Extension"]),
            element("Patient.active", 0, "1", &["boolean"]),
            element("Patient.name", 0, "*", &["HumanName"]),
            element("Patient.gender", 0, "1", &["code"]),
            element("Patient.managingOrganization", 0, "1", &["Reference"]),
        ],
    ));
    library.add(definition(
        "Observation",
        "resource",
        Some("DomainResource"),
        vec![
            element("Observation", 0, "*", &[]),
            element("Observation.id", 0, "1", &["string"]),
            element("Observation.extension", 0, "*", &["Extension"]),
            element("Observation.status", 1, "1", &["code"]),
            element("Observation.code", 1, "1", &["CodeableConcept"]),
            element("Observation.subject", 0, "1", &["Reference"]),
            element(
                "Observation.value[x]",
                0,
                "1",
                &["Quantity", "CodeableConcept", "string"],
            ),
            element("Observation.component", 0, "*", &["BackboneElement"]),
            element("Observation.component.code", 1, "1", &["CodeableConcept"]),
            element(
                "Observation.component.value[x]",
                0,
                "1",
                &["Quantity", "CodeableConcept", "string"],
            ),
        ],
    ));

    library
}

/// Canonical url of a core definition
#[allow(dead_code)]
pub fn core_url(id: &str) -> String {
    format!("{}/{}", FHIR_BASE, id)
}

#[allow(dead_code)]
pub fn acme_config() -> ExporterConfig {
    ExporterConfig::with_canonical("http://acme.org/fhir")
}

#[allow(dead_code)]
pub fn at_line(line: u32) -> SourceLocation {
    SourceLocation::new("input/fsh/profiles.fsh", line, line)
}

/// Ids of every element in declaration order
#[allow(dead_code)]
pub fn element_ids(sd: &StructureDefinition) -> Vec<&str> {
    sd.snapshot.iter().map(|e| e.id.as_str()).collect()
}
