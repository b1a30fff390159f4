//! Well-known canonical urls

/// Prefix of every core FHIR structure definition
pub const FHIR_SD_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

pub const STANDARDS_STATUS: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-standards-status";
pub const NORMATIVE_VERSION: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-normative-version";
pub const FMM: &str = "http://hl7.org/fhir/StructureDefinition/structuredefinition-fmm";
pub const FMM_NO_WARNINGS: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-fmm-no-warnings";
pub const WORKGROUP: &str = "http://hl7.org/fhir/StructureDefinition/structuredefinition-wg";
pub const SUMMARY: &str = "http://hl7.org/fhir/StructureDefinition/structuredefinition-summary";
pub const EXPLICIT_TYPE_NAME: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-explicit-type-name";
pub const TYPE_CHARACTERISTICS: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-type-characteristics";
pub const LOGICAL_TARGET: &str = "http://hl7.org/fhir/tools/StructureDefinition/logical-target";

/// Markers that describe the parent only and are never inherited
pub const UNINHERITED_EXTENSIONS: &[&str] = &[
    FMM,
    FMM_NO_WARNINGS,
    WORKGROUP,
    STANDARDS_STATUS,
    NORMATIVE_VERSION,
    SUMMARY,
    EXPLICIT_TYPE_NAME,
];

/// Canonical url of a core FHIR type or resource
pub fn core_type_url(type_name: &str) -> String {
    format!("{}{}", FHIR_SD_BASE, type_name)
}
