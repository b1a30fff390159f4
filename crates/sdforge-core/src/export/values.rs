//! Rendering rule values as FHIR JSON
//!
//! Symbolic names inside values are substituted here: code system names
//! become system urls, `Reference(name)` becomes `ResourceType/id` for a
//! declared instance, and `Canonical(name)` becomes the target's url.

use serde_json::{json, Map, Number, Value};

use crate::errors::{CompileError, Result};
use crate::fisher::{split_version, FishKind, Fishable, MasterFisher};
use crate::model::{ElementDefinition, FshCode, FshQuantity, FshValue};

const UCUM: &str = "http://unitsofmeasure.org";

/// Url of a code system given by name, id or url
fn code_system_url(fisher: &MasterFisher<'_>, system: &str) -> String {
    let (base, version) = split_version(system);
    match fisher.fish_for_metadata(base, &[FishKind::CodeSystem]) {
        Some(meta) => {
            let url = meta.url.unwrap_or_else(|| base.to_string());
            match version {
                Some(v) => format!("{}|{}", url, v),
                None => url,
            }
        }
        None => system.to_string(),
    }
}

fn coding_json(fisher: &MasterFisher<'_>, code: &FshCode) -> Value {
    let mut coding = Map::new();
    if let Some(system) = &code.system {
        coding.insert(
            "system".to_string(),
            Value::String(code_system_url(fisher, system)),
        );
    }
    coding.insert("code".to_string(), Value::String(code.code.clone()));
    if let Some(display) = &code.display {
        coding.insert("display".to_string(), Value::String(display.clone()));
    }
    Value::Object(coding)
}

fn decimal(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(value as i64)));
    }
    Number::from_f64(value).map(Value::Number)
}

fn quantity_json(quantity: &FshQuantity) -> Option<Value> {
    let mut out = Map::new();
    out.insert("value".to_string(), decimal(quantity.value)?);
    if let Some(unit) = &quantity.unit {
        out.insert(
            "system".to_string(),
            Value::String(unit.system.clone().unwrap_or_else(|| UCUM.to_string())),
        );
        out.insert("code".to_string(), Value::String(unit.code.clone()));
        if let Some(display) = &unit.display {
            out.insert("unit".to_string(), Value::String(display.clone()));
        }
    }
    Some(Value::Object(out))
}

/// `ResourceType/id` for a declared instance, otherwise the literal text
pub(crate) fn reference_target(fisher: &MasterFisher<'_>, name: &str) -> String {
    let Some(instance) = fisher.tank().tank().instance(name) else {
        return name.to_string();
    };
    let resource_type = fisher
        .fish_for_metadata(&instance.instance_of, FishKind::STRUCTURES)
        .and_then(|m| m.sd_type)
        .unwrap_or_else(|| instance.instance_of.clone());
    format!("{}/{}", resource_type, instance.id)
}

/// Canonical url of any named definition, keeping a `|version` suffix
///
/// # Errors
///
/// Returns `CanonicalNotFound` if the name resolves to nothing that has a url
/// and is not itself a url.
pub(crate) fn canonical_url(fisher: &MasterFisher<'_>, name: &str) -> Result<String> {
    let (base, version) = split_version(name);
    let url = fisher
        .fish_for_metadata(base, FishKind::ALL)
        .and_then(|m| m.url)
        .or_else(|| base.contains("://").then(|| base.to_string()))
        .ok_or_else(|| CompileError::CanonicalNotFound {
            name: name.to_string(),
        })?;
    Ok(match version {
        Some(v) => format!("{}|{}", url, v),
        None => url,
    })
}

/// Render a value without knowing the target type
///
/// Used for caret rules and instance properties. A code without a system
/// renders as a bare code string; with a system it renders as a Coding.
///
/// # Errors
///
/// Returns `CanonicalNotFound` for an unresolvable canonical, and
/// `MismatchedValueType` for a decimal that has no JSON form or an instance
/// name (instances are rendered by the caller).
pub fn plain_json(fisher: &MasterFisher<'_>, value: &FshValue) -> Result<Value> {
    let mismatch = || CompileError::MismatchedValueType {
        element_id: String::new(),
        value: value.to_string(),
        types: "any".to_string(),
    };
    Ok(match value {
        FshValue::Boolean(b) => Value::Bool(*b),
        FshValue::Integer(i) => Value::Number(Number::from(*i)),
        FshValue::Decimal(d) => decimal(*d).ok_or_else(mismatch)?,
        FshValue::String(s) => Value::String(s.clone()),
        FshValue::Code(code) if code.system.is_none() => Value::String(code.code.clone()),
        FshValue::Code(code) => coding_json(fisher, code),
        FshValue::Quantity(q) => quantity_json(q).ok_or_else(mismatch)?,
        FshValue::Reference(name) => json!({ "reference": reference_target(fisher, name) }),
        FshValue::Canonical(name) => Value::String(canonical_url(fisher, name)?),
        FshValue::Instance(_) => return Err(mismatch()),
    })
}

/// Render a value for assignment to `element`, choosing the element type
/// it is assigned as
///
/// # Errors
///
/// Returns `MismatchedValueType` when no type of the element accepts the
/// value, and `CanonicalNotFound` for an unresolvable canonical.
pub fn typed_json(
    fisher: &MasterFisher<'_>,
    value: &FshValue,
    element: &ElementDefinition,
) -> Result<(String, Value)> {
    let mismatch = || CompileError::MismatchedValueType {
        element_id: element.id.clone(),
        value: value.to_string(),
        types: element.type_codes().join(", "),
    };
    let compatible = value.compatible_types();
    let type_code = element
        .types
        .iter()
        .map(|t| t.code.as_str())
        .find(|code| compatible.contains(code))
        .ok_or_else(mismatch)?
        .to_string();

    let rendered = match (value, type_code.as_str()) {
        (FshValue::Code(code), "code") => Value::String(code.code.clone()),
        (FshValue::Code(code), "Coding") => coding_json(fisher, code),
        (FshValue::Code(code), _) => json!({ "coding": [coding_json(fisher, code)] }),
        (other, _) => plain_json(fisher, other).map_err(|e| match e {
            CompileError::MismatchedValueType { .. } => mismatch(),
            e => e,
        })?,
    };
    Ok((type_code, rendered))
}
