//! Element definitions and the element-local constraint operations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cardinality::{Cardinality, Max};
use super::json_path;
use super::rule::{BindingStrength, FlagSet};
use super::urls;
use crate::errors::{CompileError, Result};

/// Type codes a binding can be attached to
const BINDABLE_TYPES: &[&str] = &[
    "code",
    "Coding",
    "CodeableConcept",
    "CodeableReference",
    "Quantity",
    "string",
    "uri",
];

/// One entry of an element's `type` list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementType {
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_profile: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ElementType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, url: impl Into<String>) -> Self {
        self.profile.push(url.into());
        self
    }

    pub fn with_target_profile(mut self, url: impl Into<String>) -> Self {
        self.target_profile.push(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slicing {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discriminator: Vec<Discriminator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,
    pub rules: String,
}

impl Slicing {
    /// The slicing every extension element uses: by `value:url`, unordered, open
    pub fn extension_default() -> Self {
        Self {
            discriminator: vec![Discriminator {
                kind: "value".to_string(),
                path: "url".to_string(),
            }],
            ordered: Some(false),
            rules: "open".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBinding {
    pub strength: BindingStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementConstraint {
    pub key: String,
    pub severity: String,
    pub human: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An extension instance attached to a definition or element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionMarker {
    pub url: String,
    #[serde(flatten)]
    pub value: Map<String, Value>,
}

impl ExtensionMarker {
    pub fn code(url: impl Into<String>, code: impl Into<String>) -> Self {
        let mut value = Map::new();
        value.insert("valueCode".to_string(), Value::String(code.into()));
        Self {
            url: url.into(),
            value,
        }
    }

    pub fn boolean(url: impl Into<String>, flag: bool) -> Self {
        let mut value = Map::new();
        value.insert("valueBoolean".to_string(), Value::Bool(flag));
        Self {
            url: url.into(),
            value,
        }
    }

    pub fn value_code(&self) -> Option<&str> {
        self.value.get("valueCode").and_then(Value::as_str)
    }
}

/// One node of a structure definition's element tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<ExtensionMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slicing: Option<Slicing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Max>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<ElementType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraint: Vec<ElementConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_support: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_modifier: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_summary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<ElementBinding>,
    /// Everything else, including `fixed[x]` and `pattern[x]`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ElementDefinition {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Current cardinality, defaulting an absent bound to `0..*`
    pub fn cardinality(&self) -> Cardinality {
        Cardinality::new(self.min.unwrap_or(0), self.max.unwrap_or(Max::Unbounded))
    }

    pub fn type_codes(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.code.as_str()).collect()
    }

    /// True for a choice element such as `value[x]`
    pub fn is_choice(&self) -> bool {
        self.path.ends_with("[x]")
    }

    /// True for an element typed only as Extension that is not itself a slice
    pub fn is_extension_slot(&self) -> bool {
        self.slice_name.is_none() && self.types.len() == 1 && self.types[0].code == "Extension"
    }

    /// The last segment of the path
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// Narrow the cardinality to the intersection with `min..max`
    ///
    /// # Errors
    ///
    /// Returns `InvalidCardinality` when the requested range is inverted and
    /// `ConflictingCardinality` when it is disjoint from the current range.
    pub fn constrain_cardinality(&mut self, min: Option<u32>, max: Option<Max>) -> Result<()> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if !hi.admits(lo) {
                return Err(CompileError::InvalidCardinality {
                    element_id: self.id.clone(),
                    min: lo,
                    max: hi.to_string(),
                });
            }
        }

        let current = self.cardinality();
        let narrowed =
            current
                .narrow(min, max)
                .ok_or_else(|| CompileError::ConflictingCardinality {
                    element_id: self.id.clone(),
                    current: current.to_string(),
                    requested: format!(
                        "{}..{}",
                        min.map_or_else(String::new, |m| m.to_string()),
                        max.map_or_else(String::new, |m| m.to_string())
                    ),
                })?;

        self.min = Some(narrowed.min);
        self.max = Some(narrowed.max);
        Ok(())
    }

    /// Set each flag present in `flags`
    pub fn apply_flags(&mut self, flags: &FlagSet) {
        if flags.must_support {
            self.must_support = Some(true);
        }
        if flags.summary {
            self.is_summary = Some(true);
        }
        if flags.modifier {
            self.is_modifier = Some(true);
        }
        let status = [
            (flags.trial_use, "trial-use"),
            (flags.normative, "normative"),
            (flags.draft, "draft"),
        ];
        for (_, code) in status.iter().filter(|(set, _)| *set) {
            self.extension.retain(|e| e.url != urls::STANDARDS_STATUS);
            self.extension
                .push(ExtensionMarker::code(urls::STANDARDS_STATUS, *code));
        }
    }

    /// Bind a value set with the given strength
    ///
    /// # Errors
    ///
    /// Returns `NonBindableElement` when no type can carry a binding, and
    /// `BindingStrengthWeakened` when an existing required or extensible
    /// binding would be relaxed.
    pub fn bind(&mut self, value_set: String, strength: BindingStrength) -> Result<()> {
        let bindable = self
            .types
            .iter()
            .any(|t| BINDABLE_TYPES.contains(&t.code.as_str()));
        if !bindable {
            return Err(CompileError::NonBindableElement {
                element_id: self.id.clone(),
            });
        }

        if let Some(existing) = &self.binding {
            let locked = matches!(
                existing.strength,
                BindingStrength::Required | BindingStrength::Extensible
            );
            if locked && strength.rank() < existing.strength.rank() {
                return Err(CompileError::BindingStrengthWeakened {
                    element_id: self.id.clone(),
                    current: existing.strength.to_string(),
                    requested: strength.to_string(),
                });
            }
        }

        let extra = self
            .binding
            .take()
            .map(|b| b.extra)
            .unwrap_or_default();
        self.binding = Some(ElementBinding {
            strength,
            value_set: Some(value_set),
            extra,
        });
        Ok(())
    }

    /// Attach an invariant
    ///
    /// # Errors
    ///
    /// Returns `DuplicateInvariantKey` if a constraint with the same key is
    /// already present.
    pub fn add_constraint(&mut self, constraint: ElementConstraint) -> Result<()> {
        if self.constraint.iter().any(|c| c.key == constraint.key) {
            return Err(CompileError::DuplicateInvariantKey {
                element_id: self.id.clone(),
                key: constraint.key,
            });
        }
        self.constraint.push(constraint);
        Ok(())
    }

    /// Existing `fixed[x]` or `pattern[x]` entry, if any
    pub fn assigned_value(&self) -> Option<(&str, &Value)> {
        self.extra
            .iter()
            .find(|(k, _)| is_assignment_key(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Record `value` as `fixed{Type}` (exactly) or `pattern{Type}`
    ///
    /// Re-assigning an identical value is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ValueAlreadyAssigned` if a different value is already present.
    pub fn assign_value(&mut self, type_code: &str, value: Value, exactly: bool) -> Result<()> {
        if let Some((_, existing)) = self.assigned_value() {
            if *existing == value {
                return Ok(());
            }
            return Err(CompileError::ValueAlreadyAssigned {
                element_id: self.id.clone(),
                existing: existing.to_string(),
                requested: value.to_string(),
            });
        }
        let key = format!(
            "{}{}",
            if exactly { "fixed" } else { "pattern" },
            upper_first(type_code)
        );
        self.extra.insert(key, value);
        Ok(())
    }

    /// Set an arbitrary property by caret path
    ///
    /// # Errors
    ///
    /// Returns `InvalidCaretPath` when the path cannot be written or the
    /// result is no longer a well-formed element.
    pub fn set_property(&mut self, caret_path: &str, value: Value) -> Result<()> {
        let invalid = |reason: String| CompileError::InvalidCaretPath {
            path: caret_path.to_string(),
            reason,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        json_path::set_at(&mut json, caret_path, value).map_err(invalid)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}

fn is_assignment_key(key: &str) -> bool {
    let rest = key
        .strip_prefix("fixed")
        .or_else(|| key.strip_prefix("pattern"));
    rest.is_some_and(|r| r.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
}

/// `codeableConcept` -> `CodeableConcept`
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
