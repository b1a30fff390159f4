use sdforge_core_types::SourceLocation;
use serde::{Deserialize, Serialize};

use super::cardinality::Max;
use super::value::FshValue;

/// Binding strength, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    Example,
    Preferred,
    Extensible,
    #[default]
    Required,
}

impl BindingStrength {
    /// Strength rank; a higher rank is stricter
    pub fn rank(&self) -> u8 {
        match self {
            BindingStrength::Example => 0,
            BindingStrength::Preferred => 1,
            BindingStrength::Extensible => 2,
            BindingStrength::Required => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStrength::Example => "example",
            BindingStrength::Preferred => "preferred",
            BindingStrength::Extensible => "extensible",
            BindingStrength::Required => "required",
        }
    }
}

impl std::fmt::Display for BindingStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean element flags (`MS`, `SU`, `?!`, `TU`, `N`, `D`)
///
/// Each flag is independent; setting one never clears another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlagSet {
    pub must_support: bool,
    pub summary: bool,
    pub modifier: bool,
    pub trial_use: bool,
    pub normative: bool,
    pub draft: bool,
}

impl FlagSet {
    pub fn must_support() -> Self {
        Self {
            must_support: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One type named by an `only` rule or an element addition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    #[serde(rename = "type")]
    pub type_name: String,
    /// `Reference(X)`: constrains the targets of a Reference element
    #[serde(default)]
    pub is_reference: bool,
    /// `Canonical(X)`: constrains the targets of a canonical element
    #[serde(default)]
    pub is_canonical: bool,
}

impl TypeRef {
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            is_reference: false,
            is_canonical: false,
        }
    }

    pub fn reference(type_name: impl Into<String>) -> Self {
        Self {
            is_reference: true,
            ..Self::named(type_name)
        }
    }

    pub fn canonical(type_name: impl Into<String>) -> Self {
        Self {
            is_canonical: true,
            ..Self::named(type_name)
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_reference {
            write!(f, "Reference({})", self.type_name)
        } else if self.is_canonical {
            write!(f, "Canonical({})", self.type_name)
        } else {
            f.write_str(&self.type_name)
        }
    }
}

/// One `name [named type]` item of a contains rule
///
/// Without a type the item is an inline extension (on extension elements)
/// or a plain slice (anywhere else).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsItem {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl ContainsItem {
    pub fn slice(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
        }
    }

    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
        }
    }
}

/// A new element declared on a logical model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAddition {
    pub min: u32,
    pub max: Max,
    #[serde(default)]
    pub types: Vec<TypeRef>,
    /// `contentReference` target instead of types (`#Model.some.path`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,
    pub short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub flags: FlagSet,
}

/// What a rule does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RuleKind {
    /// `* path min..max`; either bound may be omitted
    #[serde(rename_all = "camelCase")]
    Cardinality { min: Option<u32>, max: Option<Max> },
    /// `* path = value (exactly)`
    Assignment {
        value: FshValue,
        #[serde(default)]
        exactly: bool,
    },
    /// `* path only A or B`
    Type { types: Vec<TypeRef> },
    /// `* path from ValueSet (strength)`
    #[serde(rename_all = "camelCase")]
    Binding {
        value_set: String,
        #[serde(default)]
        strength: BindingStrength,
    },
    /// `* path MS SU ...`
    Flag(FlagSet),
    /// `* path contains a and B named b`
    Contains { items: Vec<ContainsItem> },
    /// `* path obeys inv-1`
    Obeys { invariant: String },
    /// `* path ^caret.path = value`; an empty path targets the artifact itself
    #[serde(rename_all = "camelCase")]
    CaretValue { caret_path: String, value: FshValue },
    /// `* path min..max Type "short" "definition"`
    AddElement(ElementAddition),
}

/// A rule with its target path and source position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub path: String,
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub source: SourceLocation,
}

impl Rule {
    pub fn new(path: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            path: path.into(),
            kind,
            source: SourceLocation::default(),
        }
    }

    pub fn cardinality(path: impl Into<String>, min: Option<u32>, max: Option<Max>) -> Self {
        Self::new(path, RuleKind::Cardinality { min, max })
    }

    pub fn assignment(path: impl Into<String>, value: FshValue) -> Self {
        Self::new(
            path,
            RuleKind::Assignment {
                value,
                exactly: false,
            },
        )
    }

    pub fn only(path: impl Into<String>, types: Vec<TypeRef>) -> Self {
        Self::new(path, RuleKind::Type { types })
    }

    pub fn binding(
        path: impl Into<String>,
        value_set: impl Into<String>,
        strength: BindingStrength,
    ) -> Self {
        Self::new(
            path,
            RuleKind::Binding {
                value_set: value_set.into(),
                strength,
            },
        )
    }

    pub fn flags(path: impl Into<String>, flags: FlagSet) -> Self {
        Self::new(path, RuleKind::Flag(flags))
    }

    pub fn contains(path: impl Into<String>, items: Vec<ContainsItem>) -> Self {
        Self::new(path, RuleKind::Contains { items })
    }

    pub fn obeys(path: impl Into<String>, invariant: impl Into<String>) -> Self {
        Self::new(
            path,
            RuleKind::Obeys {
                invariant: invariant.into(),
            },
        )
    }

    pub fn caret(path: impl Into<String>, caret_path: impl Into<String>, value: FshValue) -> Self {
        Self::new(
            path,
            RuleKind::CaretValue {
                caret_path: caret_path.into(),
                value,
            },
        )
    }

    pub fn add_element(path: impl Into<String>, addition: ElementAddition) -> Self {
        Self::new(path, RuleKind::AddElement(addition))
    }

    /// Attach a source position
    pub fn at(mut self, source: SourceLocation) -> Self {
        self.source = source;
        self
    }

    pub fn is_caret(&self) -> bool {
        matches!(self.kind, RuleKind::CaretValue { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_strength_order() {
        assert!(BindingStrength::Required.rank() > BindingStrength::Extensible.rank());
        assert!(BindingStrength::Preferred.rank() > BindingStrength::Example.rank());
        assert_eq!(BindingStrength::default(), BindingStrength::Required);
    }

    #[test]
    fn test_rule_json_shape() {
        let json = serde_json::json!({
            "path": "name",
            "rule": "cardinality",
            "min": 1,
            "max": "1"
        });
        let rule: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(rule.path, "name");
        assert_eq!(
            rule.kind,
            RuleKind::Cardinality {
                min: Some(1),
                max: Some(Max::Bounded(1))
            }
        );
        assert!(rule.source.is_synthetic());
    }

    #[test]
    fn test_caret_rule_defaults_to_root_path() {
        let json = serde_json::json!({
            "rule": "caretValue",
            "caretPath": "status",
            "value": { "type": "code", "value": { "code": "active" } }
        });
        let rule: Rule = serde_json::from_value(json).unwrap();
        assert!(rule.path.is_empty());
        assert!(rule.is_caret());
    }

    #[test]
    fn test_type_ref_display() {
        assert_eq!(TypeRef::reference("Patient").to_string(), "Reference(Patient)");
        assert_eq!(TypeRef::named("string").to_string(), "string");
    }
}
