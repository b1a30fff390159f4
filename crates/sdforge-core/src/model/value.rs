use serde::{Deserialize, Serialize};

/// A coded value as written in a rule (`system#code "display"`)
///
/// `system` is symbolic: it may name a declared code system, which is
/// replaced by its canonical url before the value is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FshCode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl FshCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            system: None,
            code: code.into(),
            display: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

impl std::fmt::Display for FshCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(system) = &self.system {
            write!(f, "{}", system)?;
        }
        write!(f, "#{}", self.code)?;
        if let Some(display) = &self.display {
            write!(f, " \"{}\"", display)?;
        }
        Ok(())
    }
}

/// A quantity with an optional UCUM-style unit code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FshQuantity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<FshCode>,
}

/// Right-hand side of an assignment or caret rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FshValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Code(FshCode),
    Quantity(FshQuantity),
    /// `Reference(name)`; the name is replaced with `ResourceType/id` when it names an instance
    Reference(String),
    /// `Canonical(name)`; the name is replaced with the definition's canonical url
    Canonical(String),
    /// The name of a declared instance, compiled on demand
    Instance(String),
}

impl FshValue {
    /// FHIR type codes a value of this shape can be assigned to, in preference order
    pub fn compatible_types(&self) -> &'static [&'static str] {
        match self {
            FshValue::Boolean(_) => &["boolean"],
            FshValue::Integer(_) => &[
                "integer",
                "positiveInt",
                "unsignedInt",
                "integer64",
                "decimal",
            ],
            FshValue::Decimal(_) => &["decimal"],
            FshValue::String(_) => &[
                "string",
                "markdown",
                "id",
                "uri",
                "url",
                "canonical",
                "oid",
                "uuid",
                "base64Binary",
                "date",
                "dateTime",
                "instant",
                "time",
                "xhtml",
            ],
            FshValue::Code(_) => &["code", "Coding", "CodeableConcept"],
            FshValue::Quantity(_) => &[
                "Quantity",
                "SimpleQuantity",
                "Age",
                "Count",
                "Distance",
                "Duration",
            ],
            FshValue::Reference(_) => &["Reference"],
            FshValue::Canonical(_) => &["canonical", "uri", "url"],
            FshValue::Instance(_) => &[],
        }
    }
}

impl std::fmt::Display for FshValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FshValue::Boolean(b) => write!(f, "{}", b),
            FshValue::Integer(i) => write!(f, "{}", i),
            FshValue::Decimal(d) => write!(f, "{}", d),
            FshValue::String(s) => write!(f, "\"{}\"", s),
            FshValue::Code(c) => write!(f, "{}", c),
            FshValue::Quantity(q) => match &q.unit {
                Some(unit) => write!(f, "{} '{}'", q.value, unit.code),
                None => write!(f, "{}", q.value),
            },
            FshValue::Reference(r) => write!(f, "Reference({})", r),
            FshValue::Canonical(c) => write!(f, "Canonical({})", c),
            FshValue::Instance(i) => write!(f, "{}", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        let code = FshCode::new("male")
            .with_system("http://hl7.org/fhir/administrative-gender")
            .with_display("Male");
        assert_eq!(
            code.to_string(),
            "http://hl7.org/fhir/administrative-gender#male \"Male\""
        );
    }

    #[test]
    fn test_value_serde_shape() {
        let value = FshValue::Code(FshCode::new("final"));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "code");
        assert_eq!(json["value"]["code"], "final");

        let back: FshValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_compatible_types() {
        assert!(FshValue::Boolean(true).compatible_types().contains(&"boolean"));
        assert!(FshValue::Code(FshCode::new("x"))
            .compatible_types()
            .contains(&"CodeableConcept"));
        assert!(FshValue::Instance("Bob".to_string())
            .compatible_types()
            .is_empty());
    }
}
