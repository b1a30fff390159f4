//! Extension shape inference
//!
//! An extension carries either a value or sub-extensions, never both. When
//! the rules of an extension only exercise one shape at some level, the
//! other slot at that level is closed with a synthesized `0..0` rule.

use std::collections::BTreeMap;

use sdforge_core_types::SourceLocation;

use crate::errors::CompileError;
use crate::model::{Max, Rule, RuleKind};
use crate::tree::path::{join_path, parse_path, render_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Value,
    SubExtension,
}

impl Shape {
    fn of(segment: &str) -> Option<Shape> {
        if segment == "extension" {
            return Some(Shape::SubExtension);
        }
        let rest = segment.strip_prefix("value")?;
        (rest == "[x]" || rest.starts_with(|c: char| c.is_ascii_uppercase()))
            .then_some(Shape::Value)
    }

    fn slot(&self) -> &'static str {
        match self {
            Shape::Value => "value[x]",
            Shape::SubExtension => "extension",
        }
    }
}

/// Evidence gathered for one extension level
#[derive(Debug, Default)]
struct Level {
    value_used: Option<SourceLocation>,
    extension_used: Option<SourceLocation>,
    value_closed: bool,
    extension_closed: bool,
}

impl Level {
    fn record(&mut self, shape: Shape, closes_slot: bool, source: &SourceLocation) {
        match (shape, closes_slot) {
            (Shape::Value, true) => self.value_closed = true,
            (Shape::SubExtension, true) => self.extension_closed = true,
            (Shape::Value, false) => {
                self.value_used.get_or_insert_with(|| source.clone());
            }
            (Shape::SubExtension, false) => {
                self.extension_used.get_or_insert_with(|| source.clone());
            }
        }
    }
}

/// Outcome of shape inference
#[derive(Debug, Default)]
pub struct ShapeInference {
    /// The rules to apply, with synthesized rules appended
    pub rules: Vec<Rule>,
    /// Levels that use both shapes, located at the first sub-extension rule
    pub contradictions: Vec<(CompileError, SourceLocation)>,
}

/// Infer the value-or-sub-extension shape of an extension from its rules
///
/// Caret rules say nothing about shape. A rule that sets a slot's maximum
/// to 0 closes that slot rather than using it.
pub fn infer_extension_shape(rules: &[Rule]) -> ShapeInference {
    let mut levels: BTreeMap<String, Level> = BTreeMap::new();

    for rule in rules.iter().filter(|r| !r.is_caret()) {
        let parts = parse_path(&rule.path);
        let zeroes_target = matches!(
            rule.kind,
            RuleKind::Cardinality {
                max: Some(Max::Bounded(0)),
                ..
            }
        );
        for (i, part) in parts.iter().enumerate() {
            let Some(shape) = Shape::of(&part.base) else {
                continue;
            };
            let is_target = i + 1 == parts.len();
            let closes_slot = is_target && zeroes_target && part.brackets.is_empty();
            if is_target && zeroes_target && !closes_slot {
                // closing a single slice is not evidence either way
                continue;
            }
            let owner = render_path(&parts[..i]);
            levels
                .entry(owner)
                .or_default()
                .record(shape, closes_slot, &rule.source);
        }
    }

    let mut inference = ShapeInference {
        rules: rules.to_vec(),
        contradictions: Vec::new(),
    };
    for (owner, level) in levels {
        let close = match (&level.value_used, &level.extension_used) {
            (Some(_), Some(at)) => {
                let path = if owner.is_empty() { "." } else { owner.as_str() };
                inference.contradictions.push((
                    CompileError::ExtensionValueAndSubExtension {
                        path: path.to_string(),
                    },
                    at.clone(),
                ));
                None
            }
            (Some(_), None) if !level.extension_closed => Some(Shape::SubExtension),
            (None, Some(_)) if !level.value_closed => Some(Shape::Value),
            _ => None,
        };
        if let Some(shape) = close {
            let path = join_path(&owner, shape.slot());
            tracing::debug!(path = %path, "closing unused extension slot");
            inference.rules.push(
                Rule::cardinality(path, Some(0), Some(Max::Bounded(0)))
                    .at(SourceLocation::synthetic()),
            );
        }
    }
    inference
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainsItem, FlagSet, FshValue};

    fn synthesized<'a>(rules: &[Rule], inference: &'a ShapeInference) -> Vec<&'a str> {
        inference.rules[rules.len()..]
            .iter()
            .map(|r| r.path.as_str())
            .collect()
    }

    #[test]
    fn test_sub_extensions_close_value() {
        let rules = vec![Rule::contains("extension", vec![ContainsItem::slice("a")])];
        let inference = infer_extension_shape(&rules);
        assert_eq!(synthesized(&rules, &inference), vec!["value[x]"]);
        assert!(inference.contradictions.is_empty());
    }

    #[test]
    fn test_value_closes_extension() {
        let rules = vec![Rule::assignment("valueString", FshValue::String("x".into()))];
        let inference = infer_extension_shape(&rules);
        assert_eq!(synthesized(&rules, &inference), vec!["extension"]);
    }

    #[test]
    fn test_nested_levels_are_independent() {
        let rules = vec![
            Rule::contains("extension", vec![ContainsItem::slice("a")]),
            Rule::flags("extension[a].value[x]", FlagSet::must_support()),
        ];
        let inference = infer_extension_shape(&rules);
        let mut paths = synthesized(&rules, &inference);
        paths.sort();
        assert_eq!(paths, vec!["extension[a].extension", "value[x]"]);
    }

    #[test]
    fn test_explicit_zero_is_respected() {
        let rules = vec![
            Rule::cardinality("value[x]", Some(0), Some(Max::Bounded(0))),
            Rule::contains("extension", vec![ContainsItem::slice("a")]),
        ];
        let inference = infer_extension_shape(&rules);
        assert!(synthesized(&rules, &inference).is_empty());
    }

    #[test]
    fn test_both_shapes_reported() {
        let rules = vec![
            Rule::contains("extension", vec![ContainsItem::slice("a")]),
            Rule::flags("value[x]", FlagSet::must_support()),
        ];
        let inference = infer_extension_shape(&rules);
        assert_eq!(inference.contradictions.len(), 1);
        assert!(synthesized(&rules, &inference).is_empty());
    }

    #[test]
    fn test_caret_rules_ignored() {
        let rules = vec![Rule::caret(
            "extension",
            "short",
            FshValue::String("x".into()),
        )];
        let inference = infer_extension_shape(&rules);
        assert!(synthesized(&rules, &inference).is_empty());
    }
}
