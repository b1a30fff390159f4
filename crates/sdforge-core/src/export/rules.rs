//! Rule application
//!
//! Every rule error is returned to the caller, which reports it and moves
//! on to the next rule.

use serde_json::{Map, Value};

use super::values;
use super::{DeferredRule, StructureDefinitionExporter};
use crate::errors::{CompileError, Result};
use crate::fisher::{ArtifactRef, FishKind, Fishable, MasterFisher};
use crate::model::{
    Derivation, ElementAddition, ElementConstraint, ElementDefinition, ElementType, Entity,
    EntityKind, FshValue, Rule, RuleKind, StructureDefinition, TypeRef, UsageContext,
};
use crate::tree::path::{parse_path, render_path};
use crate::tree::{find_element, resolve_element, uses_numeric_index};

/// Element types that accept an instance of any resource
const ANY_RESOURCE: &[&str] = &["Resource", "DomainResource"];

/// `[A-Za-z0-9\-.]{1,64}`
fn is_fhir_id(candidate: &str) -> bool {
    (1..=64).contains(&candidate.len())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

pub(super) fn element_mut(
    sd: &mut StructureDefinition,
    index: usize,
) -> Result<&mut ElementDefinition> {
    sd.snapshot
        .get_mut(index)
        .ok_or_else(|| CompileError::Internal {
            message: format!("element {} vanished from {}", index, sd.id),
        })
}

fn element_at(sd: &StructureDefinition, index: usize) -> Result<&ElementDefinition> {
    sd.snapshot.get(index).ok_or_else(|| CompileError::Internal {
        message: format!("element {} vanished from {}", index, sd.id),
    })
}

impl<'a> StructureDefinitionExporter<'a> {
    /// Resolve a rule path, unfolding inherited children as needed
    pub(super) fn resolve(&self, sd: &mut StructureDefinition, path: &str) -> Option<usize> {
        let fisher = self.fisher();
        resolve_element(&mut sd.snapshot, path, &fisher)
    }

    pub(super) fn apply_rule(
        &mut self,
        sd: &mut StructureDefinition,
        entity: &'a Entity,
        artifact: ArtifactRef,
        rule: &Rule,
    ) -> Result<()> {
        if self.config.require_named_slices && uses_numeric_index(&rule.path) {
            return Err(CompileError::NumericSliceIndex {
                path: rule.path.clone(),
            });
        }
        if rule.is_caret() {
            return self.apply_caret(sd, artifact, &entity.name, rule);
        }

        let index = self
            .resolve(sd, &rule.path)
            .ok_or_else(|| CompileError::ElementNotFound {
                entity: entity.name.clone(),
                path: rule.path.clone(),
            })?;

        match &rule.kind {
            RuleKind::Cardinality { min, max } => {
                element_mut(sd, index)?.constrain_cardinality(*min, *max)
            }
            RuleKind::Flag(flags) => {
                element_mut(sd, index)?.apply_flags(flags);
                Ok(())
            }
            RuleKind::Binding {
                value_set,
                strength,
            } => {
                let url = self
                    .fish_for_metadata(value_set, &[FishKind::ValueSet])
                    .and_then(|m| m.url)
                    .unwrap_or_else(|| value_set.clone());
                element_mut(sd, index)?.bind(url, *strength)
            }
            RuleKind::Obeys { invariant } => self.apply_obeys(sd, index, invariant),
            RuleKind::Type { types } => self.apply_only(sd, index, types),
            RuleKind::Assignment { value, exactly } => {
                self.apply_assignment(sd, index, value, *exactly)
            }
            RuleKind::Contains { items } => {
                self.apply_contains(sd, entity, rule, index, items);
                Ok(())
            }
            // applied before any other rule
            RuleKind::AddElement(_) => Ok(()),
            RuleKind::CaretValue { .. } => Ok(()),
        }
    }

    /// Set a property on the artifact (empty path) or on an element
    ///
    /// An instance value that cannot be built yet is deferred on the first
    /// pass and is an error on the retry.
    pub(super) fn apply_caret(
        &mut self,
        sd: &mut StructureDefinition,
        artifact: ArtifactRef,
        entity_name: &str,
        rule: &Rule,
    ) -> Result<()> {
        let RuleKind::CaretValue { caret_path, value } = &rule.kind else {
            return Ok(());
        };

        let json = match value {
            FshValue::Instance(name) => match self.instance_json(name) {
                Some(json) => json,
                None if !self.retrying && self.tank.instance(name).is_some() => {
                    self.deferred.push(DeferredRule {
                        artifact,
                        entity: entity_name.to_string(),
                        rule: rule.clone(),
                        unresolved: name.clone(),
                    });
                    return Ok(());
                }
                None => {
                    return Err(CompileError::InstanceNotFound {
                        name: name.clone(),
                        expected_type: None,
                    })
                }
            },
            other => values::plain_json(&self.fisher(), other)?,
        };

        if rule.path.is_empty() {
            return sd.set_property(caret_path, json);
        }
        let index = self
            .resolve(sd, &rule.path)
            .ok_or_else(|| CompileError::ElementNotFound {
                entity: entity_name.to_string(),
                path: rule.path.clone(),
            })?;
        element_mut(sd, index)?.set_property(caret_path, json)
    }

    /// JSON of a declared instance, compiling its definition first
    fn instance_json(&mut self, name: &str) -> Option<Value> {
        let tank = self.tank;
        let instance = tank.instance(name)?;
        self.fish_for_fhir(&instance.instance_of, FishKind::STRUCTURES);
        let fisher = MasterFisher::new(self.tank, &self.package, self.library, self.config);
        self.instances.export_instance(instance, &fisher)
    }

    fn apply_assignment(
        &mut self,
        sd: &mut StructureDefinition,
        index: usize,
        value: &FshValue,
        exactly: bool,
    ) -> Result<()> {
        let (type_code, json) = match value {
            FshValue::Instance(name) => {
                let element = element_at(sd, index)?.clone();
                self.instance_assignment(&element, name)?
            }
            other => values::typed_json(&self.fisher(), other, element_at(sd, index)?)?,
        };
        element_mut(sd, index)?.assign_value(&type_code, json, exactly)
    }

    fn instance_assignment(
        &mut self,
        element: &ElementDefinition,
        name: &str,
    ) -> Result<(String, Value)> {
        let not_found = || CompileError::InstanceNotFound {
            name: name.to_string(),
            expected_type: match element.types.as_slice() {
                [only] => Some(only.code.clone()),
                _ => None,
            },
        };
        let tank = self.tank;
        let instance = tank.instance(name).ok_or_else(not_found)?;
        let json = self.instance_json(name).ok_or_else(not_found)?;

        let instance_type = self
            .fish_for_metadata(&instance.instance_of, FishKind::STRUCTURES)
            .and_then(|m| m.sd_type)
            .unwrap_or_else(|| instance.instance_of.clone());
        let is_resource = json.get("resourceType").is_some();
        let type_code = element
            .types
            .iter()
            .map(|t| t.code.as_str())
            .find(|code| *code == instance_type || (is_resource && ANY_RESOURCE.contains(code)))
            .ok_or_else(|| CompileError::MismatchedValueType {
                element_id: element.id.clone(),
                value: name.to_string(),
                types: element.type_codes().join(", "),
            })?;
        Ok((type_code.to_string(), json))
    }

    fn apply_obeys(
        &mut self,
        sd: &mut StructureDefinition,
        index: usize,
        invariant_name: &str,
    ) -> Result<()> {
        let target = element_at(sd, index)?.id.clone();
        let invariant =
            self.tank
                .invariant(invariant_name)
                .ok_or_else(|| CompileError::InvariantNotFound {
                    invariant: invariant_name.to_string(),
                    target,
                })?;
        if !is_fhir_id(&invariant.name) {
            return Err(CompileError::InvalidFhirId {
                id: invariant.name.clone(),
            });
        }

        let constraint = ElementConstraint {
            key: invariant.name.clone(),
            severity: invariant.severity.clone(),
            human: invariant.description.clone(),
            expression: invariant.expression.clone(),
            xpath: invariant.xpath.clone(),
            source: Some(sd.url.clone()),
            extra: Map::new(),
        };
        element_mut(sd, index)?.add_constraint(constraint)
    }

    /// Narrow the element's types to those named
    ///
    /// Reference and canonical types narrow their target profiles; naming
    /// a profile narrows the profile list of its base type.
    fn apply_only(
        &mut self,
        sd: &mut StructureDefinition,
        index: usize,
        types: &[TypeRef],
    ) -> Result<()> {
        let element = element_at(sd, index)?.clone();
        let mismatch = |type_ref: &TypeRef| CompileError::InvalidTypeConstraint {
            element_id: element.id.clone(),
            type_name: type_ref.to_string(),
            allowed: element.type_codes().join(", "),
        };

        let mut narrowed: Vec<ElementType> = Vec::new();
        for type_ref in types {
            let meta = self
                .fish_for_metadata(&type_ref.type_name, FishKind::STRUCTURES)
                .ok_or_else(|| CompileError::TypeNotFound {
                    type_name: type_ref.type_name.clone(),
                })?;
            let url = meta.url.clone().unwrap_or_else(|| type_ref.type_name.clone());

            let (code, target, profile) = if type_ref.is_reference || type_ref.is_canonical {
                let code = if type_ref.is_reference { "Reference" } else { "canonical" };
                (code.to_string(), Some(url), None)
            } else if meta.derivation == Some(Derivation::Constraint) {
                let base = meta.sd_type.clone().unwrap_or_else(|| meta.id.clone());
                (base, None, Some(url))
            } else if meta.kind == Some(FishKind::Logical) {
                (url, None, None)
            } else {
                (meta.sd_type.clone().unwrap_or(meta.id.clone()), None, None)
            };

            let existing = element
                .types
                .iter()
                .find(|t| t.code == code)
                .ok_or_else(|| mismatch(type_ref))?;
            let slot = match narrowed.iter().position(|t| t.code == code) {
                Some(i) => i,
                None => {
                    let mut fresh = existing.clone();
                    if target.is_some() {
                        fresh.target_profile.clear();
                    }
                    if profile.is_some() {
                        fresh.profile.clear();
                    }
                    narrowed.push(fresh);
                    narrowed.len() - 1
                }
            };
            if let Some(target) = target {
                if !narrowed[slot].target_profile.contains(&target) {
                    narrowed[slot].target_profile.push(target);
                }
            }
            if let Some(profile) = profile {
                if !narrowed[slot].profile.contains(&profile) {
                    narrowed[slot].profile.push(profile);
                }
            }
        }

        element_mut(sd, index)?.types = narrowed;
        Ok(())
    }

    /// Add a new element to a logical model or resource
    pub(super) fn apply_addition(
        &mut self,
        sd: &mut StructureDefinition,
        entity: &Entity,
        rule: &Rule,
    ) -> Result<()> {
        let RuleKind::AddElement(addition) = &rule.kind else {
            return Ok(());
        };
        if !matches!(entity.kind, EntityKind::Logical | EntityKind::Resource) {
            return Err(CompileError::ElementAdditionNotAllowed {
                entity: entity.name.clone(),
                path: rule.path.clone(),
            });
        }

        let parts = parse_path(&rule.path);
        let Some((last, ancestors)) = parts.split_last() else {
            return Err(CompileError::ElementNotFound {
                entity: entity.name.clone(),
                path: rule.path.clone(),
            });
        };
        let parent_path = render_path(ancestors);
        let parent_index = find_element(&sd.snapshot, &parent_path).ok_or_else(|| {
            CompileError::MissingParentElement {
                path: rule.path.clone(),
                parent: parent_path.clone(),
            }
        })?;
        let parent = element_at(sd, parent_index)?;
        let id = format!("{}.{}", parent.id, last.base);
        let path = format!("{}.{}", parent.path, last.base);
        if sd.snapshot.index_of(&id).is_some() {
            return Err(CompileError::DuplicateElement {
                path: rule.path.clone(),
            });
        }

        let element = self.new_element(id, path, addition)?;
        let at = sd.snapshot.block_end(parent_index);
        sd.snapshot.insert_at(at, vec![element]);
        Ok(())
    }

    fn new_element(
        &self,
        id: String,
        path: String,
        addition: &ElementAddition,
    ) -> Result<ElementDefinition> {
        let mut element = ElementDefinition::new(id, path);
        element.min = Some(addition.min);
        element.max = Some(addition.max);
        element.short = Some(addition.short.clone());
        element.definition = Some(
            addition
                .definition
                .clone()
                .unwrap_or_else(|| addition.short.clone()),
        );
        element.content_reference = addition.content_reference.as_ref().map(|r| {
            if r.starts_with('#') || r.contains("://") {
                r.clone()
            } else {
                format!("#{}", r)
            }
        });
        element.types = addition
            .types
            .iter()
            .map(|t| self.element_type_for(t))
            .collect::<Result<Vec<_>>>()?;
        element.apply_flags(&addition.flags);
        Ok(element)
    }

    fn element_type_for(&self, type_ref: &TypeRef) -> Result<ElementType> {
        let meta = self
            .fish_for_metadata(&type_ref.type_name, FishKind::STRUCTURES)
            .ok_or_else(|| CompileError::TypeNotFound {
                type_name: type_ref.type_name.clone(),
            })?;
        let url = meta.url.clone().unwrap_or_else(|| type_ref.type_name.clone());

        Ok(if type_ref.is_reference {
            ElementType::new("Reference").with_target_profile(url)
        } else if type_ref.is_canonical {
            ElementType::new("canonical").with_target_profile(url)
        } else if meta.derivation == Some(Derivation::Constraint) {
            ElementType::new(meta.sd_type.unwrap_or(meta.id)).with_profile(url)
        } else if meta.kind == Some(FishKind::Logical) {
            ElementType::new(url)
        } else {
            ElementType::new(meta.sd_type.unwrap_or(meta.id))
        })
    }

    /// Usage contexts declared by an extension, or the unrestricted default
    pub(super) fn extension_contexts(&self, entity: &Entity) -> Vec<UsageContext> {
        if entity.contexts.is_empty() {
            return vec![UsageContext::new("element", "Element")];
        }
        let fisher = self.fisher();
        entity
            .contexts
            .iter()
            .map(|context| {
                if context.is_quoted {
                    return UsageContext::new("fhirpath", context.value.as_str());
                }
                if let Some(url) = fisher
                    .fish_for_metadata(&context.value, &[FishKind::Extension])
                    .and_then(|m| m.url)
                {
                    return UsageContext::new("extension", url);
                }
                let (head, rest) = match context.value.split_once('.') {
                    Some((head, rest)) => (head, Some(rest)),
                    None => (context.value.as_str(), None),
                };
                let head = fisher
                    .fish_for_metadata(head, FishKind::STRUCTURES)
                    .and_then(|m| m.sd_type)
                    .unwrap_or_else(|| head.to_string());
                let expression = match rest {
                    Some(rest) => format!("{}.{}", head, rest),
                    None => head,
                };
                UsageContext::new("element", expression)
            })
            .collect()
    }
}
