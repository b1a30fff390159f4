//! Slice declarations (`contains` rules)
//!
//! Each item is applied on its own: a failing item is reported and the
//! remaining items of the rule still apply.

use serde_json::Value;

use super::rules::element_mut;
use super::StructureDefinitionExporter;
use crate::errors::{CompileError, Result};
use crate::fisher::FishKind;
use crate::model::{ContainsItem, ElementType, Entity, EntityKind, Rule, Slicing, StructureDefinition};
use crate::tree::path::join_path;
use crate::tree::{create_slice, slice_prefix};

impl<'a> StructureDefinitionExporter<'a> {
    pub(super) fn apply_contains(
        &mut self,
        sd: &mut StructureDefinition,
        entity: &'a Entity,
        rule: &Rule,
        index: usize,
        items: &[ContainsItem],
    ) {
        let Some(element) = sd.snapshot.get(index) else {
            return;
        };
        let element_id = element.id.clone();

        if !element.is_extension_slot() {
            for item in items {
                let result = match &item.type_name {
                    Some(type_name) => Err(CompileError::InvalidSliceType {
                        element_id: element_id.clone(),
                        slice_name: item.name.clone(),
                        type_name: type_name.clone(),
                    }),
                    None => create_slice(&mut sd.snapshot, index, &item.name).map(|_| ()),
                };
                if let Err(e) = result {
                    self.report(e, &rule.source, entity);
                }
            }
            return;
        }

        if let Some(slot) = sd.snapshot.get_mut(index) {
            if slot.slicing.is_none() {
                slot.slicing = Some(Slicing::extension_default());
            }
        }
        for item in items {
            let result = match &item.type_name {
                Some(extension) => {
                    self.add_extension_slice(sd, entity, rule, index, &item.name, extension)
                }
                None => self.add_inline_extension(sd, entity, rule, index, &item.name),
            };
            if let Err(e) = result {
                self.report(e, &rule.source, entity);
            }
        }
    }

    /// Slice an extension slot for a separately defined extension
    ///
    /// Re-declaring a slice for the same extension only warns.
    fn add_extension_slice(
        &mut self,
        sd: &mut StructureDefinition,
        entity: &Entity,
        rule: &Rule,
        index: usize,
        slice_name: &str,
        extension: &str,
    ) -> Result<()> {
        let url = self
            .fish_for_fhir(extension, &[FishKind::Extension])
            .map(|ext| ext.url)
            .ok_or_else(|| CompileError::ExtensionNotFound {
                slice_name: slice_name.to_string(),
                extension: extension.to_string(),
            })?;

        match create_slice(&mut sd.snapshot, index, slice_name) {
            Ok(slice) => {
                element_mut(sd, slice)?.types = vec![ElementType::new("Extension").with_profile(url)];
                Ok(())
            }
            Err(err @ CompileError::DuplicateSlice { .. }) => {
                let existing_id = sd
                    .snapshot
                    .get(index)
                    .map(|slot| format!("{}{}", slice_prefix(slot), slice_name));
                let same_extension = existing_id
                    .and_then(|id| sd.snapshot.by_id(&id))
                    .is_some_and(|slice| {
                        slice
                            .types
                            .iter()
                            .any(|t| t.code == "Extension" && t.profile == [url.clone()])
                    });
                if !same_extension {
                    return Err(err);
                }
                let location = if rule.source.is_synthetic() {
                    &entity.source
                } else {
                    &rule.source
                };
                self.diagnostics.downgraded(err, Some(location));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Slice an extension slot for an extension defined in place
    ///
    /// The slice's `url` is fixed to the slice name. Only an extension can
    /// define inline extensions; elsewhere the slice is still created but
    /// the rule is reported.
    fn add_inline_extension(
        &mut self,
        sd: &mut StructureDefinition,
        entity: &Entity,
        rule: &Rule,
        index: usize,
        slice_name: &str,
    ) -> Result<()> {
        let slot_id = sd
            .snapshot
            .get(index)
            .map(|slot| slot.id.clone())
            .unwrap_or_default();
        create_slice(&mut sd.snapshot, index, slice_name)?;

        let url_path = join_path(&format!("{}[{}]", rule.path, slice_name), "url");
        match self.resolve(sd, &url_path) {
            Some(url_index) => {
                element_mut(sd, url_index)?
                    .extra
                    .insert("fixedUri".to_string(), Value::String(slice_name.to_string()));
            }
            None => tracing::debug!(path = %url_path, "inline extension has no url element"),
        }

        if entity.kind != EntityKind::Extension {
            return Err(CompileError::InlineExtensionOutsideExtension {
                entity: entity.name.clone(),
                element_id: slot_id,
                slice_name: slice_name.to_string(),
            });
        }
        Ok(())
    }
}
