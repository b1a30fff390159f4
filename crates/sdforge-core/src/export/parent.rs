//! Parent declaration checks
//!
//! Everything here is fatal for the entity being compiled.

use crate::errors::{CompileError, Result};
use crate::model::{Entity, EntityKind, StructureDefinition, StructureKind};

/// Types a logical model may specialize besides other logical models
const LOGICAL_BASES: &[&str] = &["Base", "Element"];
/// Types a custom resource may specialize
const RESOURCE_BASES: &[&str] = &["Resource", "DomainResource"];

/// The parent an entity derives from, after self-reference checks
///
/// # Errors
///
/// Returns `ParentNotProvided` for a profile without a parent, and
/// `ParentDeclaredAsName` / `ParentDeclaredAsId` when the entity names
/// itself.
pub fn declared_parent(entity: &Entity) -> Result<String> {
    let parent = match (&entity.parent, entity.kind.default_parent()) {
        (Some(parent), _) => parent.clone(),
        (None, Some(default)) => default.to_string(),
        (None, None) => {
            return Err(CompileError::ParentNotProvided {
                name: entity.name.clone(),
            })
        }
    };

    if parent == entity.name {
        return Err(CompileError::ParentDeclaredAsName {
            name: entity.name.clone(),
        });
    }
    if parent == entity.id {
        return Err(CompileError::ParentDeclaredAsId {
            name: entity.name.clone(),
            id: entity.id.clone(),
        });
    }
    Ok(parent)
}

/// Check that the resolved parent fits the kind of the entity
///
/// # Errors
///
/// Returns the kind-specific invalid-parent error.
pub fn check_parent_kind(entity: &Entity, parent: &StructureDefinition) -> Result<()> {
    let parent_name = || {
        if parent.name.is_empty() {
            parent.id.clone()
        } else {
            parent.name.clone()
        }
    };

    match entity.kind {
        EntityKind::Extension if parent.sd_type != "Extension" => {
            Err(CompileError::InvalidExtensionParent {
                name: entity.name.clone(),
                parent: parent_name(),
                parent_type: parent.sd_type.clone(),
            })
        }
        EntityKind::Profile if parent.kind == StructureKind::Logical => {
            Err(CompileError::InvalidProfileParent {
                name: entity.name.clone(),
                parent: parent_name(),
            })
        }
        EntityKind::Logical
            if parent.kind != StructureKind::Logical
                && !LOGICAL_BASES.contains(&parent.sd_type.as_str()) =>
        {
            Err(CompileError::InvalidLogicalParent {
                name: entity.name.clone(),
                parent: parent_name(),
            })
        }
        EntityKind::Resource if !RESOURCE_BASES.contains(&parent.sd_type.as_str()) => {
            Err(CompileError::InvalidResourceParent {
                name: entity.name.clone(),
                parent: parent_name(),
            })
        }
        _ => Ok(()),
    }
}
