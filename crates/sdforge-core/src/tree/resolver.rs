//! Path resolution, on-demand unfolding and slice creation

use crate::errors::{CompileError, Result};
use crate::model::element::upper_first;
use crate::model::ElementDefinition;

use super::path::parse_path;
use super::{slice_prefix, ElementTree, TypeSource};

/// True if any part of `path` addresses a slice by numeric index
pub fn uses_numeric_index(path: &str) -> bool {
    parse_path(path).iter().any(|p| p.has_numeric_index())
}

/// Find the element a path refers to without modifying the tree
///
/// The empty path resolves to the root.
pub fn find_element(tree: &ElementTree, path: &str) -> Option<usize> {
    tree.root()?;
    let mut current = 0;
    for part in parse_path(path) {
        let (child, _) = child_of(tree, current, &part.base)?;
        current = select_slices(tree, child, &part.brackets)?;
    }
    Some(current)
}

/// Find the element a path refers to, unfolding children on demand
///
/// When a step cannot be resolved among the existing children, the
/// element's children are materialized from its type definition, from the
/// element it slices, or from its content reference, and the step is
/// retried. Unfolding happens on a scratch copy that is committed only if
/// the whole path resolves, so a failed lookup leaves the tree untouched.
pub fn resolve_element(
    tree: &mut ElementTree,
    path: &str,
    types: &dyn TypeSource,
) -> Option<usize> {
    if let Some(found) = find_element(tree, path) {
        return Some(found);
    }

    let mut scratch = tree.clone();
    let found = walk_unfolding(&mut scratch, path, types)?;
    *tree = scratch;
    Some(found)
}

fn walk_unfolding(tree: &mut ElementTree, path: &str, types: &dyn TypeSource) -> Option<usize> {
    tree.root()?;
    let mut current = 0;
    let mut implied_type: Option<String> = None;

    for part in parse_path(path) {
        let (child, implied) = match child_of(tree, current, &part.base) {
            Some(found) => found,
            None => {
                let current_id = tree.get(current)?.id.clone();
                if !unfold(tree, current, types, implied_type.as_deref()) {
                    return None;
                }
                let current = tree.index_of(&current_id)?;
                child_of(tree, current, &part.base)?
            }
        };
        implied_type = implied;
        current = select_slices(tree, child, &part.brackets)?;
    }
    Some(current)
}

/// Direct child of `parent` named `base`
///
/// A type-specific choice name such as `valueQuantity` resolves to an
/// existing type slice if there is one, otherwise to the choice element
/// itself; the implied type is returned alongside.
fn child_of(tree: &ElementTree, parent: usize, base: &str) -> Option<(usize, Option<String>)> {
    let parent_id = &tree.get(parent)?.id;
    if let Some(found) = tree.index_of(&format!("{}.{}", parent_id, base)) {
        return Some((found, None));
    }
    if base.ends_with("[x]") {
        return None;
    }

    for child in tree.children_of(parent) {
        let el = &tree.element[child];
        if !el.is_choice() {
            continue;
        }
        let stem = el.name().trim_end_matches("[x]");
        let Some(suffix) = base.strip_prefix(stem) else {
            continue;
        };
        if let Some(t) = el.types.iter().find(|t| upper_first(&t.code) == suffix) {
            let slice_id = format!("{}:{}", el.id, base);
            let target = tree.index_of(&slice_id).unwrap_or(child);
            return Some((target, Some(t.code.clone())));
        }
    }
    None
}

/// Apply bracketed slice selectors, in order
fn select_slices(tree: &ElementTree, index: usize, brackets: &[String]) -> Option<usize> {
    let mut current = index;
    for bracket in brackets {
        current = match bracket.parse::<usize>() {
            Ok(n) => *tree.slices_of(current).get(n)?,
            Err(_) => {
                let prefix = slice_prefix(tree.get(current)?);
                tree.index_of(&format!("{}{}", prefix, bracket))?
            }
        };
    }
    Some(current)
}

/// Materialize the children of the element at `index`
///
/// Returns false if the element already has children or no source for
/// them could be found.
fn unfold(
    tree: &mut ElementTree,
    index: usize,
    types: &dyn TypeSource,
    implied_type: Option<&str>,
) -> bool {
    if tree.has_children(index) {
        return false;
    }
    let Some(el) = tree.get(index).cloned() else {
        return false;
    };

    let children = if el.slice_name.is_some() {
        children_from_sliced_element(tree, &el, types, implied_type)
    } else if let Some(reference) = &el.content_reference {
        children_from_content_reference(tree, &el, reference)
    } else {
        children_from_type(&el, types, implied_type)
    };

    let Some(children) = children.filter(|c| !c.is_empty()) else {
        return false;
    };
    let Some(index) = tree.index_of(&el.id) else {
        return false;
    };
    tracing::debug!(element = %el.id, count = children.len(), "unfolded element children");
    tree.insert_at(index + 1, children);
    true
}

/// A slice takes its children from the element it slices
fn children_from_sliced_element(
    tree: &mut ElementTree,
    slice: &ElementDefinition,
    types: &dyn TypeSource,
    implied_type: Option<&str>,
) -> Option<Vec<ElementDefinition>> {
    let name = slice.slice_name.as_deref()?;
    let base_id = slice.id.strip_suffix(&format!(":{}", name))?.to_string();
    let base_index = tree.index_of(&base_id)?;
    if !tree.has_children(base_index) {
        // The sliced element may not have been unfolded yet
        if !unfold(tree, base_index, types, implied_type) {
            return children_from_type(slice, types, implied_type);
        }
    }
    let base_index = tree.index_of(&base_id)?;
    let prefix = format!("{}.", base_id);
    let children = (base_index + 1..tree.block_end(base_index))
        .map(|i| &tree.element[i])
        .filter(|child| child.id.starts_with(&prefix))
        .map(|child| {
            let mut copy = child.clone();
            copy.id = format!("{}{}", slice.id, &child.id[base_id.len()..]);
            copy
        })
        .collect();
    Some(children)
}

/// An element with a content reference reuses the children of the target
fn children_from_content_reference(
    tree: &ElementTree,
    el: &ElementDefinition,
    reference: &str,
) -> Option<Vec<ElementDefinition>> {
    let (_, target) = reference.rsplit_once('#')?;
    let target_index = tree.index_of(target)?;
    let target_el = tree.get(target_index)?;
    let id_prefix = format!("{}.", target_el.id);
    let children = (target_index + 1..tree.block_end(target_index))
        .map(|i| &tree.element[i])
        .filter(|child| child.id.starts_with(&id_prefix))
        .map(|child| {
            let mut copy = child.clone();
            copy.id = format!("{}{}", el.id, &child.id[target_el.id.len()..]);
            copy.path = format!("{}{}", el.path, &child.path[target_el.path.len()..]);
            copy
        })
        .collect();
    Some(children)
}

/// Children copied from the definition of the element's single type
fn children_from_type(
    el: &ElementDefinition,
    types: &dyn TypeSource,
    implied_type: Option<&str>,
) -> Option<Vec<ElementDefinition>> {
    let candidates: Vec<_> = match implied_type {
        Some(implied) if el.types.len() > 1 => {
            el.types.iter().filter(|t| t.code == implied).collect()
        }
        _ => el.types.iter().collect(),
    };
    let first = candidates.first()?;
    if candidates.iter().any(|t| t.code != first.code) {
        return None;
    }

    let definition = match first.profile.as_slice() {
        [profile] => types
            .structure_for(profile)
            .or_else(|| types.structure_for(&first.code)),
        _ => types.structure_for(&first.code),
    }?;

    let root = definition.snapshot.root()?;
    let (root_id, root_path) = (root.id.clone(), root.path.clone());
    let children = definition
        .snapshot
        .element
        .into_iter()
        .skip(1)
        .filter(|child| child.id.starts_with(&root_id) && child.path.starts_with(&root_path))
        .map(|mut child| {
            child.id = format!("{}{}", el.id, &child.id[root_id.len()..]);
            child.path = format!("{}{}", el.path, &child.path[root_path.len()..]);
            child
        })
        .collect();
    Some(children)
}

/// Create a named slice of the element at `index`
///
/// The slice copies the sliced element with minimum cardinality 0 and the
/// inherited maximum, and is placed after everything already in the sliced
/// element's block. Slicing an existing slice creates a reslice.
///
/// # Errors
///
/// Returns `DuplicateSlice` if a slice with that name already exists.
pub fn create_slice(tree: &mut ElementTree, index: usize, name: &str) -> Result<usize> {
    let base = tree.get(index).ok_or_else(|| CompileError::Internal {
        message: format!("no element at index {}", index),
    })?;

    let slice_id = format!("{}{}", slice_prefix(base), name);
    if tree.index_of(&slice_id).is_some() {
        return Err(CompileError::DuplicateSlice {
            element_id: base.id.clone(),
            slice_name: name.to_string(),
        });
    }

    let mut slice = base.clone();
    slice.slice_name = Some(match &base.slice_name {
        Some(parent_slice) => format!("{}/{}", parent_slice, name),
        None => name.to_string(),
    });
    slice.id = slice_id;
    slice.slicing = None;
    slice.min = Some(0);

    let at = tree.block_end(index);
    tree.insert_at(at, vec![slice]);
    Ok(at)
}
