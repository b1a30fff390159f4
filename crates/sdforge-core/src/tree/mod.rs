//! Element tree and path resolver
//!
//! A structure definition's elements live in a flat, ordered arena. The
//! hierarchy is implied by element ids: children follow their parent, and
//! slices follow the element they slice, each with its own children.
//! Insertion always keeps that order so a single forward scan recovers
//! any element's block.

pub mod path;
pub mod resolver;

use serde::{Deserialize, Serialize};

use crate::model::ElementDefinition;
use crate::model::StructureDefinition;

pub use path::{join_path, parse_path, render_path, PathPart};
pub use resolver::{create_slice, find_element, resolve_element, uses_numeric_index};

/// Looks up the definition of a type so its children can be unfolded
pub trait TypeSource {
    /// Definition for a type code or profile url, if one is available
    fn structure_for(&self, type_or_url: &str) -> Option<StructureDefinition>;
}

/// Ordered element arena; serialized as `{ "element": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementTree {
    #[serde(default)]
    pub element: Vec<ElementDefinition>,
}

impl ElementTree {
    pub fn new(element: Vec<ElementDefinition>) -> Self {
        Self { element }
    }

    pub fn root(&self) -> Option<&ElementDefinition> {
        self.element.first()
    }

    pub fn root_mut(&mut self) -> Option<&mut ElementDefinition> {
        self.element.first_mut()
    }

    pub fn len(&self) -> usize {
        self.element.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ElementDefinition> {
        self.element.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ElementDefinition> {
        self.element.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.element.iter()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.element.iter().position(|e| e.id == id)
    }

    pub fn by_id(&self, id: &str) -> Option<&ElementDefinition> {
        self.element.iter().find(|e| e.id == id)
    }

    pub fn by_id_mut(&mut self, id: &str) -> Option<&mut ElementDefinition> {
        self.element.iter_mut().find(|e| e.id == id)
    }

    /// True if the element at `index` has at least one child
    pub fn has_children(&self, index: usize) -> bool {
        match (self.element.get(index), self.element.get(index + 1)) {
            (Some(el), Some(next)) => is_descendant_id(&next.id, &el.id, '.'),
            _ => false,
        }
    }

    /// One past the last element of the block rooted at `index`
    ///
    /// The block holds the element's children, its slices and their
    /// children.
    pub fn block_end(&self, index: usize) -> usize {
        let Some(el) = self.element.get(index) else {
            return index;
        };
        let mut end = index + 1;
        while let Some(next) = self.element.get(end) {
            if ['.', ':', '/']
                .iter()
                .any(|sep| is_descendant_id(&next.id, &el.id, *sep))
            {
                end += 1;
            } else {
                break;
            }
        }
        end
    }

    /// Indices of the direct slices of the element at `index`, in declaration order
    ///
    /// For an element that is itself a slice these are its reslices.
    pub fn slices_of(&self, index: usize) -> Vec<usize> {
        let Some(el) = self.element.get(index) else {
            return Vec::new();
        };
        let prefix = slice_prefix(el);
        (index + 1..self.block_end(index))
            .filter(|&i| {
                self.element[i]
                    .id
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains(['.', ':', '/']))
            })
            .collect()
    }

    /// Indices of the direct children of the element at `index`
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        let Some(el) = self.element.get(index) else {
            return Vec::new();
        };
        let prefix = format!("{}.", el.id);
        (index + 1..self.block_end(index))
            .filter(|&i| {
                self.element[i]
                    .id
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('.') && !rest.contains(':'))
            })
            .collect()
    }

    /// Insert elements so they start at `index`
    pub fn insert_at(&mut self, index: usize, elements: Vec<ElementDefinition>) {
        let tail = self.element.split_off(index.min(self.element.len()));
        self.element.extend(elements);
        self.element.extend(tail);
    }

    /// Rewrite every id and path under a new root name
    ///
    /// Used when a definition gets its own type name.
    pub fn rebase(&mut self, new_root: &str) {
        let Some(old_root) = self.root().map(|r| r.path.clone()) else {
            return;
        };
        for el in &mut self.element {
            el.id = rebase_segment(&el.id, &old_root, new_root);
            el.path = rebase_segment(&el.path, &old_root, new_root);
        }
    }
}

/// Id prefix shared by the slices of `el` (`a:` for slices, `a:b/` for reslices)
pub(crate) fn slice_prefix(el: &ElementDefinition) -> String {
    if el.slice_name.is_some() {
        format!("{}/", el.id)
    } else {
        format!("{}:", el.id)
    }
}

fn is_descendant_id(candidate: &str, ancestor: &str, separator: char) -> bool {
    candidate
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with(separator))
}

fn rebase_segment(value: &str, old_root: &str, new_root: &str) -> String {
    match value.strip_prefix(old_root) {
        Some(rest) if rest.is_empty() || rest.starts_with('.') || rest.starts_with(':') => {
            format!("{}{}", new_root, rest)
        }
        _ => value.to_string(),
    }
}
