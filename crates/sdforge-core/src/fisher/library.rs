//! External definition library

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use super::{classify_raw, split_version, FishKind, Fishable, Metadata};
use crate::errors::{CompileError, Result};

/// Read-only source of externally published definitions (core FHIR types,
/// resources and dependency packages)
///
/// Definitions are returned raw; their shape is assumed, not validated.
pub trait DefinitionLibrary {
    /// Every definition whose id, name or canonical url equals `key`
    fn lookup(&self, key: &str) -> Vec<&Value>;
}

/// In-memory definition library indexed by id, name and url
#[derive(Debug, Clone, Default)]
pub struct FhirDefinitions {
    definitions: Vec<Value>,
    index: HashMap<String, Vec<usize>>,
}

impl FhirDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one raw definition
    pub fn add(&mut self, definition: Value) {
        let position = self.definitions.len();
        let mut keys: Vec<String> = ["id", "name", "url"]
            .iter()
            .filter_map(|k| definition.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        keys.dedup();
        for key in keys {
            self.index.entry(key).or_default().push(position);
        }
        self.definitions.push(definition);
    }

    pub fn with(mut self, definition: Value) -> Self {
        self.add(definition);
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Load every `*.json` file in a directory
    ///
    /// A file holding a Bundle contributes each of its entries. Files are
    /// read in name order so lookups are deterministic.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory or a file cannot be read, and
    /// `Serialization` if a file is not valid JSON.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let io_error = |path: &Path, e: std::io::Error| CompileError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        let mut files: Vec<_> = fs::read_dir(dir)
            .map_err(|e| io_error(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let before = self.len();
        for file in files {
            let content = fs::read_to_string(&file).map_err(|e| io_error(&file, e))?;
            let value: Value =
                serde_json::from_str(&content).map_err(|e| CompileError::Serialization {
                    message: format!("{}: {}", file.display(), e),
                })?;
            self.add_document(value);
        }
        tracing::debug!(dir = %dir.display(), count = self.len() - before, "loaded definitions");
        Ok(self.len() - before)
    }

    fn add_document(&mut self, value: Value) {
        if value.get("resourceType").and_then(Value::as_str) == Some("Bundle") {
            let resources: Vec<Value> = value
                .get("entry")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|e| e.get("resource").cloned())
                        .collect()
                })
                .unwrap_or_default();
            for resource in resources {
                self.add(resource);
            }
        } else {
            self.add(value);
        }
    }
}

impl DefinitionLibrary for FhirDefinitions {
    fn lookup(&self, key: &str) -> Vec<&Value> {
        self.index
            .get(key)
            .map(|positions| positions.iter().map(|&i| &self.definitions[i]).collect())
            .unwrap_or_default()
    }
}

/// Fishing adapter over a definition library
pub struct LibraryFisher<'a> {
    library: &'a dyn DefinitionLibrary,
}

impl<'a> LibraryFisher<'a> {
    pub fn new(library: &'a dyn DefinitionLibrary) -> Self {
        Self { library }
    }

    /// Raw definition for `item`, trying `kinds` in order
    pub fn fish_raw(&self, item: &str, kinds: &[FishKind]) -> Option<(&'a Value, FishKind)> {
        let (base, version) = split_version(item);
        let candidates: Vec<(&'a Value, FishKind)> = self
            .library
            .lookup(base)
            .into_iter()
            .filter(|raw| {
                version.map_or(true, |v| {
                    raw.get("version").and_then(Value::as_str) == Some(v)
                })
            })
            .filter_map(|raw| classify_raw(raw).map(|kind| (raw, kind)))
            .collect();

        kinds
            .iter()
            .find_map(|kind| candidates.iter().find(|(_, k)| k == kind).copied())
    }
}

impl Fishable for LibraryFisher<'_> {
    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        self.fish_raw(item, kinds)
            .map(|(raw, kind)| Metadata::from_raw(raw, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library() -> FhirDefinitions {
        FhirDefinitions::new()
            .with(json!({
                "resourceType": "StructureDefinition", "id": "Patient", "name": "Patient",
                "url": "http://hl7.org/fhir/StructureDefinition/Patient",
                "kind": "resource", "type": "Patient", "derivation": "specialization"
            }))
            .with(json!({
                "resourceType": "ValueSet", "id": "administrative-gender",
                "name": "AdministrativeGender", "version": "4.0.1",
                "url": "http://hl7.org/fhir/ValueSet/administrative-gender"
            }))
    }

    #[test]
    fn test_lookup_by_every_key() {
        let lib = library();
        assert_eq!(lib.lookup("Patient").len(), 1);
        assert_eq!(
            lib.lookup("http://hl7.org/fhir/StructureDefinition/Patient").len(),
            1
        );
        assert_eq!(lib.lookup("AdministrativeGender").len(), 1);
        assert!(lib.lookup("Nope").is_empty());
    }

    #[test]
    fn test_fish_respects_kinds_and_versions() {
        let lib = library();
        let fisher = LibraryFisher::new(&lib);

        assert!(fisher
            .fish_for_metadata("Patient", &[FishKind::Resource])
            .is_some());
        assert!(fisher
            .fish_for_metadata("Patient", &[FishKind::Profile])
            .is_none());

        let vs = fisher
            .fish_for_metadata("AdministrativeGender|4.0.1", &[FishKind::ValueSet])
            .unwrap();
        assert_eq!(
            vs.url.as_deref(),
            Some("http://hl7.org/fhir/ValueSet/administrative-gender")
        );
        assert!(fisher
            .fish_for_metadata("AdministrativeGender|5.0.0", &[FishKind::ValueSet])
            .is_none());
    }
}
