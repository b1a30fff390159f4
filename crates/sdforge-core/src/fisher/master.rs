use super::{FishKind, Fishable, LibraryFisher, Metadata, Package, TankFisher};
use crate::config::ExporterConfig;
use crate::model::{StructureDefinition, Tank};
use crate::tree::TypeSource;

/// Bound on parent hops when filling in a profile's type from its parents
const MAX_PARENT_HOPS: usize = 16;

/// Read-only resolver over tank, package and library
///
/// Kinds are tried in order; for each kind the sources are tried in
/// that order.
///
/// Full artifacts are only served from the package and the library: a tank
/// entity must be compiled (by the exporter) before it has a definition.
pub struct MasterFisher<'a> {
    tank: TankFisher<'a>,
    package: &'a Package,
    library: LibraryFisher<'a>,
}

impl<'a> MasterFisher<'a> {
    pub fn new(
        tank: &'a Tank,
        package: &'a Package,
        library: &'a dyn super::DefinitionLibrary,
        config: &'a ExporterConfig,
    ) -> Self {
        Self {
            tank: TankFisher::new(tank, config),
            package,
            library: LibraryFisher::new(library),
        }
    }

    pub fn tank(&self) -> &TankFisher<'a> {
        &self.tank
    }

    /// Published or library definition for `item`
    pub fn fish_for_fhir(&self, item: &str, kinds: &[FishKind]) -> Option<StructureDefinition> {
        FishKind::or_all(kinds)
            .iter()
            .find_map(|kind| self.fish_for_fhir_of_kind(item, *kind))
    }

    fn fish_for_fhir_of_kind(&self, item: &str, kind: FishKind) -> Option<StructureDefinition> {
        let kinds = std::slice::from_ref(&kind);
        if let Some(sd) = self.package.find(item, kinds) {
            return Some(sd.clone());
        }
        let (raw, _) = self.library.fish_raw(item, kinds)?;
        match StructureDefinition::from_json(raw) {
            Ok(sd) => Some(sd),
            Err(e) => {
                tracing::debug!(item, error = %e, "library definition has an unexpected shape");
                None
            }
        }
    }

    fn fish_with_hops(&self, item: &str, kinds: &[FishKind], hops: usize) -> Option<Metadata> {
        let mut found = FishKind::or_all(kinds).iter().find_map(|kind| {
            let kinds = std::slice::from_ref(kind);
            self.tank
                .fish_for_metadata(item, kinds)
                .or_else(|| self.package.fish_for_metadata(item, kinds))
                .or_else(|| self.library.fish_for_metadata(item, kinds))
        })?;

        if found.sd_type.is_none() && hops < MAX_PARENT_HOPS {
            if let Some(parent) = found.parent.clone() {
                found.sd_type = self
                    .fish_with_hops(&parent, FishKind::STRUCTURES, hops + 1)
                    .and_then(|p| p.sd_type);
            }
        }
        Some(found)
    }
}

impl Fishable for MasterFisher<'_> {
    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        self.fish_with_hops(item, kinds, 0)
    }
}

impl TypeSource for MasterFisher<'_> {
    fn structure_for(&self, type_or_url: &str) -> Option<StructureDefinition> {
        self.fish_for_fhir(type_or_url, FishKind::STRUCTURES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fisher::{FhirDefinitions, Partition};
    use crate::model::{Entity, EntityKind};
    use serde_json::json;

    fn library() -> FhirDefinitions {
        FhirDefinitions::new().with(json!({
            "resourceType": "StructureDefinition", "id": "Patient", "name": "Patient",
            "url": "http://hl7.org/fhir/StructureDefinition/Patient",
            "kind": "resource", "type": "Patient", "derivation": "specialization",
            "snapshot": { "element": [{ "id": "Patient", "path": "Patient" }] }
        }))
    }

    #[test]
    fn test_tank_profile_type_comes_from_parent_chain() {
        let tank = Tank::new()
            .with_entity(Entity::profile("Base1").with_parent("Patient"))
            .with_entity(Entity::profile("Child").with_parent("Base1"));
        let package = Package::new();
        let lib = library();
        let config = ExporterConfig::default();
        let fisher = MasterFisher::new(&tank, &package, &lib, &config);

        let meta = fisher
            .fish_for_metadata("Child", FishKind::STRUCTURES)
            .unwrap();
        assert_eq!(meta.sd_type.as_deref(), Some("Patient"));
    }

    #[test]
    fn test_tank_shadows_library() {
        let tank = Tank::new().with_entity(Entity::resource("Patient"));
        let package = Package::new();
        let lib = library();
        let config = ExporterConfig::with_canonical("http://acme.org");
        let fisher = MasterFisher::new(&tank, &package, &lib, &config);

        let meta = fisher
            .fish_for_metadata("Patient", FishKind::STRUCTURES)
            .unwrap();
        assert_eq!(
            meta.url.as_deref(),
            Some("http://acme.org/StructureDefinition/Patient")
        );
    }

    #[test]
    fn test_fish_for_fhir_prefers_package() {
        let tank = Tank::new();
        let mut package = Package::new();
        let mut sd = StructureDefinition::placeholder(
            EntityKind::Resource,
            "Patient",
            "Patient",
            "http://acme.org/StructureDefinition/Patient".to_string(),
        );
        sd.derivation = Some(crate::model::Derivation::Specialization);
        package.publish(sd, Partition::Resources);
        let lib = library();
        let config = ExporterConfig::default();
        let fisher = MasterFisher::new(&tank, &package, &lib, &config);

        let found = fisher.fish_for_fhir("Patient", FishKind::STRUCTURES).unwrap();
        assert_eq!(found.url, "http://acme.org/StructureDefinition/Patient");
        assert!(fisher.fish_for_fhir("Nope", FishKind::STRUCTURES).is_none());
    }
}
