use serde::Serialize;

use super::{split_version, FishKind, Fishable, Metadata};
use crate::model::{EntityKind, StructureDefinition};

/// Output partition of a published artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Partition {
    Profiles,
    Extensions,
    Logicals,
    Resources,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::Profiles,
        Partition::Extensions,
        Partition::Logicals,
        Partition::Resources,
    ];

    pub fn for_entity(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Profile => Partition::Profiles,
            EntityKind::Extension => Partition::Extensions,
            EntityKind::Logical => Partition::Logicals,
            EntityKind::Resource => Partition::Resources,
        }
    }

    /// The fish kind artifacts in this partition answer to
    pub fn fish_kind(&self) -> FishKind {
        match self {
            Partition::Profiles => FishKind::Profile,
            Partition::Extensions => FishKind::Extension,
            Partition::Logicals => FishKind::Logical,
            Partition::Resources => FishKind::Resource,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Profiles => "profiles",
            Partition::Extensions => "extensions",
            Partition::Logicals => "logicals",
            Partition::Resources => "resources",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable handle to a published artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactRef(usize);

#[derive(Debug, Clone)]
struct Entry {
    partition: Partition,
    artifact: StructureDefinition,
    /// Tombstone for an artifact whose entity failed after it was published
    retracted: bool,
}

/// In-memory collection of published artifacts
///
/// Artifacts are only ever appended; a retracted artifact keeps its slot so
/// outstanding `ArtifactRef`s never shift. Not thread-safe; a compile run
/// owns its package exclusively.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    /// Create an empty package
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Publish an artifact into a partition
    pub fn publish(&mut self, artifact: StructureDefinition, partition: Partition) -> ArtifactRef {
        self.entries.push(Entry {
            partition,
            artifact,
            retracted: false,
        });
        ArtifactRef(self.entries.len() - 1)
    }

    /// Replace a published artifact in place
    pub fn replace(&mut self, artifact_ref: ArtifactRef, artifact: StructureDefinition) {
        if let Some(entry) = self.entries.get_mut(artifact_ref.0) {
            entry.artifact = artifact;
        }
    }

    /// Withdraw a published artifact
    pub fn retract(&mut self, artifact_ref: ArtifactRef) {
        if let Some(entry) = self.entries.get_mut(artifact_ref.0) {
            entry.retracted = true;
        }
    }

    /// Get a published artifact
    ///
    /// Returns None if the reference is unknown or the artifact was retracted.
    pub fn get(&self, artifact_ref: ArtifactRef) -> Option<&StructureDefinition> {
        self.entries
            .get(artifact_ref.0)
            .filter(|e| !e.retracted)
            .map(|e| &e.artifact)
    }

    /// Partition of a published artifact
    pub fn partition_of(&self, artifact_ref: ArtifactRef) -> Option<Partition> {
        self.entries.get(artifact_ref.0).map(|e| e.partition)
    }

    /// List the live artifacts of a partition, in publication order
    pub fn list(&self, partition: Partition) -> Vec<&StructureDefinition> {
        self.live()
            .filter(|e| e.partition == partition)
            .map(|e| &e.artifact)
            .collect()
    }

    pub fn profiles(&self) -> Vec<&StructureDefinition> {
        self.list(Partition::Profiles)
    }

    pub fn extensions(&self) -> Vec<&StructureDefinition> {
        self.list(Partition::Extensions)
    }

    pub fn logicals(&self) -> Vec<&StructureDefinition> {
        self.list(Partition::Logicals)
    }

    pub fn resources(&self) -> Vec<&StructureDefinition> {
        self.list(Partition::Resources)
    }

    /// Number of live artifacts across all partitions
    pub fn len(&self) -> usize {
        self.live().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count live artifacts in a partition carrying `id`
    pub fn count_with_id(&self, partition: Partition, id: &str) -> usize {
        self.live()
            .filter(|e| e.partition == partition && e.artifact.id == id)
            .count()
    }

    /// Find a live artifact by name, id or url, trying `kinds` in order
    pub fn find(&self, item: &str, kinds: &[FishKind]) -> Option<&StructureDefinition> {
        self.find_with_kind(item, kinds).map(|(sd, _)| sd)
    }

    fn find_with_kind(
        &self,
        item: &str,
        kinds: &[FishKind],
    ) -> Option<(&StructureDefinition, FishKind)> {
        let (base, version) = split_version(item);
        kinds.iter().find_map(|kind| {
            self.live()
                .filter(|e| e.partition.fish_kind() == *kind)
                .map(|e| &e.artifact)
                .find(|sd| {
                    (sd.name == base || sd.id == base || sd.url == base)
                        && version.map_or(true, |v| sd.version.as_deref() == Some(v))
                })
                .map(|sd| (sd, *kind))
        })
    }

    fn live(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| !e.retracted)
    }
}

impl Fishable for Package {
    fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        self.find_with_kind(item, kinds)
            .map(|(sd, kind)| Metadata::from_structure(sd, kind))
    }
}
