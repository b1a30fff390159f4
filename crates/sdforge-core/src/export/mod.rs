//! Structure definition exporter
//!
//! Compiles the structure entities of a tank into published artifacts.
//! Each entity goes through the same pipeline:
//!
//! 1. resolve and check the parent (fatal for the entity)
//! 2. clone the parent and reset the inherited metadata
//! 3. publish the in-progress skeleton, warning if a parent cycle was seen
//! 4. infer extension shape, then apply element additions and the rules
//! 5. finalize, replace the skeleton and check id uniqueness
//!
//! Entities are compiled in declaration order, and on demand whenever a
//! lookup needs the full artifact of an entity that has not been compiled
//! yet. Caret rules that need an instance which cannot be built yet are
//! queued and retried once after every entity has been compiled.

mod contains;
pub mod deferred;
pub mod instances;
mod metadata;
mod parent;
mod preprocess;
mod rules;
pub mod values;

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use sdforge_core_types::SourceLocation;

use crate::config::ExporterConfig;
use crate::diagnostics::Diagnostics;
use crate::errors::{CompileError, Result};
use crate::fisher::{
    ArtifactRef, DefinitionLibrary, FishKind, Fishable, MasterFisher, Metadata, Package,
    Partition, TankFisher,
};
use crate::model::{Entity, EntityKey, EntityKind, Rule, RuleKind, StructureDefinition, Tank};
use crate::{log_op_end, log_op_error, log_op_start};

pub use deferred::{DeferredQueue, DeferredRule};
pub use instances::{AssignmentInstanceExporter, InstanceExporter};

/// Everything a compile run produces
#[derive(Debug)]
pub struct CompileOutput {
    pub package: Package,
    pub diagnostics: Diagnostics,
}

impl CompileOutput {
    /// A run succeeds when no error-severity diagnostic was reported
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Compile every structure entity in `tank`
pub fn compile(
    tank: &Tank,
    library: &dyn DefinitionLibrary,
    config: &ExporterConfig,
) -> CompileOutput {
    StructureDefinitionExporter::new(tank, library, config).export()
}

/// Compiler for profiles, extensions, logical models and resources
///
/// Owns the package it publishes into; lookups made while compiling see
/// everything published so far, including in-progress skeletons.
pub struct StructureDefinitionExporter<'a> {
    tank: &'a Tank,
    library: &'a dyn DefinitionLibrary,
    config: &'a ExporterConfig,
    package: Package,
    instances: Box<dyn InstanceExporter + 'a>,
    diagnostics: Diagnostics,
    /// Memoized artifacts, keyed by entity identity rather than name
    exported: HashMap<EntityKey, ArtifactRef>,
    failed: HashSet<EntityKey>,
    /// Entities whose parent is being resolved right now
    resolving_parent: HashSet<EntityKey>,
    /// Entities that were needed while resolving their own parent
    reentered: HashSet<EntityKey>,
    deferred: DeferredQueue,
    retrying: bool,
}

impl<'a> StructureDefinitionExporter<'a> {
    pub fn new(
        tank: &'a Tank,
        library: &'a dyn DefinitionLibrary,
        config: &'a ExporterConfig,
    ) -> Self {
        Self {
            tank,
            library,
            config,
            package: Package::new(),
            instances: Box::new(AssignmentInstanceExporter::new()),
            diagnostics: Diagnostics::new(),
            exported: HashMap::new(),
            failed: HashSet::new(),
            resolving_parent: HashSet::new(),
            reentered: HashSet::new(),
            deferred: DeferredQueue::new(),
            retrying: false,
        }
    }

    /// Replace the collaborator that builds instances
    pub fn with_instance_exporter(mut self, instances: Box<dyn InstanceExporter + 'a>) -> Self {
        self.instances = instances;
        self
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Caret rules currently waiting for the retry phase
    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Read-only resolver over the tank, the package so far and the library
    pub fn fisher(&self) -> MasterFisher<'_> {
        MasterFisher::new(self.tank, &self.package, self.library, self.config)
    }

    pub fn fish_for_metadata(&self, item: &str, kinds: &[FishKind]) -> Option<Metadata> {
        self.fisher().fish_for_metadata(item, kinds)
    }

    /// Full definition for `item`, compiling a tank entity first if needed
    pub fn fish_for_fhir(&mut self, item: &str, kinds: &[FishKind]) -> Option<StructureDefinition> {
        for kind in FishKind::or_all(kinds) {
            let kinds = std::slice::from_ref(kind);
            let key = TankFisher::new(self.tank, self.config).find_entity(item, kinds);
            if let Some(key) = key {
                let artifact = self.export_entity(key)?;
                return self.package.get(artifact).cloned();
            }
            if let Some(sd) = self.fisher().fish_for_fhir(item, kinds) {
                return Some(sd);
            }
        }
        None
    }

    /// Compile every entity, then retry deferred rules once
    pub fn export(mut self) -> CompileOutput {
        let tank = self.tank;
        log_op_start!("export_all", entities = tank.entities.len() as u64);
        let start = Instant::now();

        for key in tank.keys() {
            self.export_entity(key);
        }
        self.apply_deferred();

        log_op_end!(
            "export_all",
            duration_ms = start.elapsed().as_millis() as u64,
            published = self.package.len() as u64,
            errors = self.diagnostics.errors().len() as u64
        );
        CompileOutput {
            package: self.package,
            diagnostics: self.diagnostics,
        }
    }

    /// Compile one entity, or return its memoized artifact
    ///
    /// Returns None if the entity does not exist or failed to compile.
    pub fn export_entity(&mut self, key: EntityKey) -> Option<ArtifactRef> {
        if let Some(artifact) = self.exported.get(&key) {
            return Some(*artifact);
        }
        if self.failed.contains(&key) {
            return None;
        }
        let tank = self.tank;
        let entity = tank.entity(key)?;
        if self.resolving_parent.contains(&key) {
            return Some(self.publish_placeholder(key, entity));
        }

        log_op_start!("export_structure", entity_name = entity.name.as_str());
        let start = Instant::now();
        match self.export_structure(key, entity) {
            Ok(artifact) => {
                log_op_end!(
                    "export_structure",
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_name = entity.name.as_str()
                );
                Some(artifact)
            }
            Err(e) => {
                log_op_error!(
                    "export_structure",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    entity_name = entity.name.as_str()
                );
                self.diagnostics.error(e, Some(&entity.source));
                self.failed.insert(key);
                if let Some(placeholder) = self.exported.remove(&key) {
                    self.package.retract(placeholder);
                }
                None
            }
        }
    }

    /// Stand-in for an entity needed while its own parent is resolved
    fn publish_placeholder(&mut self, key: EntityKey, entity: &Entity) -> ArtifactRef {
        let url = TankFisher::new(self.tank, self.config).entity_url(entity);
        let placeholder =
            StructureDefinition::placeholder(entity.kind, &entity.id, &entity.name, url);
        let artifact = self
            .package
            .publish(placeholder, Partition::for_entity(entity.kind));
        tracing::debug!(entity = %entity.name, "published placeholder for circular parent");
        self.exported.insert(key, artifact);
        self.reentered.insert(key);
        artifact
    }

    fn export_structure(&mut self, key: EntityKey, entity: &'a Entity) -> Result<ArtifactRef> {
        let parent_name = parent::declared_parent(entity)?;

        self.resolving_parent.insert(key);
        let resolved = self.fish_for_fhir(&parent_name, FishKind::STRUCTURES);
        self.resolving_parent.remove(&key);

        let mut sd = resolved.ok_or_else(|| CompileError::ParentNotDefined {
            name: entity.name.clone(),
            parent: parent_name.clone(),
        })?;
        parent::check_parent_kind(entity, &sd)?;

        let parent_in_progress = sd.in_progress;
        let base_url = sd.url.clone();
        let url = TankFisher::new(self.tank, self.config).entity_url(entity);
        metadata::reset_metadata(&mut sd, entity, url, base_url, self.config);
        if entity.kind == EntityKind::Extension {
            sd.context = self.extension_contexts(entity);
        }

        if parent_in_progress || self.reentered.contains(&key) {
            self.diagnostics.warn(
                format!(
                    "The definition of {} may be incomplete because there is a circular \
                     dependency with its parent {} causing the parent to be used before the \
                     parent has been fully processed.",
                    entity.name, parent_name
                ),
                Some(&entity.source),
            );
        }

        sd.in_progress = true;
        let artifact = match self.exported.get(&key) {
            Some(placeholder) => {
                self.package.replace(*placeholder, sd.clone());
                *placeholder
            }
            None => {
                let artifact = self
                    .package
                    .publish(sd.clone(), Partition::for_entity(entity.kind));
                self.exported.insert(key, artifact);
                artifact
            }
        };

        self.apply_entity_rules(&mut sd, entity, artifact);

        sd.finalize();
        let id = sd.id.clone();
        self.package.replace(artifact, sd);
        self.check_uniqueness(artifact, &id, entity);
        Ok(artifact)
    }

    /// Apply element additions first, then every other rule in order
    fn apply_entity_rules(
        &mut self,
        sd: &mut StructureDefinition,
        entity: &'a Entity,
        artifact: ArtifactRef,
    ) {
        let rules: Vec<Rule> = if entity.kind == EntityKind::Extension {
            let inference = preprocess::infer_extension_shape(&entity.rules);
            for (err, at) in inference.contradictions {
                self.report(err, &at, entity);
            }
            inference.rules
        } else {
            entity.rules.clone()
        };

        let (additions, others): (Vec<&Rule>, Vec<&Rule>) = rules
            .iter()
            .partition(|r| matches!(r.kind, RuleKind::AddElement(_)));

        for rule in additions {
            if let Err(e) = self.apply_addition(sd, entity, rule) {
                self.report(e, &rule.source, entity);
            }
        }
        for rule in others {
            if let Err(e) = self.apply_rule(sd, entity, artifact, rule) {
                tracing::debug!(entity = %entity.name, path = %rule.path, "rule not applied");
                self.report(e, &rule.source, entity);
            }
        }
    }

    /// Report a rule error at the rule, or at the entity for synthesized rules
    fn report(&mut self, err: CompileError, at: &SourceLocation, entity: &Entity) {
        let location = if at.is_synthetic() { &entity.source } else { at };
        self.diagnostics.error(err, Some(location));
    }

    fn check_uniqueness(&mut self, artifact: ArtifactRef, id: &str, entity: &Entity) {
        let Some(partition) = self.package.partition_of(artifact) else {
            return;
        };
        if self.package.count_with_id(partition, id) > 1 {
            self.diagnostics.error(
                CompileError::DuplicateId {
                    partition: partition.to_string(),
                    id: id.to_string(),
                },
                Some(&entity.source),
            );
        }
    }

    /// Retry each deferred caret rule exactly once
    fn apply_deferred(&mut self) {
        let pending = self.deferred.drain();
        if pending.is_empty() {
            return;
        }
        tracing::debug!(count = pending.len(), "retrying deferred caret rules");
        self.retrying = true;
        for item in pending {
            let Some(mut sd) = self.package.get(item.artifact).cloned() else {
                continue;
            };
            match self.apply_caret(&mut sd, item.artifact, &item.entity, &item.rule) {
                Ok(()) => self.package.replace(item.artifact, sd),
                Err(e) => self.diagnostics.error(e, Some(&item.rule.source)),
            }
        }
        self.retrying = false;
    }
}
