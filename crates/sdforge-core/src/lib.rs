//! sdforge core - structure definition compiler
//!
//! This crate compiles declared profiles, extensions, logical models and
//! resources into fully resolved structure definitions, including:
//! - The domain model of entities, rules and artifacts
//! - An arena element tree with a path resolver that unfolds on demand
//! - Symbol resolution ("fishing") across tank, package and library
//! - The rule application engine and the per-entity exporter pipeline
//! - Diagnostics, the error facility and the logging facility
//!
//! Parsing source text and serializing artifacts to files are left to
//! callers; `compile` takes a `Tank` of declarations and returns the
//! published `Package` with every diagnostic reported on the way.

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod export;
pub mod fisher;
pub mod logging_facility;
pub mod model;
pub mod tree;

// The logging macros reach the schema constants through this path
pub use sdforge_core_types;

// Re-export commonly used types
pub use config::ExporterConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use errors::{CompileError, ExError, ExErrorKind, Result};
pub use export::{compile, CompileOutput, StructureDefinitionExporter};
pub use fisher::{FhirDefinitions, FishKind, MasterFisher, Package, Partition};
pub use model::{Entity, EntityKind, Rule, StructureDefinition, Tank};
