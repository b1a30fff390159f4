pub mod cardinality;
pub mod element;
pub mod entity;
pub mod json_path;
pub mod rule;
pub mod structure_definition;
pub mod tank;
pub mod urls;
pub mod value;

pub use cardinality::{Cardinality, Max};
pub use element::{
    Discriminator, ElementBinding, ElementConstraint, ElementDefinition, ElementType,
    ExtensionMarker, Slicing,
};
pub use entity::{ContextDecl, Entity, EntityKind};
pub use rule::{BindingStrength, ContainsItem, ElementAddition, FlagSet, Rule, RuleKind, TypeRef};
pub use structure_definition::{Derivation, StructureDefinition, StructureKind, UsageContext};
pub use tank::{
    EntityKey, Instance, InstanceUsage, Invariant, MappingDecl, RuleSetDecl, Tank, TerminologyDecl,
};
pub use value::{FshCode, FshQuantity, FshValue};
