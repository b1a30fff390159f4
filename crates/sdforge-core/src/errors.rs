use thiserror::Error;

/// Result type alias using CompileError
pub type Result<T> = std::result::Result<T, CompileError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure raised while compiling a definition maps onto exactly one
/// kind, and each kind has a stable code that diagnostics carry so callers
/// and tests can match on it without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Entity level (aborts the entity)
    /// Parent missing, self-referential or of an incompatible kind
    StructuralDeclaration,

    // Rule level (the rule is skipped)
    /// A rule path did not resolve to an element
    PathResolution,
    /// Duplicate slice, invariant key or conflicting assignment
    Conflict,
    /// A named value set, instance, invariant, extension or type was not found
    ReferenceResolution,
    /// An extension was used for both a value and sub-extensions
    ShapeContradiction,
    /// Cardinality bounds that cannot be applied
    InvalidCardinality,
    /// A type or binding that does not fit the element
    InvalidType,
    /// A value that does not fit the element or is syntactically invalid
    InvalidValue,

    // Run level
    /// Duplicate published identifier
    Uniqueness,

    // Configuration / IO
    InvalidInput,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::StructuralDeclaration => "ERR_STRUCTURAL_DECLARATION",
            ExErrorKind::PathResolution => "ERR_PATH_RESOLUTION",
            ExErrorKind::Conflict => "ERR_CONFLICT",
            ExErrorKind::ReferenceResolution => "ERR_REFERENCE_RESOLUTION",
            ExErrorKind::ShapeContradiction => "ERR_SHAPE_CONTRADICTION",
            ExErrorKind::InvalidCardinality => "ERR_INVALID_CARDINALITY",
            ExErrorKind::InvalidType => "ERR_INVALID_TYPE",
            ExErrorKind::InvalidValue => "ERR_INVALID_VALUE",
            ExErrorKind::Uniqueness => "ERR_UNIQUENESS",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for kinds that abort compilation of the whole entity
    pub fn is_entity_fatal(&self) -> bool {
        matches!(self, ExErrorKind::StructuralDeclaration)
    }
}

/// Canonical structured error type
///
/// Carries the classification used by diagnostics and the boundary logging
/// macros, plus optional context about where the error was raised.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity: Option<String>,
    element_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            element_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity name context
    pub fn with_entity(mut self, name: impl Into<String>) -> Self {
        self.entity = Some(name.into());
        self
    }

    /// Add element id context
    pub fn with_element_id(mut self, id: impl Into<String>) -> Self {
        self.element_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity name context, if any
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Get the element id context, if any
    pub fn element_id(&self) -> Option<&str> {
        self.element_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(element_id) = &self.element_id {
            write!(f, " (element: {})", element_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for compiling structure definitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    // ===== Structural Declaration Errors =====
    /// A profile was declared without a parent
    #[error("The definition for {name} does not include a Parent")]
    ParentNotProvided { name: String },

    /// The parent refers to the entity itself by name
    #[error("Parent {name} is the same as the name of the definition; a definition cannot be its own parent")]
    ParentDeclaredAsName { name: String },

    /// The parent refers to the entity itself by id
    #[error("Parent {id} is the same as the id of {name}; a definition cannot be its own parent")]
    ParentDeclaredAsId { name: String, id: String },

    /// The parent could not be resolved anywhere
    #[error("Parent {parent} not found for {name}")]
    ParentNotDefined { name: String, parent: String },

    /// An extension whose parent is not an extension
    #[error("The parent of extension {name} must be Extension or another extension, but {parent} has type {parent_type}")]
    InvalidExtensionParent {
        name: String,
        parent: String,
        parent_type: String,
    },

    /// A profile whose parent is a logical model
    #[error("The parent of profile {name} cannot be the logical model {parent}")]
    InvalidProfileParent { name: String, parent: String },

    /// A logical model whose parent is neither logical nor a base element type
    #[error("The parent of logical model {name} must be Base, Element or another logical model, but {parent} is not")]
    InvalidLogicalParent { name: String, parent: String },

    /// A resource whose parent is neither Resource nor DomainResource
    #[error("The parent of resource {name} must be Resource or DomainResource, but found {parent}")]
    InvalidResourceParent { name: String, parent: String },

    // ===== Path Resolution Errors =====
    /// No element matched the rule path
    #[error("No element found at path {path} for {entity}, skipping rule")]
    ElementNotFound { entity: String, path: String },

    /// Numeric slice indices were used while named slices are required
    #[error("Path {path} uses a numeric index; slices must be addressed by name")]
    NumericSliceIndex { path: String },

    // ===== Conflict Errors =====
    /// A slice with the same name already exists on the element
    #[error("Slice named {slice_name} already exists on element {element_id}")]
    DuplicateSlice {
        element_id: String,
        slice_name: String,
    },

    /// An invariant with the same key is already attached to the element
    #[error("Element {element_id} already has a constraint with key {key}")]
    DuplicateInvariantKey { element_id: String, key: String },

    /// A different value was already assigned to the element
    #[error("Cannot assign {requested} to {element_id}; it already has the value {existing}")]
    ValueAlreadyAssigned {
        element_id: String,
        existing: String,
        requested: String,
    },

    /// An element with the same path was already added
    #[error("Cannot add element {path}; an element with that path already exists")]
    DuplicateElement { path: String },

    // ===== Reference Resolution Errors =====
    /// A referenced instance could not be compiled or found
    #[error("{}", instance_not_found_message(.name, .expected_type))]
    InstanceNotFound {
        name: String,
        expected_type: Option<String>,
    },

    /// A contains rule named an extension that does not exist
    #[error("Cannot create {slice_name} extension; unable to locate extension definition for: {extension}")]
    ExtensionNotFound {
        slice_name: String,
        extension: String,
    },

    /// An obeys rule named an invariant that was never declared
    #[error("Cannot apply {invariant} constraint on {target} because it was never defined")]
    InvariantNotFound { invariant: String, target: String },

    /// A type named in a rule could not be resolved
    #[error("Cannot find definition for type {type_name}")]
    TypeNotFound { type_name: String },

    /// A canonical value named something that has no canonical url
    #[error("Cannot use canonical URL of {name} because it does not exist")]
    CanonicalNotFound { name: String },

    // ===== Shape Errors =====
    /// An extension was given a value and sub-extensions at the same time
    #[error("Extension on {path} cannot have both a value and sub-extensions")]
    ExtensionValueAndSubExtension { path: String },

    // ===== Cardinality Errors =====
    /// The rule itself is inconsistent
    #[error("Invalid cardinality {min}..{max} on {element_id}: min cannot exceed max")]
    InvalidCardinality {
        element_id: String,
        min: u32,
        max: String,
    },

    /// The rule is disjoint from the element's current bounds
    #[error("Cannot constrain cardinality of {element_id} from {current} to {requested}")]
    ConflictingCardinality {
        element_id: String,
        current: String,
        requested: String,
    },

    // ===== Type Errors =====
    /// None of the requested types match the element's types
    #[error("The type {type_name} is not compatible with the types of {element_id}: {allowed}")]
    InvalidTypeConstraint {
        element_id: String,
        type_name: String,
        allowed: String,
    },

    /// A binding rule on an element without a coded type
    #[error("Cannot bind a value set to {element_id}; it has no coded type")]
    NonBindableElement { element_id: String },

    /// A binding rule that would relax the inherited strength
    #[error("Cannot override {current} binding on {element_id} with {requested} binding")]
    BindingStrengthWeakened {
        element_id: String,
        current: String,
        requested: String,
    },

    /// A type given for a slice of a non-extension element
    #[error("Cannot specify type {type_name} on slice {slice_name} of {element_id}; only extension slices may declare a type")]
    InvalidSliceType {
        element_id: String,
        slice_name: String,
        type_name: String,
    },

    /// An inline extension declared outside of an extension definition
    #[error("Inline extension {slice_name} on {element_id} can only be defined within an Extension, not in {entity}")]
    InlineExtensionOutsideExtension {
        entity: String,
        element_id: String,
        slice_name: String,
    },

    /// Element addition rules on a definition that cannot gain elements
    #[error("Cannot add element {path} to {entity}; elements can only be added to logical models and resources")]
    ElementAdditionNotAllowed { entity: String, path: String },

    /// An element addition whose parent path is missing
    #[error("Cannot add element {path}; its parent element {parent} does not exist")]
    MissingParentElement { path: String, parent: String },

    // ===== Value Errors =====
    /// A value that does not fit any of the element's types
    #[error("Cannot assign {value} to {element_id}; it is not compatible with type(s) {types}")]
    MismatchedValueType {
        element_id: String,
        value: String,
        types: String,
    },

    /// An identifier that does not satisfy the FHIR id syntax
    #[error("The string \"{id}\" does not represent a valid FHIR id; ids may contain only letters, digits, '-' and '.', up to 64 characters")]
    InvalidFhirId { id: String },

    /// A caret path that cannot address a property
    #[error("Invalid caret path {path}: {reason}")]
    InvalidCaretPath { path: String, reason: String },

    // ===== Run Level Errors =====
    /// Two published artifacts share an id within a partition
    #[error("Multiple {partition} with id {id}. Each definition must have a unique id.")]
    DuplicateId { partition: String, id: String },

    // ===== Generic Errors =====
    /// Configuration could not be read
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// An input file could not be read
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn instance_not_found_message(name: &str, expected_type: &Option<String>) -> String {
    match expected_type {
        Some(t) => format!(
            "Cannot find definition for Instance: {}. Expected an Instance of type {}. Skipping rule.",
            name, t
        ),
        None => format!("Cannot find definition for Instance: {}. Skipping rule.", name),
    }
}

impl CompileError {
    /// Classify this error in the canonical taxonomy
    pub fn kind(&self) -> ExErrorKind {
        match self {
            CompileError::ParentNotProvided { .. }
            | CompileError::ParentDeclaredAsName { .. }
            | CompileError::ParentDeclaredAsId { .. }
            | CompileError::ParentNotDefined { .. }
            | CompileError::InvalidExtensionParent { .. }
            | CompileError::InvalidProfileParent { .. }
            | CompileError::InvalidLogicalParent { .. }
            | CompileError::InvalidResourceParent { .. } => ExErrorKind::StructuralDeclaration,

            CompileError::ElementNotFound { .. } | CompileError::NumericSliceIndex { .. } => {
                ExErrorKind::PathResolution
            }

            CompileError::DuplicateSlice { .. }
            | CompileError::DuplicateInvariantKey { .. }
            | CompileError::ValueAlreadyAssigned { .. }
            | CompileError::DuplicateElement { .. } => ExErrorKind::Conflict,

            CompileError::InstanceNotFound { .. }
            | CompileError::ExtensionNotFound { .. }
            | CompileError::InvariantNotFound { .. }
            | CompileError::TypeNotFound { .. }
            | CompileError::CanonicalNotFound { .. } => ExErrorKind::ReferenceResolution,

            CompileError::ExtensionValueAndSubExtension { .. } => ExErrorKind::ShapeContradiction,

            CompileError::InvalidCardinality { .. }
            | CompileError::ConflictingCardinality { .. } => ExErrorKind::InvalidCardinality,

            CompileError::InvalidTypeConstraint { .. }
            | CompileError::NonBindableElement { .. }
            | CompileError::BindingStrengthWeakened { .. }
            | CompileError::InvalidSliceType { .. }
            | CompileError::InlineExtensionOutsideExtension { .. }
            | CompileError::ElementAdditionNotAllowed { .. }
            | CompileError::MissingParentElement { .. } => ExErrorKind::InvalidType,

            CompileError::MismatchedValueType { .. }
            | CompileError::InvalidFhirId { .. }
            | CompileError::InvalidCaretPath { .. } => ExErrorKind::InvalidValue,

            CompileError::DuplicateId { .. } => ExErrorKind::Uniqueness,

            CompileError::InvalidConfig { .. } | CompileError::Io { .. } => {
                ExErrorKind::InvalidInput
            }
            CompileError::Serialization { .. } => ExErrorKind::Serialization,
            CompileError::Internal { .. } => ExErrorKind::Internal,
        }
    }

    /// The element the error is about, when it concerns a single element
    pub fn element_id(&self) -> Option<&str> {
        match self {
            CompileError::DuplicateSlice { element_id, .. }
            | CompileError::DuplicateInvariantKey { element_id, .. }
            | CompileError::ValueAlreadyAssigned { element_id, .. }
            | CompileError::InvalidCardinality { element_id, .. }
            | CompileError::ConflictingCardinality { element_id, .. }
            | CompileError::InvalidTypeConstraint { element_id, .. }
            | CompileError::NonBindableElement { element_id, .. }
            | CompileError::BindingStrengthWeakened { element_id, .. }
            | CompileError::InvalidSliceType { element_id, .. }
            | CompileError::InlineExtensionOutsideExtension { element_id, .. }
            | CompileError::MismatchedValueType { element_id, .. } => Some(element_id),
            _ => None,
        }
    }
}

/// Conversion from CompileError to ExError
///
/// Diagnostics and the boundary logging macros only deal in `ExError`, so
/// every domain error is bridged through here.
impl From<CompileError> for ExError {
    fn from(err: CompileError) -> Self {
        let mut ex = ExError::new(err.kind()).with_message(err.to_string());
        if let Some(element_id) = err.element_id() {
            ex = ex.with_element_id(element_id);
        }
        match &err {
            CompileError::ParentNotProvided { name }
            | CompileError::ParentDeclaredAsName { name }
            | CompileError::ParentDeclaredAsId { name, .. }
            | CompileError::ParentNotDefined { name, .. }
            | CompileError::InvalidExtensionParent { name, .. }
            | CompileError::InvalidProfileParent { name, .. }
            | CompileError::InvalidLogicalParent { name, .. }
            | CompileError::InvalidResourceParent { name, .. } => {
                ex.with_entity(name.clone()).with_op("resolve_parent")
            }
            CompileError::ElementNotFound { entity, .. }
            | CompileError::InlineExtensionOutsideExtension { entity, .. }
            | CompileError::ElementAdditionNotAllowed { entity, .. } => {
                ex.with_entity(entity.clone())
            }
            CompileError::DuplicateId { .. } => ex.with_op("check_uniqueness"),
            _ => ex,
        }
    }
}
