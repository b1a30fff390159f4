//! Source location tokens
//!
//! The core never interprets a location; it only carries the token from the
//! rule or entity that produced a diagnostic back out to the caller.

use serde::{Deserialize, Serialize};

/// Position of a declaration or rule in its source document
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// Originating file, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceLocation {
    /// Create a location spanning the given lines of a file
    pub fn new(file: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            file: Some(file.into()),
            start_line,
            start_column: 0,
            end_line,
            end_column: 0,
        }
    }

    /// Location used for definitions synthesized by the compiler itself
    pub fn synthetic() -> Self {
        Self::default()
    }

    /// True if this location was not produced by the entity-model builder
    pub fn is_synthetic(&self) -> bool {
        self.file.is_none() && self.start_line == 0 && self.end_line == 0
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}-{}", file, self.start_line, self.end_line),
            None => write!(f, "<generated>"),
        }
    }
}
