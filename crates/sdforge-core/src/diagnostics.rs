//! Diagnostics channel
//!
//! Every reportable condition raised during a compile run lands here with a
//! severity, a message and the source location of the rule or entity that
//! produced it. Each diagnostic is also emitted as a `tracing` event so the
//! run log and the returned list never disagree.

use sdforge_core_types::schema::EVENT_DIAGNOSTIC;
use sdforge_core_types::SourceLocation;
use serde::Serialize;

use crate::errors::{CompileError, ExError};

fn render_location(location: Option<&SourceLocation>) -> String {
    location.map(|l| l.to_string()).unwrap_or_default()
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single reported condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable error code for error diagnostics raised from an `ExError`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(code) = self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

/// Accumulates diagnostics across a whole compile run
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Report a compile error at error severity
    pub fn error(&mut self, err: CompileError, location: Option<&SourceLocation>) {
        self.report_ex(err.into(), location);
    }

    /// Report a canonical error at error severity
    pub fn report_ex(&mut self, err: ExError, location: Option<&SourceLocation>) {
        let rendered = render_location(location);
        tracing::error!(
            component = module_path!(),
            event = EVENT_DIAGNOSTIC,
            err_code = err.code(),
            location = rendered.as_str(),
            "{}",
            err.message()
        );
        self.items.push(Diagnostic {
            severity: Severity::Error,
            code: Some(err.code()),
            message: err.message().to_string(),
            location: location.cloned(),
        });
    }

    /// Report a compile error that has been downgraded to a warning
    pub fn downgraded(&mut self, err: CompileError, location: Option<&SourceLocation>) {
        let ex: ExError = err.into();
        let rendered = render_location(location);
        tracing::warn!(
            component = module_path!(),
            event = EVENT_DIAGNOSTIC,
            err_code = ex.code(),
            location = rendered.as_str(),
            "{}",
            ex.message()
        );
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            code: Some(ex.code()),
            message: ex.message().to_string(),
            location: location.cloned(),
        });
    }

    /// Report a warning
    pub fn warn(&mut self, message: impl Into<String>, location: Option<&SourceLocation>) {
        let message = message.into();
        let rendered = render_location(location);
        tracing::warn!(
            component = module_path!(),
            event = EVENT_DIAGNOSTIC,
            location = rendered.as_str(),
            "{}",
            message
        );
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            code: None,
            message,
            location: location.cloned(),
        });
    }

    /// Report an informational message
    pub fn info(&mut self, message: impl Into<String>, location: Option<&SourceLocation>) {
        let message = message.into();
        let rendered = render_location(location);
        tracing::info!(
            component = module_path!(),
            event = EVENT_DIAGNOSTIC,
            location = rendered.as_str(),
            "{}",
            message
        );
        self.items.push(Diagnostic {
            severity: Severity::Info,
            code: None,
            message,
            location: location.cloned(),
        });
    }

    /// All diagnostics in the order they were reported
    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Diagnostics of one severity
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.severity == severity)
    }

    /// Error-severity diagnostics
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.with_severity(Severity::Error).collect()
    }

    /// Warning-severity diagnostics
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.with_severity(Severity::Warning).collect()
    }

    /// A run succeeds when no error was reported, however many were recovered from
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the collector
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
