//! Structured error types for every stage of the compiler pipeline.
//!
//! Each stage (decode, selector evaluation, matrix expansion, translation)
//! defines its own error enum; [`CompileError`] unions them so the pipeline
//! can accumulate a single `Vec<CompileError>` end to end, per the
//! error-aggregator design (C5).

use std::fmt;

/// One of the four category tags a consumer can filter on, plus the
/// validation category for shape/invariant failures that don't fit the
/// other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A field did not match any accepted polymorphic shape.
    ShapeError,
    /// A selector expression was empty, malformed, or resolved to nothing.
    SelectorError,
    /// Matrix spec/exclude/rule evaluation failed.
    MatrixError,
    /// Two emitted records for the same (variant, name) pair disagree.
    ConflictError,
    /// A structural invariant (e.g. `run_on`/`distros` both set) was violated.
    ValidationError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ShapeError => "shape-error",
            Self::SelectorError => "selector-error",
            Self::MatrixError => "matrix-error",
            Self::ConflictError => "conflict",
            Self::ValidationError => "validation-error",
        };
        f.write_str(s)
    }
}

/// A single non-fatal compiler error, carrying the category tag, a
/// human-readable message, and an optional context hint (task name, variant
/// name, or selector source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// The category tag used for filtering/reporting.
    pub category: ErrorCategory,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Task name, variant name, or selector source, when known.
    pub context: Option<String>,
}

impl CompileError {
    /// Build a new error with no context hint attached.
    #[must_use]
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: None,
        }
    }

    /// Attach a context hint (task name, variant name, selector source).
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The category tag for this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// The context hint, if any was attached.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)?;
        if let Some(context) = &self.context {
            write!(f, " (in {context})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// A fatal YAML parse failure. This is the only error that aborts the
/// pipeline early: when present, no other errors are produced.
#[derive(Debug, thiserror::Error)]
#[error("invalid YAML: {0}")]
pub struct YamlError(#[from] pub serde_yaml::Error);

/// The result of a full compile: either a fatal YAML error, or the
/// accumulated (possibly empty) list of non-fatal errors alongside whatever
/// project could be built.
#[derive(Debug, Default)]
pub struct ErrorSink {
    errors: Vec<CompileError>,
}

impl ErrorSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal error.
    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    /// Record every error from an iterable.
    pub fn extend(&mut self, errors: impl IntoIterator<Item = CompileError>) {
        self.errors.extend(errors);
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterate over the recorded errors in recorded order.
    pub fn iter(&self) -> std::slice::Iter<'_, CompileError> {
        self.errors.iter()
    }

    /// Consume the sink, returning the accumulated errors in recorded order.
    #[must_use]
    pub fn into_vec(self) -> Vec<CompileError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_renders_as_kebab_tag() {
        assert_eq!(ErrorCategory::SelectorError.to_string(), "selector-error");
        assert_eq!(ErrorCategory::ConflictError.to_string(), "conflict");
    }

    #[test]
    fn context_suffix_only_present_when_set() {
        let bare = CompileError::new(ErrorCategory::ShapeError, "bad shape");
        assert!(bare.to_string().contains("shape-error"));
        assert!(!bare.to_string().contains('('));

        let contextual = bare.with_context("task foo");
        assert!(contextual.to_string().contains("(in task foo)"));
    }

    #[test]
    fn sink_accumulates_in_order() {
        let mut sink = ErrorSink::new();
        sink.push(CompileError::new(ErrorCategory::MatrixError, "one"));
        sink.push(CompileError::new(ErrorCategory::MatrixError, "two"));
        let errors = sink.into_vec();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "one");
        assert_eq!(errors[1].message, "two");
    }
}
