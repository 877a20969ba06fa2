//! The diagnostic value type.

use std::fmt;

use sable_ir::Span;

/// How serious a diagnostic is.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    /// Compilation of the owning unit cannot continue.
    Error,
    Warning,
    Note,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// One reported problem, localized to one compilation unit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Site of the problem, when one is known; decoded metaprogram results
    /// report at the directive's span.
    pub span: Option<Span>,
    /// Follow-up lines attached under the main message.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    /// Attach the source span the diagnostic points at.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a follow-up note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Whether this diagnostic stops the owning unit.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.label(), self.message)?;
        if let Some(span) = self.span {
            write!(f, " (at {}..{})", span.start, span.end())?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_accumulates_parts() {
        let diag = Diagnostic::error("assertion failed")
            .with_span(Span::new(4, 9))
            .with_note("while evaluating #assert");
        assert!(diag.is_error());
        assert_eq!(diag.span, Some(Span::new(4, 9)));
        assert_eq!(diag.notes.len(), 1);
    }

    #[test]
    fn display_includes_span_and_notes() {
        let diag = Diagnostic::error("metaprogram failed")
            .with_span(Span::new(0, 3))
            .with_note("first failure wins");
        let rendered = diag.to_string();
        assert_eq!(
            rendered,
            "error: metaprogram failed (at 0..3)\n  note: first failure wins"
        );
    }

    #[test]
    fn warnings_are_not_errors() {
        assert!(!Diagnostic::warning("unused unit").is_error());
    }
}
