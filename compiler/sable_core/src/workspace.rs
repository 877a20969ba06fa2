//! Isolated compilation contexts.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use sable_diagnostic::Diagnostic;

/// An isolated compilation context.
///
/// The first error reported on a workspace poisons it: `has_error()` flips
/// permanently, its queued work becomes evictable, and idle workers that
/// would return to it are redirected to the process-default workspace.
pub struct Workspace {
    name: String,
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_reported: AtomicBool,
    /// Separate flag for metaprogram execution errors: only the first one
    /// per workspace is reported, suppressing cascades from one root cause.
    vm_error_reported: AtomicBool,
}

impl Workspace {
    /// Create a named workspace with a clean error state.
    pub fn new(name: impl Into<String>) -> Self {
        Workspace {
            name: name.into(),
            diagnostics: Mutex::new(Vec::new()),
            error_reported: AtomicBool::new(false),
            vm_error_reported: AtomicBool::new(false),
        }
    }

    /// Workspace name, for logs and diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any error has been reported on this workspace.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.error_reported.load(Ordering::Acquire)
    }

    /// Record a diagnostic. An error diagnostic poisons the workspace.
    pub fn report(&self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.error_reported.store(true, Ordering::Release);
            tracing::debug!(workspace = %self.name, message = %diagnostic.message, "workspace error");
        }
        self.diagnostics.lock().push(diagnostic);
    }

    /// Record a metaprogram execution error, first-error-wins.
    ///
    /// Returns `false` when a previous VM error already poisoned this
    /// workspace; the caller drops the diagnostic in that case.
    pub fn report_vm_error(&self, diagnostic: Diagnostic) -> bool {
        if self.vm_error_reported.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.report(diagnostic);
        true
    }

    /// Snapshot of everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_poisons_workspace() {
        let ws = Workspace::new("main");
        assert!(!ws.has_error());
        ws.report(Diagnostic::warning("benign"));
        assert!(!ws.has_error());
        ws.report(Diagnostic::error("bad source"));
        assert!(ws.has_error());
        assert_eq!(ws.diagnostics().len(), 2);
    }

    #[test]
    fn vm_errors_are_reported_once() {
        let ws = Workspace::new("main");
        assert!(ws.report_vm_error(Diagnostic::error("metaprogram panicked")));
        assert!(!ws.report_vm_error(Diagnostic::error("cascade from the same cause")));
        assert_eq!(ws.diagnostics().len(), 1);
    }
}
