//! Task descriptors.

use std::sync::Arc;

use sable_core::{CompilationUnit, ReasonForBeing, Workspace};

/// What a task asks a worker to do.
#[derive(Clone, Debug)]
pub enum TaskKind {
    /// Run one phase of a compilation unit.
    Phase(ReasonForBeing),
    /// Nothing eligible; idle against the carried workspace.
    Sleep,
    /// Compilation is over; the worker's loop stops.
    CompilationFinished,
}

/// Immutable work descriptor, consumed exactly once by a worker.
///
/// The unit (when present) outlives the task and may be re-wrapped in a new
/// task later. Sentinel tasks (`Sleep`, `CompilationFinished`) carry only a
/// workspace, which `Scheduler::next_task` uses as the idle fallback.
#[derive(Clone)]
pub struct Task {
    kind: TaskKind,
    unit: Option<Arc<CompilationUnit>>,
    workspace: Arc<Workspace>,
}

impl Task {
    /// Wrap a unit in a task for its current reason-for-being.
    pub fn for_unit(unit: Arc<CompilationUnit>) -> Self {
        Task {
            kind: TaskKind::Phase(unit.reason()),
            workspace: Arc::clone(unit.workspace()),
            unit: Some(unit),
        }
    }

    /// Idle sentinel bound to a workspace.
    pub fn sleep(workspace: Arc<Workspace>) -> Self {
        Task {
            kind: TaskKind::Sleep,
            unit: None,
            workspace,
        }
    }

    /// Termination sentinel.
    pub fn compilation_finished(workspace: Arc<Workspace>) -> Self {
        Task {
            kind: TaskKind::CompilationFinished,
            unit: None,
            workspace,
        }
    }

    #[inline]
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    #[inline]
    pub fn unit(&self) -> Option<&Arc<CompilationUnit>> {
        self.unit.as_ref()
    }

    /// The workspace this task belongs to: the unit's, or the sentinel's.
    #[inline]
    pub fn workspace(&self) -> &Arc<Workspace> {
        match &self.unit {
            Some(unit) => unit.workspace(),
            None => &self.workspace,
        }
    }

    #[inline]
    pub fn is_sleep(&self) -> bool {
        matches!(self.kind, TaskKind::Sleep)
    }

    #[inline]
    pub fn is_termination(&self) -> bool {
        matches!(self.kind, TaskKind::CompilationFinished)
    }
}
