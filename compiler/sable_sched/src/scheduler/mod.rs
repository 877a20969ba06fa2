//! The scheduler: owner of the queue-set and issuer of tasks.


use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use sable_core::{CompilationUnit, UnitState, Workspace, QUEUE_COUNT};

use crate::capability::PhaseMask;
use crate::deps::DependencyManager;
use crate::queue::TaskQueueSet;
use crate::task::{Task, TaskKind};

/// One instance shared by every worker.
///
/// Queue scanning order is the fixed phase priority order: `next_task`
/// always serves the lowest-indexed non-empty queue the caller is capable
/// of, approximating the pipeline's dependency order while letting many
/// phases run concurrently across workers.
pub struct Scheduler {
    queues: TaskQueueSet,
    /// Dense worker ids, assigned at registration.
    worker_count: AtomicUsize,
    finished: AtomicBool,
    deps: Arc<dyn DependencyManager>,
    /// Fallback idle target when a workspace is poisoned.
    default_workspace: Arc<Workspace>,
}

impl Scheduler {
    /// Create a scheduler with empty queues.
    pub fn new(deps: Arc<dyn DependencyManager>, default_workspace: Arc<Workspace>) -> Self {
        Scheduler {
            queues: TaskQueueSet::new(),
            worker_count: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            deps,
            default_workspace,
        }
    }

    /// The process-wide default workspace.
    pub fn default_workspace(&self) -> &Arc<Workspace> {
        &self.default_workspace
    }

    /// Register a worker, returning its dense id (0, 1, 2, ...).
    pub fn register_worker(&self) -> usize {
        self.worker_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Number of workers registered so far.
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Acquire)
    }

    /// Whether compilation has been marked over.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Queue a unit on the queue its reason-for-being maps to.
    pub fn create_task_for_unit(&self, unit: Arc<CompilationUnit>) {
        // A suspended unit re-enters here, and only here.
        if unit.state() == UnitState::Suspended {
            unit.transition(UnitState::Queued);
        }
        let index = unit.reason().queue_index();
        tracing::trace!(
            unit = unit.id().0,
            phase = unit.reason().describe(),
            queue = index,
            "enqueue"
        );
        self.queues.push(index, Task::for_unit(unit));
    }

    /// Sum of all queue lengths.
    pub fn pending_task_count(&self) -> usize {
        self.queues.total_len()
    }

    /// Peak queue footprint in bytes; reporting only, not authoritative
    /// over actual allocation.
    pub fn memory_used(&self) -> usize {
        (0..QUEUE_COUNT)
            .map(|i| self.queues.high_water(i) * std::mem::size_of::<Task>())
            .sum()
    }

    /// Hand out the next task for a worker with `capabilities`, given the
    /// task it just finished.
    pub fn next_task(&self, finished_task: &Task, capabilities: PhaseMask) -> Task {
        if self.pending_task_count() == 0 {
            // May enqueue synchronously.
            self.deps.create_tasks(self);
        }

        if self.is_finished() {
            return Task::compilation_finished(Arc::clone(&self.default_workspace));
        }

        for index in 0..QUEUE_COUNT {
            if !capabilities.allows_queue(index) {
                continue;
            }
            if let Some(task) = self.queues.pop(index) {
                return task;
            }
        }

        // Nothing eligible: idle against the finished task's workspace,
        // unless that workspace is poisoned, in which case redirect to the
        // default so the worker is never stranded on it.
        let fallback = finished_task.workspace();
        let fallback = if fallback.has_error() {
            &self.default_workspace
        } else {
            fallback
        };
        Task::sleep(Arc::clone(fallback))
    }

    /// Empty every queue, then fan one `CompilationFinished` sentinel per
    /// registered worker into every queue, so even a worker capable of a
    /// single phase observes termination on its next poll.
    pub fn cancel_all_tasks(&self) {
        tracing::debug!(
            pending = self.pending_task_count(),
            workers = self.worker_count(),
            "cancelling all tasks"
        );
        self.finished.store(true, Ordering::Release);
        self.queues.clear();
        let workers = self.worker_count();
        for index in 0..QUEUE_COUNT {
            for _ in 0..workers {
                self.queues.push(
                    index,
                    Task::compilation_finished(Arc::clone(&self.default_workspace)),
                );
            }
        }
    }

    /// Evict every queued task belonging to `workspace`, forcing each
    /// unit's state to `terminal_state`. Not preemptive: a task already
    /// handed to a worker runs to completion. Returns how many were
    /// evicted.
    pub fn cancel_tasks_for_workspace(
        &self,
        workspace: &Arc<Workspace>,
        terminal_state: UnitState,
    ) -> usize {
        let removed = self.queues.remove_matching(
            |task| Arc::ptr_eq(task.workspace(), workspace),
            |task| {
                if let Some(unit) = task.unit() {
                    unit.transition(terminal_state);
                }
            },
        );
        tracing::debug!(workspace = workspace.name(), removed, "workspace cancelled");
        removed
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self, index: usize) -> usize {
        self.queues.len(index)
    }

    #[cfg(test)]
    pub(crate) fn queue_high_water(&self, index: usize) -> usize {
        self.queues.high_water(index)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending_task_count())
            .field("workers", &self.worker_count())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Task {
    /// Convenience for tests and logging: the queue this task would occupy.
    pub fn queue_index(&self) -> Option<usize> {
        match self.kind() {
            TaskKind::Phase(reason) => Some(reason.queue_index()),
            TaskKind::Sleep | TaskKind::CompilationFinished => None,
        }
    }
}
