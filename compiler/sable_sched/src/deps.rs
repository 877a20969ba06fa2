//! Seams to the external collaborators.
//!
//! The dependency manager decides *what* work exists; the phase runner
//! performs the *content* of a phase (lexing, parsing, validation, IR,
//! code generation). The scheduler core treats both as black boxes.
//! Failure never crosses these seams as a panic: handlers communicate
//! through [`PhaseOutcome`] and workspace diagnostics.

use std::io;
use std::sync::Arc;

use sable_core::{CompilationUnit, SourceFile, WaitCondition, Workspace};

use crate::scheduler::Scheduler;

/// How a phase handler ended.
#[derive(Clone, Debug)]
pub enum PhaseOutcome {
    /// The unit's current phase is done; the dependency manager is told.
    Finished,
    /// A prerequisite is unmet; the unit suspends with the condition.
    Waiting(WaitCondition),
    /// A user-facing error was reported to the unit's workspace; the unit
    /// is terminal but the rest of the pool keeps running.
    Failed,
}

/// Creator and bookkeeper of compilation units.
pub trait DependencyManager: Send + Sync {
    /// Called by the scheduler when no task is pending; may enqueue zero
    /// or more tasks synchronously through `scheduler`.
    fn create_tasks(&self, scheduler: &Scheduler);

    /// A unit's current phase completed.
    fn unit_finished(&self, unit: &Arc<CompilationUnit>);

    /// A unit suspended on an explicit wait condition.
    fn unit_waiting(&self, unit: &Arc<CompilationUnit>, condition: WaitCondition);

    /// Metaprogram-generated source was spliced into `file`; schedule it
    /// for (re-)lexing.
    fn request_lexing(&self, workspace: &Arc<Workspace>, file: &Arc<SourceFile>);
}

/// Executor of the phase content, outside this core.
///
/// The worker owns the file-level double-checked locking for the load and
/// lex phases; these callbacks run inside it and perform the raw work
/// exactly once per file.
pub trait PhaseRunner: Send + Sync {
    /// Fetch the raw source text for a load-phase unit.
    fn load_source(&self, unit: &Arc<CompilationUnit>) -> io::Result<String>;

    /// Tokenize the current contents of a lex-phase unit's file.
    fn lex_source(&self, unit: &Arc<CompilationUnit>, text: &str);

    /// Any other phase: parse, type-check, IR, machine code, link,
    /// messages, reflection, type-init, type-size.
    fn run_phase(&self, unit: &Arc<CompilationUnit>) -> PhaseOutcome;
}
