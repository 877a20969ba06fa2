//! Sable Core - compilation state shared by the whole pipeline.
//!
//! A [`Workspace`] is an isolated compilation context with its own error
//! state. A [`CompilationUnit`] is the smallest schedulable piece of work,
//! tagged with the [`ReasonForBeing`] (phase) it currently needs performed.
//! A [`SourceFile`] carries the double-checked load/lex flags that let two
//! workers race on the same file safely. A [`WaitCondition`] is the
//! explicit, inspectable reason a suspended unit cannot proceed yet.

mod file;
mod unit;
mod wait;
mod workspace;

pub use file::{FileId, SourceFile};
pub use unit::{
    CompilationUnit, MetaprogramId, ProgramId, ReasonForBeing, UnitId, UnitPayload, UnitState,
    QUEUE_COUNT,
};
pub use wait::WaitCondition;
pub use workspace::Workspace;
