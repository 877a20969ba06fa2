//! Sable Sched - the compilation orchestrator.
//!
//! One [`Scheduler`] instance drives N worker threads through the ordered
//! compilation phases. Each [`Worker`] repeatedly asks the scheduler for
//! the next [`Task`] it is capable of, dispatches to a phase handler, and
//! reports the unit finished or suspended. The scheduler scans its queues
//! in fixed priority order, so earlier-phase work is always preferred by
//! any worker able to do it.
//!
//! Each worker owns a private virtual machine for compile-time code; the
//! [`bridge`] module drains finished metaprograms from it and the
//! [`decode`] module reconstructs typed AST literal nodes from the raw
//! result bytes.

mod bridge;
mod capability;
mod context;
pub mod decode;
mod deps;
mod queue;
mod scheduler;
mod stats;
mod task;
pub mod vm;
mod worker;

pub use bridge::drain_finished_metaprograms;
pub use capability::PhaseMask;
pub use context::{CompilerContext, VmFactory};
pub use deps::{DependencyManager, PhaseOutcome, PhaseRunner};
pub use scheduler::Scheduler;
pub use stats::{GlobalStats, WorkerStats};
pub use task::{Task, TaskKind};
pub use worker::Worker;
