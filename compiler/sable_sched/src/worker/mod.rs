//! The worker loop.
//!
//! Each worker owns its capability mask, its timing accumulators, and
//! (lazily) a private VM for compile-time code. The loop itself is one
//! step: ask the scheduler for a task, dispatch it, report back through
//! the dependency manager. Run [`Worker::run_one_step`] until it returns
//! `true`; in the parallel driver that loop lives on its own OS thread,
//! in the single-threaded driver the caller interleaves workers by hand.


use std::sync::Arc;
use std::time::{Duration, Instant};

use sable_core::{CompilationUnit, ReasonForBeing, UnitState, WaitCondition};
use sable_diagnostic::Diagnostic;

use crate::bridge::drain_finished_metaprograms;
use crate::capability::PhaseMask;
use crate::context::CompilerContext;
use crate::deps::PhaseOutcome;
use crate::stats::WorkerStats;
use crate::task::{Task, TaskKind};

/// Smallest idle pause; each consecutive dormant iteration adds one more.
const SLEEP_QUANTUM: Duration = Duration::from_micros(100);
/// Back-off stops growing past this many dormant iterations.
const MAX_SLEEP_STREAK: u32 = 50;

pub struct Worker {
    ctx: Arc<CompilerContext>,
    id: usize,
    capabilities: PhaseMask,
    /// Consecutive sleep tasks served; resets on any real task.
    sleep_streak: u32,
    last_task: Task,
    /// Created on the first execute task; most workers never need one.
    vm: Option<Box<dyn crate::vm::MetaprogramVm>>,
    stats: WorkerStats,
    stats_merged: bool,
}

impl Worker {
    /// Register a new worker with the scheduler.
    pub fn new(ctx: Arc<CompilerContext>, capabilities: PhaseMask) -> Self {
        let id = ctx.scheduler.register_worker();
        // The initial "finished task" is a unit-less sentinel so the first
        // idle fallback lands on the default workspace.
        let last_task = Task::sleep(Arc::clone(ctx.scheduler.default_workspace()));
        Worker {
            ctx,
            id,
            capabilities,
            sleep_streak: 0,
            last_task,
            vm: None,
            stats: WorkerStats::default(),
            stats_merged: false,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn capabilities(&self) -> PhaseMask {
        self.capabilities
    }

    /// Timing accumulators gathered so far.
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Run the loop to completion. The thread entry point of the parallel
    /// driver.
    pub fn run(&mut self) {
        while !self.run_one_step() {}
    }

    /// Serve one task. Returns `true` when the worker should stop.
    pub fn run_one_step(&mut self) -> bool {
        let task = self.ctx.scheduler.next_task(&self.last_task, self.capabilities);
        if !task.is_sleep() {
            self.sleep_streak = 0;
        }
        if let Some(unit) = task.unit() {
            unit.transition(UnitState::InProgress);
        }

        let stop = match *task.kind() {
            TaskKind::CompilationFinished => {
                if !self.stats_merged {
                    self.ctx.stats.lock().merge(&self.stats);
                    self.stats_merged = true;
                }
                tracing::debug!(worker = self.id, "worker stopping");
                true
            }
            TaskKind::Sleep => {
                self.idle();
                false
            }
            TaskKind::Phase(reason) => {
                let Some(unit) = task.unit() else {
                    unreachable!("phase task without a unit");
                };
                let started = Instant::now();
                self.run_phase(&Arc::clone(unit), reason);
                self.stats.record_phase(reason, started.elapsed());
                false
            }
        };
        self.last_task = task;
        stop
    }

    /// Nothing eligible. Draining a still-busy VM takes priority over
    /// idling; otherwise back off (parallel) or hand control back to the
    /// caller (single-threaded).
    fn idle(&mut self) {
        if self.vm.as_ref().is_some_and(|vm| !vm.all_done()) {
            let started = Instant::now();
            if let Some(vm) = self.vm.as_mut() {
                vm.step();
                drain_finished_metaprograms(&self.ctx, vm.as_mut());
            }
            self.stats
                .record_phase(ReasonForBeing::Execute, started.elapsed());
            return;
        }
        if self.ctx.is_parallel() {
            let pause = SLEEP_QUANTUM * (self.sleep_streak.min(MAX_SLEEP_STREAK) + 1);
            std::thread::sleep(pause);
            self.sleep_streak = self.sleep_streak.saturating_add(1);
            self.stats.record_sleep(pause);
        }
    }

    fn run_phase(&mut self, unit: &Arc<CompilationUnit>, reason: ReasonForBeing) {
        tracing::trace!(
            worker = self.id,
            unit = unit.id().0,
            phase = reason.describe(),
            "dispatch"
        );
        match reason {
            ReasonForBeing::LoadFile => self.run_load(unit),
            ReasonForBeing::LexFile => self.run_lex(unit),
            ReasonForBeing::Execute => self.run_execute(unit),
            _ => {
                let outcome = self.ctx.phases.run_phase(unit);
                self.settle(unit, outcome);
            }
        }
    }

    /// Load phase. The file's double-checked flag makes two workers racing
    /// on the same file perform the read exactly once.
    fn run_load(&mut self, unit: &Arc<CompilationUnit>) {
        let Some(file) = unit.file() else {
            unreachable!("load task without a file payload");
        };
        match file.ensure_loaded(|| self.ctx.phases.load_source(unit)) {
            Ok(_) => self.settle(unit, PhaseOutcome::Finished),
            Err(err) => {
                unit.workspace().report(Diagnostic::error(format!(
                    "cannot load '{}': {err}",
                    file.path().display()
                )));
                self.settle(unit, PhaseOutcome::Failed);
            }
        }
    }

    fn run_lex(&mut self, unit: &Arc<CompilationUnit>) {
        let Some(file) = unit.file() else {
            unreachable!("lex task without a file payload");
        };
        if !file.is_loaded() {
            self.settle(unit, PhaseOutcome::Waiting(WaitCondition::OnFileLoad(file.id())));
            return;
        }
        file.ensure_lexed(|text| self.ctx.phases.lex_source(unit, text));
        self.settle(unit, PhaseOutcome::Finished);
    }

    /// Execute phase: install the metaprogram in this worker's VM and give
    /// it one slice. The unit stays in progress until its metaprogram
    /// finishes, in this drain or a later idle one.
    fn run_execute(&mut self, unit: &Arc<CompilationUnit>) {
        let Some(mp_id) = unit.metaprogram() else {
            unreachable!("execute task without a metaprogram payload");
        };
        debug_assert!(
            self.ctx.metaprogram(mp_id).is_some(),
            "execute task for an unregistered metaprogram"
        );
        if self.vm.is_none() {
            self.vm = Some(self.ctx.new_vm());
        }
        let Some(vm) = self.vm.as_mut() else {
            unreachable!();
        };
        vm.load_metaprogram(mp_id);
        vm.step();
        drain_finished_metaprograms(&self.ctx, vm.as_mut());
    }

    /// Route a phase outcome through the unit's state and the dependency
    /// manager. A failed unit is still reported finished so nothing
    /// downstream waits on it forever.
    fn settle(&self, unit: &Arc<CompilationUnit>, outcome: PhaseOutcome) {
        match outcome {
            PhaseOutcome::Finished | PhaseOutcome::Failed => {
                unit.transition(UnitState::Done);
                self.ctx.deps.unit_finished(unit);
            }
            PhaseOutcome::Waiting(condition) => {
                unit.set_wait(condition);
                unit.transition(UnitState::Suspended);
                unit.bump_cycle();
                self.ctx.deps.unit_waiting(unit, condition);
            }
        }
    }
}
