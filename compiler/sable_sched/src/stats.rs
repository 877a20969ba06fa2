//! Phase timing and throughput bookkeeping.
//!
//! Each worker accumulates privately and merges into the shared
//! [`GlobalStats`] exactly once, when it observes the termination sentinel.

use std::time::Duration;

use sable_core::{ReasonForBeing, QUEUE_COUNT};

/// Per-worker accumulators; no synchronization, owned by the worker.
#[derive(Clone, Debug, Default)]
pub struct WorkerStats {
    /// Time spent per phase queue.
    pub phase_time: [Duration; QUEUE_COUNT],
    /// Non-sentinel tasks executed.
    pub tasks_executed: u64,
    /// Sleep sentinels served.
    pub sleeps: u64,
    /// Total time spent dormant.
    pub time_asleep: Duration,
}

impl WorkerStats {
    /// Charge `elapsed` against a phase.
    pub fn record_phase(&mut self, reason: ReasonForBeing, elapsed: Duration) {
        self.phase_time[reason.queue_index()] += elapsed;
        self.tasks_executed += 1;
    }

    /// Charge one bounded sleep.
    pub fn record_sleep(&mut self, elapsed: Duration) {
        self.sleeps += 1;
        self.time_asleep += elapsed;
    }
}

/// Pool-wide totals, merged from workers at shutdown.
#[derive(Clone, Debug, Default)]
pub struct GlobalStats {
    pub phase_time: [Duration; QUEUE_COUNT],
    pub tasks_executed: u64,
    pub workers_finished: usize,
}

impl GlobalStats {
    /// Fold one worker's accumulators in.
    pub fn merge(&mut self, worker: &WorkerStats) {
        for (total, t) in self.phase_time.iter_mut().zip(worker.phase_time.iter()) {
            *total += *t;
        }
        self.tasks_executed += worker.tasks_executed;
        self.workers_finished += 1;
    }

    /// Total time across all phases and workers.
    pub fn total_phase_time(&self) -> Duration {
        self.phase_time.iter().sum()
    }
}
