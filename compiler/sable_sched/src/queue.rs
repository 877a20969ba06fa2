//! The queue-set: one FIFO per phase, plus high-water bookkeeping.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use sable_core::QUEUE_COUNT;

use crate::task::Task;

/// One FIFO queue per phase, each under its own lock so producers and
/// consumers on different phases never contend.
pub(crate) struct TaskQueueSet {
    queues: [Mutex<VecDeque<Task>>; QUEUE_COUNT],
    /// Peak size ever observed per queue; monotonically nondecreasing.
    high_water: [AtomicUsize; QUEUE_COUNT],
}

impl TaskQueueSet {
    pub(crate) fn new() -> Self {
        TaskQueueSet {
            queues: std::array::from_fn(|_| Mutex::new(VecDeque::new())),
            high_water: std::array::from_fn(|_| AtomicUsize::new(0)),
        }
    }

    /// Append to one queue, updating its high-water mark.
    pub(crate) fn push(&self, index: usize, task: Task) {
        let mut queue = self.queues[index].lock();
        queue.push_back(task);
        self.high_water[index].fetch_max(queue.len(), Ordering::AcqRel);
    }

    /// Pop the head of one queue, FIFO.
    pub(crate) fn pop(&self, index: usize) -> Option<Task> {
        self.queues[index].lock().pop_front()
    }

    pub(crate) fn len(&self, index: usize) -> usize {
        self.queues[index].lock().len()
    }

    /// Sum of all queue lengths.
    pub(crate) fn total_len(&self) -> usize {
        (0..QUEUE_COUNT).map(|i| self.len(i)).sum()
    }

    pub(crate) fn high_water(&self, index: usize) -> usize {
        self.high_water[index].load(Ordering::Acquire)
    }

    /// Remove every queued task `predicate` matches, in every queue,
    /// applying `on_removed` to each before dropping it.
    pub(crate) fn remove_matching(
        &self,
        predicate: impl Fn(&Task) -> bool,
        mut on_removed: impl FnMut(Task),
    ) -> usize {
        let mut removed = 0;
        for queue in &self.queues {
            let mut queue = queue.lock();
            let before = queue.len();
            let mut kept = VecDeque::with_capacity(before);
            for task in queue.drain(..) {
                if predicate(&task) {
                    on_removed(task);
                } else {
                    kept.push_back(task);
                }
            }
            removed += before - kept.len();
            *queue = kept;
        }
        removed
    }

    /// Empty every queue, dropping the tasks.
    pub(crate) fn clear(&self) {
        for queue in &self.queues {
            queue.lock().clear();
        }
    }
}
