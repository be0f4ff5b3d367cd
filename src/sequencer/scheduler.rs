// Scheduler - arena of cancellable deferred actions
// Every timer the transport starts lives here so a stop can cancel them as a set.

use crate::pads::PadId;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Handle to a scheduled task, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskAction {
    /// Trigger one pattern hit belonging to playback cycle `cycle`
    PlayHit { pad_id: PadId, cycle: u64 },
    /// Metronome beat number `beat_index` of the current run
    MetronomeTick { beat_index: u64 },
    /// Count-in beat `index` (0-based)
    CountInBeat { index: u32 },
    /// Count-in finished, hand over to recording
    CountInComplete,
    /// End of playback cycle `cycle`
    CycleEnd { cycle: u64 },
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    handle: TaskHandle,
    due_ms: f64,
    action: TaskAction,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest due first, then earliest scheduled
        other
            .due_ms
            .total_cmp(&self.due_ms)
            .then_with(|| other.handle.cmp(&self.handle))
    }
}

/// Due task returned by [`TimerArena::pop_due`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTask {
    pub due_ms: f64,
    pub action: TaskAction,
}

/// Pending timers ordered by due time, then by scheduling order
///
/// Cancelled tasks stay in the heap until they reach the top and are skipped.
#[derive(Debug, Default)]
pub struct TimerArena {
    heap: BinaryHeap<ScheduledTask>,
    pending: HashSet<TaskHandle>,
    next_id: u64,
}

impl TimerArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire at absolute time `due_ms`
    pub fn schedule(&mut self, due_ms: f64, action: TaskAction) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.heap.push(ScheduledTask {
            handle,
            due_ms,
            action,
        });
        self.pending.insert(handle);
        handle
    }

    /// Cancel one task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.pending.remove(&handle)
    }

    /// Cancel everything
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.heap.clear();
        cancelled
    }

    /// Remove and return the earliest task due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: f64) -> Option<FiredTask> {
        while let Some(top) = self.heap.peek() {
            if !self.pending.contains(&top.handle) {
                self.heap.pop();
                continue;
            }
            if top.due_ms > now_ms {
                return None;
            }
            let task = self.heap.pop()?;
            self.pending.remove(&task.handle);
            return Some(FiredTask {
                due_ms: task.due_ms,
                action: task.action,
            });
        }
        None
    }

    /// Due time of the next pending task
    pub fn next_due(&self) -> Option<f64> {
        self.heap
            .iter()
            .filter(|task| self.pending.contains(&task.handle))
            .map(|task| task.due_ms)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
