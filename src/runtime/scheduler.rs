//! Priority-based frame queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A frame waiting to be processed.
#[derive(Debug, Clone, Copy)]
pub struct FrameTask {
    /// Linear frame index within the scan.
    pub frame_index: usize,
    /// Priority modifier (higher = more priority).
    pub priority_boost: i32,
}

impl FrameTask {
    pub fn new(frame_index: usize) -> Self {
        Self {
            frame_index,
            priority_boost: 0,
        }
    }

    pub fn with_priority(mut self, boost: i32) -> Self {
        self.priority_boost = boost;
        self
    }
}

// Higher boost first, then lower frame index first.
impl Eq for FrameTask {}

impl PartialEq for FrameTask {
    fn eq(&self, other: &Self) -> bool {
        self.frame_index == other.frame_index && self.priority_boost == other.priority_boost
    }
}

impl Ord for FrameTask {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority_boost.cmp(&other.priority_boost) {
            Ordering::Equal => other.frame_index.cmp(&self.frame_index),
            ord => ord,
        }
    }
}

impl PartialOrd for FrameTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Frame queue using a binary heap.
///
/// Frames come out in ascending order unless boosted, which lets an
/// interactive re-process jump ahead of a running scan. A worker that
/// finds the queue empty closes it; a closed queue refuses new tasks, so
/// nothing is enqueued after the last worker has gone.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    queue: BinaryHeap<FrameTask>,
    closed: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler holding every frame `0..n_total`.
    pub fn for_scan(n_total: usize) -> Self {
        Self {
            queue: (0..n_total).map(FrameTask::new).collect(),
            closed: false,
        }
    }

    /// Add a task. Returns `false` once the queue is closed.
    pub fn enqueue(&mut self, task: FrameTask) -> bool {
        if self.closed {
            return false;
        }
        self.queue.push(task);
        true
    }

    /// Pop the next task, closing the queue when it is empty.
    pub fn pop(&mut self) -> Option<FrameTask> {
        let task = self.queue.pop();
        if task.is_none() {
            self.closed = true;
        }
        task
    }

    /// Drop pending tasks and refuse new ones.
    pub fn close(&mut self) {
        self.queue.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
