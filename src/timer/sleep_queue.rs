/*!
 * Sleep Queue
 * Blocked threads ordered by wake tick
 */

use crate::core::types::{Ticks, Tid};
use std::collections::VecDeque;

/// Sleeping threads sorted by ascending wake tick, FIFO among equal ticks
#[derive(Debug, Default)]
pub(crate) struct SleepQueue {
    entries: VecDeque<(Ticks, Tid)>,
}

impl SleepQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every sleeper due at or before `wake`
    pub fn insert(&mut self, tid: Tid, wake: Ticks) {
        let pos = self.entries.partition_point(|&(at, _)| at <= wake);
        self.entries.insert(pos, (wake, tid));
    }

    /// Pop the earliest sleeper if it is due at `now`
    #[inline]
    pub fn pop_due(&mut self, now: Ticks) -> Option<Tid> {
        match self.entries.front() {
            Some(&(wake, _)) if wake <= now => self.entries.pop_front().map(|(_, tid)| tid),
            _ => None,
        }
    }

    /// Earliest wake tick, if anyone sleeps
    pub fn next_wake(&self) -> Option<Ticks> {
        self.entries.front().map(|&(wake, _)| wake)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
