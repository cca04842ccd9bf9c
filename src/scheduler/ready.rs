/*!
 * Ready Queue
 * Single scanned list (priority mode) or per-priority FIFO buckets (MLFQS)
 */

use crate::core::config::SchedulerMode;
use crate::core::types::{Priority, Tid, PRI_LEVELS, PRI_MIN};
use crate::thread::Registry;
use std::collections::VecDeque;

/// Threads in the READY state
///
/// Priority mode keeps one unordered list and scans it for the first maximum
/// effective priority, so donations to queued threads apply without requeueing.
/// MLFQS keeps one FIFO per priority and is rebuilt whenever priorities are
/// recomputed.
pub(crate) enum ReadyQueue {
    Single(VecDeque<Tid>),
    Buckets(Box<[VecDeque<Tid>; PRI_LEVELS]>),
}

impl ReadyQueue {
    pub fn new(mode: SchedulerMode) -> Self {
        match mode {
            SchedulerMode::Priority => Self::Single(VecDeque::new()),
            SchedulerMode::Mlfqs => {
                Self::Buckets(Box::new(std::array::from_fn(|_| VecDeque::new())))
            }
        }
    }

    /// Enqueue at the back of its list (or of the bucket for `priority`)
    pub fn push(&mut self, tid: Tid, priority: Priority) {
        match self {
            Self::Single(queue) => queue.push_back(tid),
            Self::Buckets(buckets) => buckets[bucket_index(priority)].push_back(tid),
        }
    }

    /// Dequeue the oldest thread with the highest priority
    pub fn pop_next(&mut self, threads: &Registry) -> Option<Tid> {
        match self {
            Self::Single(queue) => {
                let (pos, _) = first_max(queue, threads)?;
                queue.remove(pos)
            }
            Self::Buckets(buckets) => buckets.iter_mut().rev().find_map(VecDeque::pop_front),
        }
    }

    /// Thread `pop_next` would return, without dequeuing it
    pub fn peek_next(&self, threads: &Registry) -> Option<Tid> {
        match self {
            Self::Single(queue) => first_max(queue, threads).map(|(pos, _)| queue[pos]),
            Self::Buckets(buckets) => buckets.iter().rev().find_map(|b| b.front().copied()),
        }
    }

    /// Highest effective priority among queued threads
    pub fn max_priority(&self, threads: &Registry) -> Option<Priority> {
        match self {
            Self::Single(queue) => first_max(queue, threads).map(|(_, p)| p),
            Self::Buckets(buckets) => buckets
                .iter()
                .rposition(|b| !b.is_empty())
                .map(|index| index as Priority + PRI_MIN),
        }
    }

    /// Re-file every queued thread under its current priority, keeping FIFO order
    /// among threads that land in the same bucket
    pub fn rebucket(&mut self, threads: &Registry) {
        if let Self::Buckets(buckets) = self {
            let queued: Vec<Tid> = buckets
                .iter_mut()
                .rev()
                .flat_map(|b| b.drain(..))
                .collect();
            for tid in queued {
                buckets[bucket_index(threads.priority(tid))].push_back(tid);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(queue) => queue.len(),
            Self::Buckets(buckets) => buckets.iter().map(VecDeque::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(queue) => queue.is_empty(),
            Self::Buckets(buckets) => buckets.iter().all(VecDeque::is_empty),
        }
    }

    /// Queued tids in selection order within each list
    pub fn tids(&self) -> Vec<Tid> {
        match self {
            Self::Single(queue) => queue.iter().copied().collect(),
            Self::Buckets(buckets) => buckets.iter().rev().flatten().copied().collect(),
        }
    }
}

#[inline(always)]
fn bucket_index(priority: Priority) -> usize {
    (priority - PRI_MIN) as usize
}

/// Position and priority of the first maximum; later equal entries lose the tie
fn first_max(queue: &VecDeque<Tid>, threads: &Registry) -> Option<(usize, Priority)> {
    let mut best: Option<(usize, Priority)> = None;
    for (pos, &tid) in queue.iter().enumerate() {
        let priority = threads.priority(tid);
        if best.map_or(true, |(_, p)| priority > p) {
            best = Some((pos, priority));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::Thread;
    use pretty_assertions::assert_eq;

    fn registry(priorities: &[(Tid, Priority)]) -> Registry {
        let mut registry = Registry::new();
        for &(tid, priority) in priorities {
            registry.insert(Thread::new(tid, "t", priority));
        }
        registry
    }

    fn fill(queue: &mut ReadyQueue, threads: &Registry, tids: &[Tid]) {
        for &tid in tids {
            queue.push(tid, threads.priority(tid));
        }
    }

    #[test]
    fn test_single_picks_highest() {
        let threads = registry(&[(1, 5), (2, 3), (3, 7)]);
        let mut queue = ReadyQueue::new(SchedulerMode::Priority);
        fill(&mut queue, &threads, &[1, 2, 3]);

        assert_eq!(queue.peek_next(&threads), Some(3));
        assert_eq!(queue.max_priority(&threads), Some(7));
        assert_eq!(queue.pop_next(&threads), Some(3));
        assert_eq!(queue.pop_next(&threads), Some(1));
        assert_eq!(queue.pop_next(&threads), Some(2));
        assert_eq!(queue.pop_next(&threads), None);
    }

    #[test]
    fn test_single_ties_go_to_oldest() {
        let threads = registry(&[(1, 9), (2, 9), (3, 9), (4, 2)]);
        let mut queue = ReadyQueue::new(SchedulerMode::Priority);
        fill(&mut queue, &threads, &[4, 2, 1, 3]);

        assert_eq!(queue.pop_next(&threads), Some(2));
        assert_eq!(queue.pop_next(&threads), Some(1));
        assert_eq!(queue.pop_next(&threads), Some(3));
        assert_eq!(queue.pop_next(&threads), Some(4));
    }

    #[test]
    fn test_single_sees_priority_changes() {
        let mut threads = registry(&[(1, 5), (2, 3)]);
        let mut queue = ReadyQueue::new(SchedulerMode::Priority);
        fill(&mut queue, &threads, &[1, 2]);

        // a donation to a queued thread applies without requeueing
        threads.thread_mut(2).priority = 8;
        assert_eq!(queue.peek_next(&threads), Some(2));
    }

    #[test]
    fn test_buckets_scan_high_to_low() {
        let threads = registry(&[(1, 10), (2, 63), (3, 10), (4, 0)]);
        let mut queue = ReadyQueue::new(SchedulerMode::Mlfqs);
        fill(&mut queue, &threads, &[1, 2, 3, 4]);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.max_priority(&threads), Some(63));
        assert_eq!(queue.tids(), vec![2, 1, 3, 4]);
        assert_eq!(queue.pop_next(&threads), Some(2));
        assert_eq!(queue.pop_next(&threads), Some(1));
        assert_eq!(queue.pop_next(&threads), Some(3));
        assert_eq!(queue.pop_next(&threads), Some(4));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rebucket_follows_new_priorities() {
        let mut threads = registry(&[(1, 30), (2, 30), (3, 20)]);
        let mut queue = ReadyQueue::new(SchedulerMode::Mlfqs);
        fill(&mut queue, &threads, &[1, 2, 3]);

        threads.thread_mut(1).priority = 10;
        threads.thread_mut(3).priority = 40;
        queue.rebucket(&threads);

        assert_eq!(queue.tids(), vec![3, 2, 1]);
        assert_eq!(queue.max_priority(&threads), Some(40));
    }
}
