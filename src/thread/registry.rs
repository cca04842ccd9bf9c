/*!
 * Thread Registry
 * Arena of thread records addressed by tid
 */

use super::Thread;
use crate::core::types::{Priority, ThreadStatus, Tid};
use std::collections::BTreeMap;

/// Owns every thread record, including DYING ones awaiting reclamation
pub(crate) struct Registry {
    threads: BTreeMap<Tid, Thread>,
    next_tid: Tid,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            threads: BTreeMap::new(),
            next_tid: 1,
        }
    }

    /// Next unused tid
    pub fn allocate_tid(&mut self) -> Tid {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }

    pub fn insert(&mut self, thread: Thread) {
        self.threads.insert(thread.tid, thread);
    }

    pub fn remove(&mut self, tid: Tid) -> Option<Thread> {
        self.threads.remove(&tid)
    }

    #[inline]
    pub fn get(&self, tid: Tid) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    /// Record for a tid the scheduler is tracking; a missing one means corrupted bookkeeping
    #[inline]
    #[track_caller]
    pub fn thread(&self, tid: Tid) -> &Thread {
        match self.threads.get(&tid) {
            Some(t) => t,
            None => missing(tid),
        }
    }

    #[inline]
    #[track_caller]
    pub fn thread_mut(&mut self, tid: Tid) -> &mut Thread {
        match self.threads.get_mut(&tid) {
            Some(t) => t,
            None => missing(tid),
        }
    }

    #[inline]
    #[track_caller]
    pub fn priority(&self, tid: Tid) -> Priority {
        self.thread(tid).priority
    }

    #[inline]
    #[track_caller]
    pub fn status(&self, tid: Tid) -> ThreadStatus {
        self.thread(tid).status
    }

    /// Records of all threads, including DYING ones
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Threads that have not exited, in tid order
    pub fn live(&self) -> impl Iterator<Item = &Thread> {
        self.threads
            .values()
            .filter(|t| t.status != ThreadStatus::Dying)
    }

    /// Mutable view of threads that have not exited
    pub fn live_mut(&mut self) -> impl Iterator<Item = &mut Thread> {
        self.threads
            .values_mut()
            .filter(|t| t.status != ThreadStatus::Dying)
    }
}

#[cold]
#[track_caller]
fn missing(tid: Tid) -> ! {
    panic!("thread {} is not in the registry", tid)
}
