/*!
 * Synchronization Primitives
 * Semaphores, locks and condition variables built on the scheduler
 *
 * The primitives' state lives in tables inside the scheduler context so that
 * wakeups and donation see it under the same critical section. The public
 * types are handles into those tables.
 */

mod condvar;
mod lock;
mod semaphore;

pub use condvar::Condition;
pub use lock::Lock;
pub use semaphore::Semaphore;

use crate::core::types::{CondId, LockId, SemaId, Tid};
use ahash::HashMap;
use std::collections::VecDeque;

/// Counting semaphore state
#[derive(Debug, Default)]
pub(crate) struct SemaState {
    pub value: u32,
    /// Blocked threads in arrival order
    pub waiters: VecDeque<Tid>,
}

/// Lock state; the lock is a binary semaphore plus an owner
#[derive(Debug)]
pub(crate) struct LockState {
    pub holder: Option<Tid>,
    pub sema: SemaId,
}

/// Condition variable state: one private semaphore per waiter
#[derive(Debug, Default)]
pub(crate) struct CondState {
    pub waiters: VecDeque<SemaId>,
}

/// Every live semaphore, lock and condition variable
#[derive(Debug, Default)]
pub(crate) struct SyncTable {
    semas: HashMap<SemaId, SemaState>,
    locks: HashMap<LockId, LockState>,
    conds: HashMap<CondId, CondState>,
    next_id: u64,
}

impl SyncTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_sema(&mut self, value: u32) -> SemaId {
        let id = SemaId(self.allocate());
        self.semas.insert(
            id,
            SemaState {
                value,
                waiters: VecDeque::new(),
            },
        );
        id
    }

    /// New unowned lock backed by a semaphore of value 1
    pub fn create_lock(&mut self) -> LockId {
        let sema = self.create_sema(1);
        let id = LockId(self.allocate());
        self.locks.insert(id, LockState { holder: None, sema });
        id
    }

    pub fn create_cond(&mut self) -> CondId {
        let id = CondId(self.allocate());
        self.conds.insert(id, CondState::default());
        id
    }

    #[inline]
    #[track_caller]
    pub fn sema(&self, id: SemaId) -> &SemaState {
        match self.semas.get(&id) {
            Some(s) => s,
            None => panic!("{} is not in the synchronization table", id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn sema_mut(&mut self, id: SemaId) -> &mut SemaState {
        match self.semas.get_mut(&id) {
            Some(s) => s,
            None => panic!("{} is not in the synchronization table", id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn lock(&self, id: LockId) -> &LockState {
        match self.locks.get(&id) {
            Some(l) => l,
            None => panic!("{} is not in the synchronization table", id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn lock_mut(&mut self, id: LockId) -> &mut LockState {
        match self.locks.get_mut(&id) {
            Some(l) => l,
            None => panic!("{} is not in the synchronization table", id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn cond(&self, id: CondId) -> &CondState {
        match self.conds.get(&id) {
            Some(c) => c,
            None => panic!("{} is not in the synchronization table", id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn cond_mut(&mut self, id: CondId) -> &mut CondState {
        match self.conds.get_mut(&id) {
            Some(c) => c,
            None => panic!("{} is not in the synchronization table", id),
        }
    }

    /// Free a semaphore nobody waits on; returns whether it was freed
    pub fn remove_sema(&mut self, id: SemaId) -> bool {
        match self.semas.get(&id) {
            Some(s) if s.waiters.is_empty() => self.semas.remove(&id).is_some(),
            _ => false,
        }
    }

    /// Free an unowned, uncontended lock and its semaphore
    pub fn remove_lock(&mut self, id: LockId) -> bool {
        let sema = match self.locks.get(&id) {
            Some(l) if l.holder.is_none() => l.sema,
            _ => return false,
        };
        if !self.remove_sema(sema) {
            return false;
        }
        self.locks.remove(&id).is_some()
    }

    /// Free a condition variable nobody waits on
    pub fn remove_cond(&mut self, id: CondId) -> bool {
        match self.conds.get(&id) {
            Some(c) if c.waiters.is_empty() => self.conds.remove(&id).is_some(),
            _ => false,
        }
    }

    /// Live entries, for leak checks
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.semas.len() + self.locks.len() + self.conds.len()
    }
}
