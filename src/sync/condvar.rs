/*!
 * Condition Variable
 * Mesa-style condition variable paired with a `Lock`
 */

use super::Lock;
use crate::core::types::{CondId, Priority};
use crate::scheduler::{Kernel, State};
use std::fmt;
use tracing::trace;

/// Condition variable
///
/// Each waiter blocks on a private semaphore. `signal` wakes the waiter with
/// the highest effective priority; `broadcast` wakes all of them in arrival
/// order. Woken waiters reacquire the lock before `wait` returns, so the
/// condition must be rechecked.
pub struct Condition {
    kernel: Kernel,
    id: CondId,
}

impl Condition {
    pub fn new(kernel: &Kernel) -> Self {
        let mut st = kernel.inner.enter();
        let id = st.sync.create_cond();
        drop(st);
        Self {
            kernel: kernel.clone(),
            id,
        }
    }

    /// Atomically release `lock` and wait to be signalled, then reacquire it
    pub fn wait(&self, lock: &Lock) {
        let inner = &self.kernel.inner;
        let mut st = inner.enter();
        assert!(!st.intr.in_context, "condition wait from interrupt context");
        assert_holds(&st, lock);

        let sema = st.sync.create_sema(0);
        st.sync.cond_mut(self.id).waiters.push_back(sema);
        inner.lock_release(&mut st, lock.id());
        inner.sema_down(&mut st, sema, None);
        inner.lock_acquire(&mut st, lock.id());
        st.sync.remove_sema(sema);
    }

    /// Wake the highest-priority waiter, if any
    pub fn signal(&self, lock: &Lock) {
        let inner = &self.kernel.inner;
        let mut st = inner.enter();
        assert!(!st.intr.in_context, "condition signal from interrupt context");
        assert_holds(&st, lock);

        if let Some(pos) = best_waiter(&st, self.id) {
            if let Some(sema) = st.sync.cond_mut(self.id).waiters.remove(pos) {
                trace!(cond = %self.id, %sema, "Condition signalled");
                inner.sema_up(&mut st, sema);
            }
        }
    }

    /// Wake every waiter
    pub fn broadcast(&self, lock: &Lock) {
        let inner = &self.kernel.inner;
        let mut st = inner.enter();
        assert!(!st.intr.in_context, "condition broadcast from interrupt context");
        assert_holds(&st, lock);

        while let Some(sema) = st.sync.cond_mut(self.id).waiters.pop_front() {
            inner.sema_up(&mut st, sema);
        }
    }

    /// Threads waiting to be signalled
    pub fn waiter_count(&self) -> usize {
        self.kernel.inner.enter().sync.cond(self.id).waiters.len()
    }

    pub fn id(&self) -> CondId {
        self.id
    }
}

#[track_caller]
fn assert_holds(st: &State, lock: &Lock) {
    assert_eq!(
        st.sync.lock(lock.id()).holder,
        Some(st.current),
        "condition used without holding {}",
        lock.id()
    );
}

/// Position of the waiter whose blocked thread has the highest priority
///
/// A private semaphore with nobody blocked on it yet ranks below every other;
/// ties go to the earliest waiter.
fn best_waiter(st: &State, cond: CondId) -> Option<usize> {
    let mut best: Option<(usize, Option<Priority>)> = None;
    for (pos, &sema) in st.sync.cond(cond).waiters.iter().enumerate() {
        let rank = st
            .sync
            .sema(sema)
            .waiters
            .iter()
            .map(|&tid| st.threads.priority(tid))
            .max();
        if best.map_or(true, |(_, top)| rank > top) {
            best = Some((pos, rank));
        }
    }
    best.map(|(pos, _)| pos)
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").field("id", &self.id).finish()
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        self.kernel.inner.lock_state().sync.remove_cond(self.id);
    }
}
