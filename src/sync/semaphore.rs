/*!
 * Semaphore
 * Counting semaphore whose `down` blocks and whose `up` wakes every waiter
 */

use crate::core::types::{LockId, SemaId};
use crate::scheduler::{Inner, Kernel, StateGuard};
use std::fmt;
use tracing::trace;

impl Inner {
    /// P operation; `lock` names the lock being acquired, enabling donation
    pub(crate) fn sema_down(&self, st: &mut StateGuard<'_>, sema: SemaId, lock: Option<LockId>) {
        assert!(!st.intr.in_context, "semaphore down from interrupt context");
        let old = st.intr.disable();
        let cur = st.current;
        let lock = lock.filter(|_| st.donation_enabled());

        while st.sync.sema(sema).value == 0 {
            st.sync.sema_mut(sema).waiters.push_back(cur);

            let mut donee = None;
            if let Some(lock) = lock {
                st.threads.thread_mut(cur).locked_on = Some(lock);
                if let Some(holder) = st.sync.lock(lock).holder {
                    let priority = st.threads.priority(cur);
                    let raised = st.donate(holder, priority);
                    self.stats.add_donations(raised);
                    donee = Some(holder);
                }
            }

            self.block(st);

            // our donation may still be lifting the old holder
            if let Some(holder) = donee {
                let mine = st.threads.priority(cur);
                let lifted = st.threads.get(holder).map_or(false, |t| t.priority <= mine);
                if lifted {
                    st.refresh_donations(holder);
                }
            }
        }

        st.threads.thread_mut(cur).locked_on = None;
        st.sync.sema_mut(sema).value -= 1;
        self.intr_set_level(st, old);
    }

    /// P operation that never blocks
    pub(crate) fn sema_try_down(&self, st: &mut StateGuard<'_>, sema: SemaId) -> bool {
        let old = st.intr.disable();
        let state = st.sync.sema_mut(sema);
        let acquired = state.value > 0;
        if acquired {
            state.value -= 1;
        }
        self.intr_set_level(st, old);
        acquired
    }

    /// V operation: ready every waiter, then let priority pick who runs
    pub(crate) fn sema_up(&self, st: &mut StateGuard<'_>, sema: SemaId) {
        let old = st.intr.disable();
        let cur = st.current;
        let mut should_yield = false;

        while let Some(tid) = st.sync.sema_mut(sema).waiters.pop_front() {
            st.unblock(tid);
            trace!(tid, %sema, "Waiter woken");

            let me = st.threads.thread(cur);
            should_yield |= me.is_donated() && me.priority <= st.threads.priority(tid);
        }
        st.sync.sema_mut(sema).value += 1;

        if should_yield {
            if st.intr.in_context {
                st.intr.yield_on_return = true;
            } else {
                self.thread_yield(st);
            }
        } else {
            self.yield_if_needed(st);
        }
        self.intr_set_level(st, old);
    }
}

/// Counting semaphore
///
/// `up` makes every waiter ready rather than exactly one; waiters that lose the
/// race for the count block again. The handle is `Send + Sync` and is usually
/// shared through an `Arc`.
pub struct Semaphore {
    kernel: Kernel,
    id: SemaId,
}

impl Semaphore {
    /// New semaphore with `value` permits
    pub fn new(kernel: &Kernel, value: u32) -> Self {
        let mut st = kernel.inner.enter();
        let id = st.sync.create_sema(value);
        drop(st);
        Self {
            kernel: kernel.clone(),
            id,
        }
    }

    /// Wait for a permit, blocking while there is none
    pub fn down(&self) {
        let mut st = self.kernel.inner.enter();
        self.kernel.inner.sema_down(&mut st, self.id, None);
    }

    /// Take a permit if one is available
    pub fn try_down(&self) -> bool {
        let mut st = self.kernel.inner.enter();
        self.kernel.inner.sema_try_down(&mut st, self.id)
    }

    /// Release a permit and wake every waiter
    pub fn up(&self) {
        let mut st = self.kernel.inner.enter();
        self.kernel.inner.sema_up(&mut st, self.id);
    }

    pub fn value(&self) -> u32 {
        self.kernel.inner.enter().sync.sema(self.id).value
    }

    /// Threads blocked in `down`
    pub fn waiter_count(&self) -> usize {
        self.kernel.inner.enter().sync.sema(self.id).waiters.len()
    }

    pub fn id(&self) -> SemaId {
        self.id
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").field("id", &self.id).finish()
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // a semaphore with blocked waiters stays in the table
        self.kernel.inner.lock_state().sync.remove_sema(self.id);
    }
}
