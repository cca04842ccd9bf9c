/*!
 * Lock
 * Single-owner binary semaphore with priority donation
 */

use crate::core::types::{LockId, Tid};
use crate::scheduler::{Inner, Kernel, StateGuard};
use std::fmt;

impl Inner {
    #[track_caller]
    pub(crate) fn lock_acquire(&self, st: &mut StateGuard<'_>, lock: LockId) {
        assert!(!st.intr.in_context, "lock acquire from interrupt context");
        let cur = st.current;
        assert_ne!(
            st.sync.lock(lock).holder,
            Some(cur),
            "thread {} already holds {}",
            cur,
            lock
        );

        let old = st.intr.disable();
        let sema = st.sync.lock(lock).sema;
        self.sema_down(st, sema, Some(lock));
        self.take_ownership(st, lock);
        self.intr_set_level(st, old);
    }

    pub(crate) fn lock_try_acquire(&self, st: &mut StateGuard<'_>, lock: LockId) -> bool {
        let cur = st.current;
        assert_ne!(
            st.sync.lock(lock).holder,
            Some(cur),
            "thread {} already holds {}",
            cur,
            lock
        );

        let old = st.intr.disable();
        let sema = st.sync.lock(lock).sema;
        let acquired = self.sema_try_down(st, sema);
        if acquired {
            self.take_ownership(st, lock);
        }
        self.intr_set_level(st, old);
        acquired
    }

    fn take_ownership(&self, st: &mut StateGuard<'_>, lock: LockId) {
        let cur = st.current;
        st.sync.lock_mut(lock).holder = Some(cur);
        if st.donation_enabled() {
            st.threads.thread_mut(cur).held_locks.insert(0, lock);
        }
    }

    #[track_caller]
    pub(crate) fn lock_release(&self, st: &mut StateGuard<'_>, lock: LockId) {
        let cur = st.current;
        assert_eq!(
            st.sync.lock(lock).holder,
            Some(cur),
            "thread {} releasing {} it does not hold",
            cur,
            lock
        );

        let old = st.intr.disable();
        st.sync.lock_mut(lock).holder = None;
        if st.donation_enabled() {
            st.threads.thread_mut(cur).held_locks.retain(|&held| held != lock);
            st.refresh_donations(cur);
        }
        let sema = st.sync.lock(lock).sema;
        self.sema_up(st, sema);
        self.intr_set_level(st, old);
    }
}

/// Mutual exclusion lock
///
/// Only the holder may release it, and a holder may not acquire it again.
/// While a thread waits for it the holder runs at no less than the waiter's
/// priority (except under MLFQS, where donation is off).
pub struct Lock {
    kernel: Kernel,
    id: LockId,
}

impl Lock {
    pub fn new(kernel: &Kernel) -> Self {
        let mut st = kernel.inner.enter();
        let id = st.sync.create_lock();
        drop(st);
        Self {
            kernel: kernel.clone(),
            id,
        }
    }

    /// Block until the lock is free, then take it
    pub fn acquire(&self) {
        let mut st = self.kernel.inner.enter();
        self.kernel.inner.lock_acquire(&mut st, self.id);
    }

    /// Take the lock if it is free
    pub fn try_acquire(&self) -> bool {
        let mut st = self.kernel.inner.enter();
        self.kernel.inner.lock_try_acquire(&mut st, self.id)
    }

    pub fn release(&self) {
        let mut st = self.kernel.inner.enter();
        self.kernel.inner.lock_release(&mut st, self.id);
    }

    pub fn held_by_current_thread(&self) -> bool {
        let st = self.kernel.inner.enter();
        st.sync.lock(self.id).holder == Some(st.current)
    }

    pub fn holder(&self) -> Option<Tid> {
        self.kernel.inner.enter().sync.lock(self.id).holder
    }

    pub fn id(&self) -> LockId {
        self.id
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock").field("id", &self.id).finish()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        self.kernel.inner.lock_state().sync.remove_lock(self.id);
    }
}
