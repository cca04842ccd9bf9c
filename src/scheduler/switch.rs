/*!
 * Context Switch
 * Baton hand-off between host threads and the schedule tail
 */

use super::{halt_unwind, Inner, IntrLevel, StateGuard};
use crate::core::types::{ThreadStatus, Tid};
use parking_lot::Condvar;
use tracing::trace;

/// The single processor
///
/// Host threads not named current park on `baton` and recheck after every switch.
pub(crate) struct Cpu {
    baton: Condvar,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            baton: Condvar::new(),
        }
    }

    /// Switch from `from` to `to`
    ///
    /// Returns once `from` runs again, yielding the thread that switched back to
    /// it. A DYING `from` never runs again and returns immediately with `None`.
    pub fn switch_threads(&self, st: &mut StateGuard<'_>, from: Tid, to: Tid) -> Option<Tid> {
        st.current = to;
        st.switched_from = Some(from);
        self.baton.notify_all();

        if st.threads.status(from) == ThreadStatus::Dying {
            return None;
        }
        self.wait_for_turn(st, from);
        st.switched_from.take()
    }

    /// Park until `tid` is the current thread
    pub fn wait_for_turn(&self, st: &mut StateGuard<'_>, tid: Tid) {
        while st.current != tid {
            if let Some(reason) = st.halted.clone() {
                halt_unwind(&reason);
            }
            self.baton.wait(st);
        }
    }

    pub fn wake_all(&self) {
        self.baton.notify_all();
    }
}

impl Inner {
    /// Pick the next thread and switch to it; the caller has already left RUNNING
    pub(crate) fn schedule(&self, st: &mut StateGuard<'_>) {
        let cur = st.current;
        assert_eq!(
            st.intr.level,
            IntrLevel::Off,
            "schedule with interrupts enabled"
        );
        assert_ne!(
            st.threads.status(cur),
            ThreadStatus::Running,
            "schedule from a running thread"
        );

        let next = st.next_thread_to_run();
        if next == cur {
            self.schedule_tail(st, None);
            return;
        }

        trace!(from = cur, to = next, "Context switch");
        self.stats.inc_context_switches();
        let prev = self.cpu.switch_threads(st, cur, next);
        if st.current != cur {
            // exited
            return;
        }
        self.schedule_tail(st, prev);
    }

    /// Finish a switch on the resumed side
    ///
    /// Runs with interrupts off, before the resumed thread touches anything else.
    pub(crate) fn schedule_tail(&self, st: &mut StateGuard<'_>, prev: Option<Tid>) {
        let cur = st.current;
        st.threads.thread_mut(cur).status = ThreadStatus::Running;
        st.slice_ticks = 0;

        if let Some(prev) = prev {
            let dying = st
                .threads
                .get(prev)
                .map_or(false, |t| t.status == ThreadStatus::Dying);
            if dying && prev != st.initial {
                if let Some(thread) = st.threads.remove(prev) {
                    // the host thread is already past its last kernel call
                    drop(thread.host);
                    self.stats.inc_reclaimed();
                    trace!(tid = prev, "Reclaimed exited thread");
                }
            }
        }
    }
}
