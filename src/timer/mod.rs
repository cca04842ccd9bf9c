/*!
 * Timer
 * Virtual timer interrupt, tick accounting and sleep
 *
 * There is no wall clock. A running thread raises a timer interrupt with
 * `Kernel::tick`, and the idle thread raises one each time it runs, which is
 * how sleepers wake while every other thread is blocked.
 */

mod sleep_queue;

pub(crate) use sleep_queue::SleepQueue;

use crate::core::types::Ticks;
use crate::scheduler::{Inner, IntrLevel, Kernel, StateGuard};
use tracing::trace;

impl Inner {
    /// Deliver one timer interrupt
    ///
    /// Masked or nested interrupts are left pending. A yield requested by the
    /// handler happens after it returns, on the interrupted thread.
    pub(crate) fn timer_interrupt(&self, st: &mut StateGuard<'_>) {
        if st.intr.level == IntrLevel::Off || st.intr.in_context {
            st.intr.pending += 1;
            return;
        }

        st.intr.in_context = true;
        self.timer_handler(st);
        st.intr.in_context = false;

        if std::mem::take(&mut st.intr.yield_on_return) {
            self.thread_yield(st);
        }
    }

    fn timer_handler(&self, st: &mut StateGuard<'_>) {
        st.ticks += 1;
        let now = st.ticks;
        let idle = st.is_idle(st.current);
        if idle {
            self.stats.inc_idle_ticks();
        } else {
            self.stats.inc_kernel_ticks();
        }

        if st.mode.is_mlfqs() {
            st.mlfqs_tick(&self.config);
        }

        st.slice_ticks += 1;
        if st.slice_ticks >= self.config.time_slice {
            st.intr.yield_on_return = true;
            if !idle {
                self.stats.inc_preemptions();
            }
        }

        while let Some(tid) = st.sleepers.pop_due(now) {
            st.threads.thread_mut(tid).wake_tick = None;
            st.unblock(tid);
            trace!(tid, ticks = now, "Sleeper woken");
        }

        if st.preempt_needed() {
            st.intr.yield_on_return = true;
        }
    }
}

impl Kernel {
    /// Raise a timer interrupt on the running thread
    pub fn tick(&self) {
        let mut st = self.inner.enter();
        assert!(!st.intr.in_context, "tick from interrupt context");
        self.inner.timer_interrupt(&mut st);
    }

    /// Ticks since boot
    pub fn ticks(&self) -> Ticks {
        self.inner.enter().ticks
    }

    /// Ticks elapsed since `then`, a value returned by `ticks`
    pub fn elapsed(&self, then: Ticks) -> Ticks {
        self.ticks() - then
    }

    /// Block the running thread for at least `ticks` timer ticks
    ///
    /// Zero or negative durations return at once. Interrupts must be on.
    pub fn sleep(&self, ticks: Ticks) {
        if ticks <= 0 {
            return;
        }

        let mut st = self.inner.enter();
        assert!(!st.intr.in_context, "sleep from interrupt context");
        assert_eq!(st.intr.level, IntrLevel::On, "sleep with interrupts disabled");

        let old = st.intr.disable();
        let cur = st.current;
        let wake = st.ticks.saturating_add(ticks);
        st.threads.thread_mut(cur).wake_tick = Some(wake);
        st.sleepers.insert(cur, wake);
        trace!(tid = cur, wake, "Thread sleeping");

        self.inner.block(&mut st);
        self.inner.intr_set_level(&mut st, old);
    }
}
