/*!
 * MLFQS
 * Load average, recent CPU decay and derived priorities
 */

use super::{Kernel, State};
use crate::core::config::SchedConfig;
use crate::core::fixed_point::Fixed;
use crate::core::types::{is_valid_nice, Nice, Priority, ThreadStatus, Ticks, PRI_MAX, PRI_MIN};
use tracing::debug;

/// `PRI_MAX - recent_cpu/4 - nice*2`, rounded and clamped to the priority range
#[inline]
pub fn mlfqs_priority(recent_cpu: Fixed, nice: Nice) -> Priority {
    let raw = (Fixed::from_int(PRI_MAX) - recent_cpu / 4 - nice * 2).round();
    raw.clamp(PRI_MIN, PRI_MAX)
}

/// `recent_cpu * (2*load)/(2*load + 1) + nice`
#[inline]
pub fn decay_recent_cpu(recent_cpu: Fixed, load_avg: Fixed, nice: Nice) -> Fixed {
    let twice = load_avg * 2;
    let coefficient = twice / (twice + 1);
    coefficient * recent_cpu + nice
}

/// `(59/60)*load + (1/60)*ready`
#[inline]
pub fn next_load_avg(load_avg: Fixed, ready: i32) -> Fixed {
    let decay = Fixed::from_int(59) / Fixed::from_int(60);
    decay * load_avg + Fixed::from_int(ready) / 60
}

impl State {
    /// MLFQS bookkeeping for one timer tick, run from the handler
    pub(crate) fn mlfqs_tick(&mut self, config: &SchedConfig) {
        let cur = self.current;
        let running = !self.is_idle(cur) && self.threads.status(cur) == ThreadStatus::Running;
        if running {
            let thread = self.threads.thread_mut(cur);
            thread.recent_cpu = thread.recent_cpu + 1;
        }

        if self.ticks % Ticks::from(config.timer_freq) == 0 {
            let ready = self.ready.len() as i32 + i32::from(running);
            self.load_avg = next_load_avg(self.load_avg, ready);

            let load = self.load_avg;
            let idle = self.idle;
            for thread in self.threads.live_mut() {
                if Some(thread.tid) != idle {
                    thread.recent_cpu = decay_recent_cpu(thread.recent_cpu, load, thread.nice);
                }
            }
            debug!(ticks = self.ticks, load_avg = %load, ready, "Load average updated");
        }

        if self.ticks % Ticks::from(config.priority_interval) == 0 {
            self.recompute_priorities();
        }
    }

    /// Re-derive every thread's priority and re-file the ready threads
    fn recompute_priorities(&mut self) {
        let idle = self.idle;
        for thread in self.threads.live_mut() {
            if Some(thread.tid) != idle {
                let priority = mlfqs_priority(thread.recent_cpu, thread.nice);
                thread.base_priority = priority;
                thread.priority = priority;
            }
        }
        self.ready.rebucket(&self.threads);
    }
}

impl Kernel {
    /// Set the running thread's nice value
    ///
    /// Under MLFQS the caller's priority is re-derived at once and the caller
    /// yields if it no longer has the highest priority.
    pub fn set_nice(&self, nice: Nice) {
        assert!(is_valid_nice(nice), "nice {} out of range", nice);
        let mut st = self.inner.enter();
        let old = st.intr.disable();
        let cur = st.current;

        let mlfqs = st.mode.is_mlfqs();
        let thread = st.threads.thread_mut(cur);
        thread.nice = nice;
        if mlfqs {
            let priority = mlfqs_priority(thread.recent_cpu, nice);
            thread.base_priority = priority;
            thread.priority = priority;
            debug!(tid = cur, nice, priority, "Nice set");
        }

        self.inner.yield_if_needed(&mut st);
        self.inner.intr_set_level(&mut st, old);
    }

    /// Nice value of the running thread
    pub fn get_nice(&self) -> Nice {
        let st = self.inner.enter();
        st.threads.thread(st.current).nice
    }

    /// 100 times the system load average, rounded
    pub fn get_load_avg(&self) -> i32 {
        (self.inner.enter().load_avg * 100).round()
    }

    /// 100 times the running thread's recent CPU, rounded
    pub fn get_recent_cpu(&self) -> i32 {
        let st = self.inner.enter();
        (st.threads.thread(st.current).recent_cpu * 100).round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NICE_MAX, NICE_MIN};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_priority_formula() {
        assert_eq!(mlfqs_priority(Fixed::ZERO, 0), PRI_MAX);
        assert_eq!(mlfqs_priority(Fixed::ZERO, 5), 53);
        assert_eq!(mlfqs_priority(Fixed::from_int(40), 0), 53);
        assert_eq!(mlfqs_priority(Fixed::from_int(8), 0), 61);
        // 63 - 2.5 rounds away from zero
        assert_eq!(mlfqs_priority(Fixed::from_int(10), 0), 61);
    }

    #[test]
    fn test_priority_clamps() {
        assert_eq!(mlfqs_priority(Fixed::from_int(1000), NICE_MAX), PRI_MIN);
        assert_eq!(mlfqs_priority(Fixed::ZERO, NICE_MIN), PRI_MAX);
    }

    #[test]
    fn test_load_avg_one_second() {
        let load = next_load_avg(Fixed::ZERO, 1);
        assert_eq!((load * 100).round(), 2);

        let mut load = Fixed::ZERO;
        for _ in 0..600 {
            load = next_load_avg(load, 1);
        }
        // converges toward the ready count
        assert_eq!(load.round(), 1);
    }

    #[test]
    fn test_decay_with_idle_system() {
        let rc = decay_recent_cpu(Fixed::from_int(50), Fixed::ZERO, 3);
        assert_eq!(rc, Fixed::from_int(3));
    }

    #[test]
    fn test_decay_shrinks_under_light_load() {
        let load = Fixed::ONE;
        let rc = decay_recent_cpu(Fixed::from_int(90), load, 0);
        // 2/3 of 90
        assert_eq!(rc.round(), 60);
    }

    proptest! {
        #[test]
        fn prop_priority_non_increasing_in_recent_cpu(
            a in 0i32..20_000,
            b in 0i32..20_000,
            nice in NICE_MIN..=NICE_MAX,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = mlfqs_priority(Fixed::from_int(lo) / 100, nice);
            let p_hi = mlfqs_priority(Fixed::from_int(hi) / 100, nice);
            prop_assert!(p_hi <= p_lo);
        }

        #[test]
        fn prop_priority_in_range(rc in -5_000i32..50_000, nice in NICE_MIN..=NICE_MAX) {
            let p = mlfqs_priority(Fixed::from_int(rc) / 100, nice);
            prop_assert!((PRI_MIN..=PRI_MAX).contains(&p));
        }

        #[test]
        fn prop_decay_never_grows_without_nice(rc in 0i32..10_000, load in 0i32..64) {
            let recent = Fixed::from_int(rc);
            let decayed = decay_recent_cpu(recent, Fixed::from_int(load), 0);
            prop_assert!(decayed <= recent);
        }
    }
}
