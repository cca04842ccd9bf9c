/*!
 * Lock-Free Scheduler Statistics
 * Atomic counters updated from the scheduler hot paths
 */

use super::stats::SchedulerStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic scheduler statistics
///
/// # Performance
/// - Cache-line aligned to prevent false sharing with the scheduler context
/// - All operations use relaxed ordering
/// - Readable from any host thread without entering the kernel
#[repr(C, align(64))]
pub struct AtomicSchedulerStats {
    idle_ticks: AtomicU64,
    kernel_ticks: AtomicU64,
    context_switches: AtomicU64,
    preemptions: AtomicU64,
    donations: AtomicU64,
    threads_created: AtomicU64,
    threads_reclaimed: AtomicU64,
}

impl AtomicSchedulerStats {
    #[inline]
    pub const fn new() -> Self {
        Self {
            idle_ticks: AtomicU64::new(0),
            kernel_ticks: AtomicU64::new(0),
            context_switches: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            donations: AtomicU64::new(0),
            threads_created: AtomicU64::new(0),
            threads_reclaimed: AtomicU64::new(0),
        }
    }

    /// Tick spent in the idle thread
    #[inline(always)]
    pub fn inc_idle_ticks(&self) {
        self.idle_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Tick spent in any other thread
    #[inline(always)]
    pub fn inc_kernel_ticks(&self) {
        self.kernel_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// # Performance
    /// Hot path - called on every switch between distinct threads
    #[inline(always)]
    pub fn inc_context_switches(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Time slice expiry forced a yield
    #[inline(always)]
    pub fn inc_preemptions(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Threads raised by one donation walk
    #[inline(always)]
    pub fn add_donations(&self, count: u32) {
        self.donations.fetch_add(u64::from(count), Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_created(&self) {
        self.threads_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_reclaimed(&self) {
        self.threads_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats (no locks required)
    ///
    /// # Note
    /// Counters are read independently and may be mutually inconsistent by a
    /// tick or two while the kernel runs.
    #[inline]
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            kernel_ticks: self.kernel_ticks.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            donations: self.donations.load(Ordering::Relaxed),
            threads_created: self.threads_created.load(Ordering::Relaxed),
            threads_reclaimed: self.threads_reclaimed.load(Ordering::Relaxed),
        }
    }
}

impl Default for AtomicSchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counters_snapshot() {
        let stats = AtomicSchedulerStats::new();
        stats.inc_idle_ticks();
        stats.inc_kernel_ticks();
        stats.inc_kernel_ticks();
        stats.add_donations(3);
        stats.inc_created();

        let snap = stats.snapshot();
        assert_eq!(snap.idle_ticks, 1);
        assert_eq!(snap.kernel_ticks, 2);
        assert_eq!(snap.donations, 3);
        assert_eq!(snap.threads_created, 1);
        assert_eq!(snap.threads_reclaimed, 0);
    }
}
