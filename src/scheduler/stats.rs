/*!
 * Scheduler Statistics
 */

use super::Kernel;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scheduler statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub idle_ticks: u64,
    pub kernel_ticks: u64,
    pub context_switches: u64,
    pub preemptions: u64,
    pub donations: u64,
    pub threads_created: u64,
    pub threads_reclaimed: u64,
}

impl SchedulerStats {
    /// Ticks delivered since boot
    pub fn total_ticks(&self) -> u64 {
        self.idle_ticks + self.kernel_ticks
    }
}

impl Kernel {
    /// Counters snapshot; callable from any host thread
    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.snapshot()
    }

    /// Log the tick breakdown
    pub fn print_stats(&self) {
        let stats = self.stats();
        info!(
            idle_ticks = stats.idle_ticks,
            kernel_ticks = stats.kernel_ticks,
            context_switches = stats.context_switches,
            "Thread: {} idle ticks, {} kernel ticks",
            stats.idle_ticks,
            stats.kernel_ticks
        );
    }
}
