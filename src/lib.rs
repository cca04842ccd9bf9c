/*!
 * Kernel Thread Scheduler Library
 * Preemptive priority scheduling, priority donation, MLFQS and the
 * synchronization primitives built on them
 */

pub mod core;
pub mod monitoring;
pub mod scheduler;
pub mod selftest;
pub mod sync;
pub mod thread;
pub mod timer;

// Re-exports
pub use crate::core::{
    ConfigError, Fixed, KernelError, KernelResult, Nice, Priority, SchedConfig, SchedulerMode,
    ThreadError, ThreadStatus, Ticks, Tid, NICE_DEFAULT, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX,
    PRI_MIN,
};
pub use monitoring::init_tracing;
pub use scheduler::{IntrLevel, Kernel, SchedulerStats};
pub use sync::{Condition, Lock, Semaphore};
pub use thread::ThreadInfo;
