/*!
 * Core Types
 * Common types used across the kernel
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Thread identifier, allocated monotonically from 1
pub type Tid = u32;

/// Priority level (PRI_MIN..=PRI_MAX, higher is more important)
pub type Priority = i32;

/// Niceness level used by the MLFQS formulas
pub type Nice = i32;

/// Timer ticks since boot
pub type Ticks = i64;

/// Lowest priority
pub const PRI_MIN: Priority = 0;
/// Default priority for new threads
pub const PRI_DEFAULT: Priority = 31;
/// Highest priority
pub const PRI_MAX: Priority = 63;
/// Number of distinct priority levels
pub const PRI_LEVELS: usize = (PRI_MAX - PRI_MIN + 1) as usize;

/// Friendliest nice value
pub const NICE_MIN: Nice = -20;
/// Default nice value
pub const NICE_DEFAULT: Nice = 0;
/// Least friendly nice value
pub const NICE_MAX: Nice = 20;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// Whether a priority lies in `PRI_MIN..=PRI_MAX`
#[inline(always)]
pub const fn is_valid_priority(priority: Priority) -> bool {
    priority >= PRI_MIN && priority <= PRI_MAX
}

/// Whether a nice value lies in `NICE_MIN..=NICE_MAX`
#[inline(always)]
pub const fn is_valid_nice(nice: Nice) -> bool {
    nice >= NICE_MIN && nice <= NICE_MAX
}

/// Thread lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Running on the processor
    Running,
    /// Queued and waiting to be picked
    Ready,
    /// Waiting on a semaphore, lock, condition or the sleep queue
    Blocked,
    /// Exited; storage is reclaimed by the next thread scheduled
    Dying,
}

impl ThreadStatus {
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Dying => "dying",
        }
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Raw table index
            #[inline(always)]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

handle_id!(
    /// Handle of a semaphore in the scheduler's synchronization table
    SemaId,
    "sema#"
);
handle_id!(
    /// Handle of a lock in the scheduler's synchronization table
    LockId,
    "lock#"
);
handle_id!(
    /// Handle of a condition variable in the scheduler's synchronization table
    CondId,
    "cond#"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_bounds() {
        assert!(is_valid_priority(PRI_MIN));
        assert!(is_valid_priority(PRI_DEFAULT));
        assert!(is_valid_priority(PRI_MAX));
        assert!(!is_valid_priority(PRI_MIN - 1));
        assert!(!is_valid_priority(PRI_MAX + 1));
        assert_eq!(PRI_LEVELS, 64);
    }

    #[test]
    fn test_nice_bounds() {
        assert!(is_valid_nice(NICE_MIN));
        assert!(is_valid_nice(NICE_MAX));
        assert!(!is_valid_nice(21));
        assert!(!is_valid_nice(-21));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(LockId(7).to_string(), "lock#7");
        assert_eq!(SemaId(3).raw(), 3);
    }
}
