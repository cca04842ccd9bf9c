/*!
 * Thread Control Block
 * Per-thread scheduling state and the registry of live threads
 */

mod registry;

pub(crate) use registry::Registry;

use crate::core::fixed_point::Fixed;
use crate::core::types::{LockId, Nice, Priority, ThreadStatus, Ticks, Tid, NICE_DEFAULT};
use serde::{Deserialize, Serialize};
use std::thread::JoinHandle;

/// Marks a live, uncorrupted thread record
pub(crate) const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Longest thread name kept, in bytes
pub const NAME_MAX: usize = 15;

/// Thread names fit inline, no allocation
pub type ThreadName = smartstring::alias::String;

/// Thread control block
pub(crate) struct Thread {
    pub tid: Tid,
    pub name: ThreadName,
    pub status: ThreadStatus,
    /// Priority set by the owner (or the MLFQS formula)
    pub base_priority: Priority,
    /// Effective priority, never below `base_priority`
    pub priority: Priority,
    pub nice: Nice,
    pub recent_cpu: Fixed,
    /// Valid only while on the sleep queue
    pub wake_tick: Option<Ticks>,
    /// Lock this thread is blocked acquiring, walked by donation
    pub locked_on: Option<LockId>,
    /// Locks currently held, most recently acquired first
    pub held_locks: Vec<LockId>,
    /// Backing host thread, detached when the record is reclaimed
    pub host: Option<JoinHandle<()>>,
    magic: u32,
}

impl Thread {
    /// New thread record in the BLOCKED state
    pub fn new(tid: Tid, name: &str, priority: Priority) -> Self {
        Self {
            tid,
            name: truncate_name(name),
            status: ThreadStatus::Blocked,
            base_priority: priority,
            priority,
            nice: NICE_DEFAULT,
            recent_cpu: Fixed::ZERO,
            wake_tick: None,
            locked_on: None,
            held_locks: Vec::new(),
            host: None,
            magic: THREAD_MAGIC,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.magic == THREAD_MAGIC
    }

    /// Whether a donation is currently raising this thread
    #[inline]
    pub fn is_donated(&self) -> bool {
        self.priority > self.base_priority
    }

    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            name: self.name.to_string(),
            status: self.status,
            base_priority: self.base_priority,
            priority: self.priority,
            nice: self.nice,
            recent_cpu: (self.recent_cpu * 100).round(),
            locked_on: self.locked_on,
            held_locks: self.held_locks.clone(),
            wake_tick: self.wake_tick,
        }
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("base_priority", &self.base_priority)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub name: String,
    pub status: ThreadStatus,
    pub base_priority: Priority,
    pub priority: Priority,
    pub nice: Nice,
    /// 100 times recent CPU, rounded
    pub recent_cpu: i32,
    pub locked_on: Option<LockId>,
    pub held_locks: Vec<LockId>,
    pub wake_tick: Option<Ticks>,
}

fn truncate_name(name: &str) -> ThreadName {
    let mut end = name.len().min(NAME_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    ThreadName::from(&name[..end])
}
