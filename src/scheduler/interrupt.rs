/*!
 * Interrupt Level
 * Virtual interrupt mask, interrupt context flag and deferred timer ticks
 */

use super::{Inner, Kernel, StateGuard};
use serde::{Deserialize, Serialize};

/// Interrupt mask level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrLevel {
    /// Interrupts enabled
    On,
    /// Interrupts masked
    Off,
}

/// Processor interrupt state
#[derive(Debug)]
pub(crate) struct InterruptState {
    pub level: IntrLevel,
    /// True only while the timer handler runs
    pub in_context: bool,
    /// Ticks that arrived while masked, delivered when unmasked
    pub pending: u32,
    /// Yield requested by the handler, honoured on return
    pub yield_on_return: bool,
}

impl InterruptState {
    pub fn new() -> Self {
        Self {
            level: IntrLevel::On,
            in_context: false,
            pending: 0,
            yield_on_return: false,
        }
    }

    /// Mask interrupts, returning the previous level
    #[inline(always)]
    pub fn disable(&mut self) -> IntrLevel {
        std::mem::replace(&mut self.level, IntrLevel::Off)
    }
}

impl Inner {
    /// Restore `level`, delivering ticks that arrived while masked
    pub(crate) fn intr_set_level(&self, st: &mut StateGuard<'_>, level: IntrLevel) -> IntrLevel {
        let old = std::mem::replace(&mut st.intr.level, level);
        while st.intr.level == IntrLevel::On && !st.intr.in_context && st.intr.pending > 0 {
            st.intr.pending -= 1;
            self.timer_interrupt(st);
        }
        old
    }
}

impl Kernel {
    /// Current interrupt level
    pub fn intr_get_level(&self) -> IntrLevel {
        self.inner.enter().intr.level
    }

    /// Mask interrupts, returning the previous level
    pub fn intr_disable(&self) -> IntrLevel {
        self.inner.enter().intr.disable()
    }

    /// Unmask interrupts, returning the previous level
    pub fn intr_enable(&self) -> IntrLevel {
        self.intr_set_level(IntrLevel::On)
    }

    /// Set the interrupt level, returning the previous one
    pub fn intr_set_level(&self, level: IntrLevel) -> IntrLevel {
        let mut st = self.inner.enter();
        self.inner.intr_set_level(&mut st, level)
    }

    /// Whether the timer handler is running
    pub fn intr_context(&self) -> bool {
        self.inner.enter().intr.in_context
    }
}
