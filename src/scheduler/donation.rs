/*!
 * Priority Donation
 * Chain walks that raise lock holders and recompute effective priorities
 */

use super::State;
use crate::core::types::{Priority, Tid};
use tracing::debug;

impl State {
    /// Raise `holder` to `priority` and follow its `locked_on` chain
    ///
    /// Returns how many threads were raised. The walk visits at most as many
    /// threads as exist, so a cycle among deadlocked threads terminates.
    pub(crate) fn donate(&mut self, holder: Tid, priority: Priority) -> u32 {
        let mut raised = 0;
        let mut target = holder;

        for _ in 0..self.threads.len() {
            let thread = self.threads.thread_mut(target);
            if thread.priority >= priority {
                break;
            }
            thread.priority = priority;
            raised += 1;
            debug!(tid = target, priority, "Priority donated");

            let next = thread
                .locked_on
                .and_then(|lock| self.sync.lock(lock).holder);
            match next {
                Some(owner) => target = owner,
                None => break,
            }
        }
        raised
    }

    /// Recompute `tid`'s effective priority from its base and the waiters of
    /// every lock it holds, then carry a change up its own `locked_on` chain
    pub(crate) fn refresh_donations(&mut self, tid: Tid) {
        let mut target = tid;

        for _ in 0..self.threads.len() {
            let donated = self.max_donor_priority(target);
            let thread = self.threads.thread_mut(target);
            let recomputed = match donated {
                Some(p) if p > thread.base_priority => p,
                _ => thread.base_priority,
            };
            if recomputed == thread.priority {
                break;
            }
            thread.priority = recomputed;

            let next = thread
                .locked_on
                .and_then(|lock| self.sync.lock(lock).holder);
            match next {
                Some(owner) => target = owner,
                None => break,
            }
        }
    }

    /// Highest effective priority among threads waiting on locks `tid` holds
    fn max_donor_priority(&self, tid: Tid) -> Option<Priority> {
        let thread = self.threads.thread(tid);
        thread
            .held_locks
            .iter()
            .flat_map(|&lock| self.sync.sema(self.sync.lock(lock).sema).waiters.iter())
            .filter_map(|&waiter| self.threads.get(waiter).map(|t| t.priority))
            .max()
    }
}
