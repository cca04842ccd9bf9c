/*!
 * Scheduler Core Operations
 * Create, exit, block, unblock, yield and priority operations
 */

use super::{on_spawned_thread, unwind_exit, Body, Inner, IntrLevel, Kernel, State, StateGuard};
use crate::core::errors::ThreadError;
use crate::core::types::{is_valid_priority, Priority, ThreadStatus, Tid};
use crate::thread::ThreadInfo;
use tracing::debug;

impl State {
    /// Move a BLOCKED thread to the ready structure; never preempts
    #[track_caller]
    pub(crate) fn unblock(&mut self, tid: Tid) {
        let thread = self.threads.thread_mut(tid);
        assert_eq!(
            thread.status,
            ThreadStatus::Blocked,
            "unblock of thread {} which is not blocked",
            tid
        );
        thread.status = ThreadStatus::Ready;
        let priority = thread.priority;
        if !self.is_idle(tid) {
            self.ready.push(tid, priority);
        }
    }

    /// Dequeue the next thread to run, or idle when nothing is ready
    pub(crate) fn next_thread_to_run(&mut self) -> Tid {
        match self.ready.pop_next(&self.threads) {
            Some(tid) => tid,
            None => match self.idle {
                Some(idle) => idle,
                None => panic!("no ready thread and no idle thread"),
            },
        }
    }

    /// Whether a ready thread should displace the running one
    pub(crate) fn preempt_needed(&self) -> bool {
        let cur = self.current;
        if self.is_idle(cur) {
            return !self.ready.is_empty();
        }
        match self.ready.max_priority(&self.threads) {
            Some(best) => best > self.threads.priority(cur),
            None => false,
        }
    }
}

impl Inner {
    /// Put the running thread to sleep until someone unblocks it
    #[track_caller]
    pub(crate) fn block(&self, st: &mut StateGuard<'_>) {
        assert!(!st.intr.in_context, "block from interrupt context");
        assert_eq!(st.intr.level, IntrLevel::Off, "block with interrupts enabled");
        let cur = st.current;
        st.threads.thread_mut(cur).status = ThreadStatus::Blocked;
        self.schedule(st);
    }

    /// Requeue the running thread and reschedule; it may be picked again
    pub(crate) fn thread_yield(&self, st: &mut StateGuard<'_>) {
        assert!(!st.intr.in_context, "yield from interrupt context");
        let cur = st.current;
        if st.is_idle(cur) {
            return;
        }

        let old = st.intr.disable();
        let thread = st.threads.thread_mut(cur);
        thread.status = ThreadStatus::Ready;
        let priority = thread.priority;
        st.ready.push(cur, priority);
        self.schedule(st);
        self.intr_set_level(st, old);
    }

    /// Yield if a ready thread outranks the running one
    ///
    /// From interrupt context the yield is deferred to the interrupt return.
    pub(crate) fn yield_if_needed(&self, st: &mut StateGuard<'_>) {
        if !st.preempt_needed() {
            return;
        }
        if st.intr.in_context {
            st.intr.yield_on_return = true;
        } else {
            self.thread_yield(st);
        }
    }
}

impl Kernel {
    /// Create a thread running `entry` and make it ready
    ///
    /// The creator yields at once if the new thread outranks it. In MLFQS mode
    /// `priority` is validated but replaced by the derived priority.
    pub fn create<F>(&self, name: &str, priority: Priority, entry: F) -> Result<Tid, ThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !is_valid_priority(priority) {
            return Err(ThreadError::InvalidPriority(priority));
        }

        let mut st = self.inner.enter();
        let spawned = self
            .inner
            .spawn(&mut st, name, priority, Body::Entry(Box::new(entry)));
        let tid = match spawned {
            Ok(tid) => tid,
            Err((err, body)) => {
                // the body may own handles whose drop takes the scheduler lock
                drop(st);
                drop(body);
                return Err(err);
            }
        };

        let old = st.intr.disable();
        st.unblock(tid);
        self.inner.yield_if_needed(&mut st);
        self.inner.intr_set_level(&mut st, old);
        Ok(tid)
    }

    /// Terminate the calling thread; never returns
    ///
    /// The body's stack unwinds first, then the thread is marked DYING and its
    /// record is reclaimed by whichever thread runs next. The initial thread
    /// cannot exit.
    pub fn exit(&self) -> ! {
        let st = self.inner.enter();
        assert!(!st.intr.in_context, "exit from interrupt context");
        assert!(
            on_spawned_thread(),
            "the initial thread {} cannot exit",
            st.current
        );
        drop(st);
        unwind_exit()
    }

    /// Tid of the running thread
    pub fn current(&self) -> Tid {
        self.inner.enter().current
    }

    /// Name of the running thread
    pub fn name(&self) -> String {
        let st = self.inner.enter();
        st.threads.thread(st.current).name.to_string()
    }

    /// Give up the CPU; the caller may be picked again straight away
    pub fn yield_now(&self) {
        let mut st = self.inner.enter();
        self.inner.thread_yield(&mut st);
    }

    /// Block the running thread until another thread unblocks it
    ///
    /// Interrupts must be off. The caller is responsible for recording itself
    /// somewhere a waker will find it.
    pub fn block(&self) {
        let mut st = self.inner.enter();
        self.inner.block(&mut st);
    }

    /// Make a BLOCKED thread ready without preempting the caller
    pub fn unblock(&self, tid: Tid) {
        let mut st = self.inner.enter();
        let old = st.intr.disable();
        st.unblock(tid);
        self.inner.intr_set_level(&mut st, old);
    }

    /// Set the running thread's base priority
    ///
    /// With donation active the effective priority only drops as far as the
    /// highest donor. Under MLFQS the value is overwritten at the next
    /// recomputation.
    pub fn set_priority(&self, priority: Priority) {
        assert!(
            is_valid_priority(priority),
            "priority {} out of range",
            priority
        );
        let mut st = self.inner.enter();
        let old = st.intr.disable();
        let cur = st.current;

        if st.donation_enabled() {
            let thread = st.threads.thread_mut(cur);
            thread.base_priority = priority;
            if thread.priority < priority {
                thread.priority = priority;
            } else {
                st.refresh_donations(cur);
            }
        } else {
            let thread = st.threads.thread_mut(cur);
            thread.base_priority = priority;
            thread.priority = priority;
        }
        debug!(
            tid = cur,
            base = priority,
            effective = st.threads.priority(cur),
            "Priority set"
        );

        self.inner.yield_if_needed(&mut st);
        self.inner.intr_set_level(&mut st, old);
    }

    /// Effective priority of the running thread
    pub fn get_priority(&self) -> Priority {
        let st = self.inner.enter();
        st.threads.priority(st.current)
    }

    /// Thread the scheduler would pick now, without dequeuing it
    pub fn next_to_run(&self) -> Tid {
        let st = self.inner.enter();
        match st.ready.peek_next(&st.threads) {
            Some(tid) => tid,
            None => st.idle.unwrap_or(st.current),
        }
    }

    /// Ready threads in queue order
    pub fn ready_threads(&self) -> Vec<Tid> {
        self.inner.enter().ready.tids()
    }

    /// Snapshot of one thread, `None` once it has been reclaimed
    pub fn thread_info(&self, tid: Tid) -> Option<ThreadInfo> {
        self.inner.enter().threads.get(tid).map(|t| t.info())
    }

    /// Snapshot of every live thread, in tid order
    pub fn threads(&self) -> Vec<ThreadInfo> {
        self.inner.enter().threads.live().map(|t| t.info()).collect()
    }

    /// Call `f` on a snapshot of every live thread
    pub fn for_each_thread<F: FnMut(&ThreadInfo)>(&self, mut f: F) {
        for info in self.threads() {
            f(&info);
        }
    }

    /// Tid of the idle thread
    pub fn idle_tid(&self) -> Tid {
        let st = self.inner.enter();
        st.idle.unwrap_or(st.current)
    }
}
