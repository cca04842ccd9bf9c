/*!
 * Kernel Thread Scheduler
 * Single-processor preemptive priority scheduler with donation and MLFQS
 *
 * Every kernel thread is backed by a host thread, but only the thread the
 * scheduler context names as current may run. The context lives behind one
 * mutex; holding it is the equivalent of running kernel code on the CPU.
 */

mod atomic_stats;
mod donation;
mod interrupt;
mod mlfqs;
mod operations;
mod ready;
mod stats;
mod switch;

pub use atomic_stats::AtomicSchedulerStats;
pub use interrupt::IntrLevel;
pub use mlfqs::{decay_recent_cpu, mlfqs_priority, next_load_avg};
pub use stats::SchedulerStats;

pub(crate) use interrupt::InterruptState;
pub(crate) use ready::ReadyQueue;
pub(crate) use switch::Cpu;

use crate::core::config::{SchedConfig, SchedulerMode};
use crate::core::errors::ThreadError;
use crate::core::fixed_point::Fixed;
use crate::core::types::{
    KernelResult, Priority, ThreadStatus, Ticks, Tid, PRI_DEFAULT, PRI_MAX, PRI_MIN,
};
use crate::sync::SyncTable;
use crate::monitoring::span_thread;
use crate::thread::{Registry, Thread, ThreadName};
use crate::timer::SleepQueue;
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

static NEXT_KERNEL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Kernel thread this host thread backs
    static SEAT: Cell<Option<Seat>> = const { Cell::new(None) };
}

#[derive(Debug, Clone, Copy)]
struct Seat {
    kernel: u64,
    tid: Tid,
    /// False for the thread that called `Kernel::boot`
    spawned: bool,
}

/// Unwind payload carrying a thread out of its body on `exit`
struct ThreadExit;

/// Unwind payload for spawned threads parked when the kernel halts
struct Halted;

/// Handle to a booted kernel
///
/// Cheap to clone; thread bodies capture a clone to call back into the scheduler.
#[derive(Clone)]
pub struct Kernel {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    id: u64,
    pub(crate) config: SchedConfig,
    state: Mutex<State>,
    cpu: Cpu,
    pub(crate) stats: AtomicSchedulerStats,
}

pub(crate) type StateGuard<'a> = MutexGuard<'a, State>;

/// What a new host thread runs once scheduled
pub(crate) enum Body {
    Idle,
    Entry(Box<dyn FnOnce() + Send + 'static>),
}

/// A rejected spawn hands the body back so the caller drops it after unlocking
pub(crate) type SpawnResult = Result<Tid, (ThreadError, Option<Body>)>;

/// Scheduler context: everything the timer handler and the primitives share
pub(crate) struct State {
    pub mode: SchedulerMode,
    pub threads: Registry,
    pub ready: ReadyQueue,
    pub sleepers: SleepQueue,
    pub sync: SyncTable,
    pub intr: InterruptState,
    pub current: Tid,
    pub initial: Tid,
    pub idle: Option<Tid>,
    /// Thread the current one was switched from, consumed by the schedule tail
    pub switched_from: Option<Tid>,
    pub ticks: Ticks,
    /// Ticks since the current thread was scheduled
    pub slice_ticks: u32,
    pub load_avg: Fixed,
    pub halted: Option<String>,
}

impl State {
    fn new(config: &SchedConfig) -> Self {
        Self {
            mode: config.mode,
            threads: Registry::new(),
            ready: ReadyQueue::new(config.mode),
            sleepers: SleepQueue::new(),
            sync: SyncTable::new(),
            intr: InterruptState::new(),
            current: 0,
            initial: 0,
            idle: None,
            switched_from: None,
            ticks: 0,
            slice_ticks: 0,
            load_avg: Fixed::ZERO,
            halted: None,
        }
    }

    #[inline(always)]
    pub fn is_idle(&self, tid: Tid) -> bool {
        self.idle == Some(tid)
    }

    #[inline(always)]
    pub fn donation_enabled(&self) -> bool {
        !self.mode.is_mlfqs()
    }
}

impl Kernel {
    /// Boot the scheduler on the calling host thread
    ///
    /// The caller becomes the initial thread `main` (tid 1) and the idle thread
    /// is created blocked. The kernel never shuts down.
    pub fn boot(config: SchedConfig) -> KernelResult<Self> {
        config.validate()?;

        let id = NEXT_KERNEL_ID.fetch_add(1, Ordering::Relaxed);
        let mut state = State::new(&config);

        let tid = state.threads.allocate_tid();
        let priority = if config.mode.is_mlfqs() {
            PRI_MAX
        } else {
            PRI_DEFAULT
        };
        let mut main = Thread::new(tid, "main", priority);
        main.status = ThreadStatus::Running;
        state.threads.insert(main);
        state.current = tid;
        state.initial = tid;

        let mode = config.mode;
        let time_slice = config.time_slice;
        let kernel = Self {
            inner: Arc::new(Inner {
                id,
                config,
                state: Mutex::new(state),
                cpu: Cpu::new(),
                stats: AtomicSchedulerStats::new(),
            }),
        };
        SEAT.with(|seat| {
            seat.set(Some(Seat {
                kernel: id,
                tid,
                spawned: false,
            }))
        });

        kernel.start()?;

        info!(
            kernel = id,
            mode = mode.as_str(),
            time_slice,
            "Kernel booted"
        );
        Ok(kernel)
    }

    /// Create the idle thread
    fn start(&self) -> KernelResult<()> {
        let mut st = self.inner.enter();
        let idle = self
            .inner
            .spawn(&mut st, "idle", PRI_MIN, Body::Idle)
            .map_err(|(err, _)| err)?;
        st.idle = Some(idle);
        Ok(())
    }

    /// Configuration the kernel booted with
    pub fn config(&self) -> &SchedConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> SchedulerMode {
        self.inner.config.mode
    }
}

impl Inner {
    /// Lock the scheduler context on behalf of the running kernel thread
    ///
    /// Calls from any other host thread, or on a corrupted record, are fatal.
    #[track_caller]
    pub(crate) fn enter(&self) -> StateGuard<'_> {
        let st = self.state.lock();
        if let Some(reason) = st.halted.clone() {
            drop(st);
            halt_unwind(&reason);
        }

        let seat = SEAT.with(Cell::get);
        let current = st.current;
        match seat {
            Some(seat) if seat.kernel == self.id && seat.tid == current => {}
            _ => {
                drop(st);
                panic!(
                    "kernel entered from {:?} while thread {} is running",
                    seat, current
                );
            }
        }

        let valid = st.threads.get(current).map_or(false, Thread::is_valid);
        assert!(valid, "thread {} failed its identity check", current);
        st
    }

    /// Lock the context without identity checks, for handle drops
    pub(crate) fn lock_state(&self) -> StateGuard<'_> {
        self.state.lock()
    }

    /// Allocate a thread record and its host thread; the record starts BLOCKED
    pub(crate) fn spawn(
        self: &Arc<Self>,
        st: &mut StateGuard<'_>,
        name: &str,
        priority: Priority,
        body: Body,
    ) -> SpawnResult {
        if st.threads.len() >= self.config.max_threads {
            let err = ThreadError::LimitReached {
                limit: self.config.max_threads,
            };
            return Err((err, Some(body)));
        }

        let tid = st.threads.allocate_tid();
        let mut thread = Thread::new(tid, name, priority);
        if st.mode.is_mlfqs() && matches!(body, Body::Entry(_)) {
            let creator = st.current;
            if !st.is_idle(creator) {
                let parent = st.threads.thread(creator);
                thread.nice = parent.nice;
                thread.recent_cpu = parent.recent_cpu;
            }
            let derived = mlfqs_priority(thread.recent_cpu, thread.nice);
            thread.base_priority = derived;
            thread.priority = derived;
        }
        st.threads.insert(thread);

        // the host thread takes the body from the slot; a failed spawn leaves it there
        let slot = Arc::new(Mutex::new(Some(body)));
        let handoff = Arc::clone(&slot);
        let inner = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name(format!("kthread-{}-{}", tid, name))
            .stack_size(self.config.stack_size)
            .spawn(move || {
                let body = handoff.lock().take();
                if let Some(body) = body {
                    inner.thread_main(tid, body);
                }
            });

        match spawned {
            Ok(handle) => {
                st.threads.thread_mut(tid).host = Some(handle);
                self.stats.inc_created();
                debug!(tid, name, priority = st.threads.priority(tid), "Thread created");
                Ok(tid)
            }
            Err(err) => {
                st.threads.remove(tid);
                let body = slot.lock().take();
                Err((ThreadError::CreationFailed(err.to_string()), body))
            }
        }
    }

    /// Host thread entry: wait to be scheduled, run the body, exit
    fn thread_main(self: Arc<Self>, tid: Tid, body: Body) {
        SEAT.with(|seat| {
            seat.set(Some(Seat {
                kernel: self.id,
                tid,
                spawned: true,
            }))
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let name = self.first_run(tid);
            let _span = span_thread(tid, &name).entered();
            match body {
                Body::Idle => self.idle_loop(),
                Body::Entry(entry) => entry(),
            }
        }));

        match outcome {
            Ok(()) => {}
            Err(payload) if payload.is::<ThreadExit>() => {}
            Err(payload) if payload.is::<Halted>() => return,
            Err(payload) => {
                let reason = format!("thread {} panicked: {}", tid, panic_message(&*payload));
                let mut st = self.state.lock();
                self.record_halt(&mut st, reason);
                return;
            }
        }

        self.exit_current(tid);
    }

    /// Schedule tail for a thread's first run; new threads start with interrupts on
    fn first_run(&self, tid: Tid) -> ThreadName {
        let mut st = self.state.lock();
        self.cpu.wait_for_turn(&mut st, tid);
        let prev = st.switched_from.take();
        self.schedule_tail(&mut st, prev);
        self.intr_set_level(&mut st, IntrLevel::On);
        st.threads.thread(tid).name.clone()
    }

    /// Mark the running thread DYING and hand off the CPU for good
    fn exit_current(&self, tid: Tid) {
        let mut st = self.state.lock();
        debug_assert_eq!(st.current, tid);
        st.intr.disable();

        let thread = st.threads.thread_mut(tid);
        if !thread.held_locks.is_empty() {
            tracing::warn!(tid, locks = ?thread.held_locks, "Thread exiting while holding locks");
        }
        thread.status = ThreadStatus::Dying;
        debug!(tid, "Thread exiting");

        self.schedule(&mut st);
    }

    /// Idle body: block, and when nothing else is ready, wait for the next tick
    fn idle_loop(&self) -> ! {
        let mut st = self.state.lock();
        loop {
            st.intr.disable();
            self.block(&mut st);
            self.halt_cpu(&mut st);
        }
    }

    /// The idle `hlt`: advance the virtual timer by one tick
    fn halt_cpu(&self, st: &mut StateGuard<'_>) {
        if st.sleepers.is_empty() && st.intr.pending == 0 {
            let reason = "deadlock: every thread is blocked and none is sleeping".to_string();
            self.record_halt(st, reason.clone());
            halt_unwind(&reason);
        }
        trace!(
            sleepers = st.sleepers.len(),
            next_wake = ?st.sleepers.next_wake(),
            "Idle halt"
        );
        self.intr_set_level(st, IntrLevel::On);
        self.timer_interrupt(st);
    }

    /// Stop the kernel: every parked thread observes the halt when woken
    pub(crate) fn record_halt(&self, st: &mut StateGuard<'_>, reason: String) {
        error!(reason = %reason, ticks = st.ticks, "Kernel halted");
        if st.halted.is_none() {
            st.halted = Some(reason);
        }
        self.cpu.wake_all();
    }
}

/// Leave the current host thread after a halt
#[cold]
pub(crate) fn halt_unwind(reason: &str) -> ! {
    let spawned = SEAT.with(|seat| seat.get().map_or(false, |s| s.spawned));
    if spawned {
        panic::resume_unwind(Box::new(Halted));
    }
    panic!("kernel halted: {}", reason)
}

/// Unwind out of a spawned thread's body
pub(crate) fn unwind_exit() -> ! {
    panic::resume_unwind(Box::new(ThreadExit))
}

/// Whether the calling host thread was spawned by the kernel
pub(crate) fn on_spawned_thread() -> bool {
    SEAT.with(|seat| seat.get().map_or(false, |s| s.spawned))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
