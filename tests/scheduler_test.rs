/*!
 * Scheduler Tests
 * Thread lifecycle, priority selection, time slicing and contract checks
 */

use kthread_sched::{
    Kernel, Lock, SchedConfig, Semaphore, ThreadError, ThreadStatus, Tid, PRI_DEFAULT,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn boot() -> Kernel {
    Kernel::boot(SchedConfig::default()).unwrap()
}

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Thread body that records `label` and exits
fn record(log: &Log, label: &str) -> impl FnOnce() + Send + 'static {
    let log = Arc::clone(log);
    let label = label.to_string();
    move || log.lock().push(label)
}

#[test]
fn test_boot_makes_caller_main() {
    let kernel = boot();

    assert_eq!(kernel.current(), 1);
    assert_eq!(kernel.name(), "main");
    assert_eq!(kernel.get_priority(), PRI_DEFAULT);
    assert_eq!(kernel.idle_tid(), 2);

    let threads = kernel.threads();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].status, ThreadStatus::Running);
    assert_eq!(threads[1].name, "idle");
    assert_eq!(threads[1].status, ThreadStatus::Blocked);
    assert!(kernel.ready_threads().is_empty());
}

#[test]
fn test_higher_priority_create_preempts() {
    let kernel = boot();
    let log = log();

    kernel
        .create("high", PRI_DEFAULT + 9, record(&log, "high"))
        .unwrap();
    log.lock().push("main".into());

    assert_eq!(*log.lock(), vec!["high", "main"]);
}

#[test]
fn test_lower_priority_waits_for_block() {
    let kernel = boot();
    let log = log();
    let done = Arc::new(Semaphore::new(&kernel, 0));

    {
        let log = Arc::clone(&log);
        let done = Arc::clone(&done);
        kernel
            .create("low", 10, move || {
                log.lock().push("low".into());
                done.up();
            })
            .unwrap();
    }
    kernel.yield_now();
    log.lock().push("main".into());
    done.down();

    assert_eq!(*log.lock(), vec!["main", "low"]);
}

#[test]
fn test_ready_threads_run_by_priority() {
    let kernel = boot();
    let log = log();

    kernel.create("p5", 5, record(&log, "p5")).unwrap();
    kernel.create("p3", 3, record(&log, "p3")).unwrap();
    let p7 = kernel.create("p7", 7, record(&log, "p7")).unwrap();

    assert_eq!(kernel.next_to_run(), p7);
    assert_eq!(kernel.ready_threads().len(), 3);

    // dropping below every ready thread hands them the CPU
    kernel.set_priority(0);

    assert_eq!(*log.lock(), vec!["p7", "p5", "p3"]);
    assert_eq!(kernel.next_to_run(), kernel.idle_tid());
}

#[test]
fn test_equal_priority_is_fifo() {
    let kernel = boot();
    let log = log();

    for name in ["first", "second", "third"] {
        kernel.create(name, PRI_DEFAULT, record(&log, name)).unwrap();
    }
    assert!(log.lock().is_empty());

    kernel.yield_now();
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn test_time_slice_forces_yield() {
    let kernel = boot();
    let log = log();

    kernel
        .create("peer", PRI_DEFAULT, record(&log, "peer"))
        .unwrap();

    for _ in 0..3 {
        kernel.tick();
    }
    assert!(log.lock().is_empty());

    kernel.tick();
    assert_eq!(*log.lock(), vec!["peer"]);
    assert_eq!(kernel.ticks(), 4);
    assert!(kernel.stats().preemptions >= 1);
}

#[test]
fn test_exited_thread_is_reclaimed() {
    let kernel = boot();
    let log = log();

    let tid = kernel
        .create("short", PRI_DEFAULT + 1, record(&log, "short"))
        .unwrap();

    assert_eq!(*log.lock(), vec!["short"]);
    assert_eq!(kernel.thread_info(tid), None);

    let stats = kernel.stats();
    assert_eq!(stats.threads_created, 2);
    assert_eq!(stats.threads_reclaimed, 1);
    assert!(stats.context_switches >= 2);
}

#[test]
fn test_exit_unwinds_body() {
    struct Flag(Arc<AtomicBool>);

    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let kernel = boot();
    let dropped = Arc::new(AtomicBool::new(false));
    let reached_end = Arc::new(AtomicBool::new(false));

    {
        let k = kernel.clone();
        let flag = Flag(Arc::clone(&dropped));
        let reached_end = Arc::clone(&reached_end);
        kernel
            .create("quitter", PRI_DEFAULT + 1, move || {
                let _flag = flag;
                if k.current() > 0 {
                    k.exit();
                }
                reached_end.store(true, Ordering::SeqCst);
            })
            .unwrap();
    }

    assert!(dropped.load(Ordering::SeqCst));
    assert!(!reached_end.load(Ordering::SeqCst));
    assert_eq!(kernel.threads().len(), 2);
}

#[test]
fn test_tids_increase_monotonically() {
    let kernel = boot();
    let tids: Vec<Tid> = (0..4)
        .map(|_| kernel.create("t", PRI_DEFAULT + 1, || {}).unwrap())
        .collect();

    assert_eq!(tids, vec![3, 4, 5, 6]);
}

#[test]
fn test_invalid_priority_rejected() {
    let kernel = boot();

    assert_eq!(
        kernel.create("bad", 64, || {}),
        Err(ThreadError::InvalidPriority(64))
    );
    assert_eq!(
        kernel.create("bad", -1, || {}),
        Err(ThreadError::InvalidPriority(-1))
    );
    assert_eq!(kernel.threads().len(), 2);
}

#[test]
fn test_thread_limit() {
    let config = SchedConfig {
        max_threads: 3,
        ..SchedConfig::default()
    };
    let kernel = Kernel::boot(config).unwrap();

    kernel.create("fits", 10, || {}).unwrap();
    assert_eq!(
        kernel.create("extra", 10, || {}),
        Err(ThreadError::LimitReached { limit: 3 })
    );
    assert_eq!(kernel.threads().len(), 3);
}

#[test]
fn test_rejected_body_drops_its_handles() {
    let config = SchedConfig {
        max_threads: 3,
        ..SchedConfig::default()
    };
    let kernel = Kernel::boot(config).unwrap();
    kernel.create("fits", 10, || {}).unwrap();

    let owned = Semaphore::new(&kernel, 0);
    let held = Lock::new(&kernel);
    let result = kernel.create("extra", 10, move || {
        held.acquire();
        owned.up();
    });
    assert_eq!(result, Err(ThreadError::LimitReached { limit: 3 }));

    // the scheduler is still usable after the rejected body was dropped
    let sema = Semaphore::new(&kernel, 1);
    sema.down();
    sema.up();
    assert_eq!(sema.value(), 1);
    assert_eq!(kernel.threads().len(), 3);
}

#[test]
fn test_block_and_unblock() {
    let kernel = boot();
    let log = log();

    let tid = {
        let k = kernel.clone();
        let log = Arc::clone(&log);
        kernel
            .create("sleeper", PRI_DEFAULT + 9, move || {
                let old = k.intr_disable();
                k.block();
                k.intr_set_level(old);
                log.lock().push("resumed".into());
            })
            .unwrap()
    };

    let info = kernel.thread_info(tid).unwrap();
    assert_eq!(info.status, ThreadStatus::Blocked);

    // unblock never preempts the caller
    kernel.unblock(tid);
    assert!(log.lock().is_empty());
    assert_eq!(kernel.thread_info(tid).unwrap().status, ThreadStatus::Ready);

    kernel.yield_now();
    assert_eq!(*log.lock(), vec!["resumed"]);
}

#[test]
fn test_long_names_are_truncated() {
    let kernel = boot();
    let tid = kernel
        .create("a-very-long-thread-name", 10, || {})
        .unwrap();

    assert_eq!(kernel.thread_info(tid).unwrap().name, "a-very-long-thr");
}

#[test]
fn test_thread_info_serializes() {
    let kernel = boot();
    let info = kernel.thread_info(kernel.current()).unwrap();
    let json = serde_json::to_value(&info).unwrap();

    assert_eq!(json["status"], "running");
    assert_eq!(json["priority"], PRI_DEFAULT);
    assert_eq!(json["locked_on"], serde_json::Value::Null);
}

#[test]
fn test_for_each_thread_visits_live_threads() {
    let kernel = boot();
    kernel.create("ready", 10, || {}).unwrap();

    let mut names = Vec::new();
    kernel.for_each_thread(|info| names.push(info.name.clone()));
    assert_eq!(names, vec!["main", "idle", "ready"]);
}

#[test]
fn test_call_from_foreign_thread_is_fatal() {
    let kernel = boot();
    let k = kernel.clone();

    let outcome = std::thread::spawn(move || k.current()).join();
    assert!(outcome.is_err());
    assert_eq!(kernel.current(), 1);
}

#[test]
#[should_panic(expected = "already holds")]
fn test_recursive_acquire_is_fatal() {
    let kernel = boot();
    let lock = Lock::new(&kernel);
    lock.acquire();
    lock.acquire();
}

#[test]
#[should_panic(expected = "does not hold")]
fn test_release_by_non_holder_is_fatal() {
    let kernel = boot();
    let lock = Lock::new(&kernel);
    lock.release();
}

#[test]
#[should_panic(expected = "cannot exit")]
fn test_initial_thread_cannot_exit() {
    let kernel = boot();
    kernel.exit();
}

#[test]
#[should_panic(expected = "deadlock")]
fn test_everyone_blocked_halts() {
    let kernel = boot();
    let never = Semaphore::new(&kernel, 0);
    never.down();
}

#[test]
#[should_panic(expected = "boom")]
fn test_panicking_thread_halts_kernel() {
    let kernel = boot();
    kernel
        .create("crasher", PRI_DEFAULT + 1, || panic!("boom"))
        .unwrap();
}

#[test]
fn test_stats_snapshot_serializes() {
    let kernel = boot();
    kernel.tick();

    let stats = kernel.stats();
    assert_eq!(stats.kernel_ticks, 1);
    assert_eq!(stats.total_ticks(), 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["kernel_ticks"], 1);
    assert!(json.get("context_switches").is_some());
}
