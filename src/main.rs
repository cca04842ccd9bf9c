/*!
 * Kernel Thread Scheduler - Demo Entry Point
 *
 * Boots the scheduler on the main thread and exercises it:
 * - Semaphore self-test
 * - Priority donation through a contended lock
 * - Sleeping threads woken by the idle thread's timer
 */

use std::error::Error;
use std::sync::Arc;
use tracing::info;

use kthread_sched::selftest::sema_self_test;
use kthread_sched::{init_tracing, Kernel, Lock, SchedConfig, Semaphore, PRI_DEFAULT};

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = SchedConfig::from_env()?.apply_cmdline(std::env::args().skip(1))?;
    info!(mode = config.mode.as_str(), "Kernel thread scheduler starting...");

    let kernel = Kernel::boot(config)?;

    sema_self_test(&kernel)?;
    if !kernel.mode().is_mlfqs() {
        donation_demo(&kernel)?;
    }
    sleep_demo(&kernel)?;

    kernel.print_stats();
    println!("{}", serde_json::to_string_pretty(&kernel.stats())?);
    Ok(())
}

/// A low-priority holder is lifted by a high-priority waiter
fn donation_demo(kernel: &Kernel) -> Result<(), Box<dyn Error>> {
    let lock = Arc::new(Lock::new(kernel));
    lock.acquire();

    let waiter = {
        let k = kernel.clone();
        let lock = Arc::clone(&lock);
        kernel.create("donor", PRI_DEFAULT + 10, move || {
            lock.acquire();
            info!(priority = k.get_priority(), "Donor acquired the lock");
            lock.release();
        })?
    };

    info!(
        base = PRI_DEFAULT,
        effective = kernel.get_priority(),
        waiter,
        "Holder running with donated priority"
    );
    lock.release();
    info!(effective = kernel.get_priority(), "Holder back at base priority");
    Ok(())
}

/// Three sleepers wake in deadline order while main waits on them
fn sleep_demo(kernel: &Kernel) -> Result<(), Box<dyn Error>> {
    let done = Arc::new(Semaphore::new(kernel, 0));
    let start = kernel.ticks();

    for duration in [30i64, 10, 20] {
        let k = kernel.clone();
        let done = Arc::clone(&done);
        kernel.create(&format!("sleeper-{}", duration), PRI_DEFAULT, move || {
            k.sleep(duration);
            info!(duration, woke_at = k.ticks(), "Sleeper woke");
            done.up();
        })?;
    }
    for _ in 0..3 {
        done.down();
    }

    info!(elapsed = kernel.elapsed(start), "All sleepers finished");
    Ok(())
}
