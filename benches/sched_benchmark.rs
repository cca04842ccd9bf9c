/*!
 * Scheduler Benchmarks
 *
 * Hand-off latency of the semaphore and lock through the scheduler baton
 */

use criterion::{criterion_group, criterion_main, Criterion};
use kthread_sched::{Kernel, Lock, SchedConfig, Semaphore, PRI_DEFAULT};
use std::sync::Arc;

fn bench_sema_ping_pong(c: &mut Criterion) {
    let kernel = Kernel::boot(SchedConfig::default()).unwrap();
    let ping = Arc::new(Semaphore::new(&kernel, 0));
    let pong = Arc::new(Semaphore::new(&kernel, 0));

    {
        let ping = Arc::clone(&ping);
        let pong = Arc::clone(&pong);
        kernel
            .create("ponger", PRI_DEFAULT, move || loop {
                ping.down();
                pong.up();
            })
            .unwrap();
    }

    c.bench_function("sema_ping_pong", |b| {
        b.iter(|| {
            ping.up();
            pong.down();
        })
    });
}

fn bench_lock_uncontended(c: &mut Criterion) {
    let kernel = Kernel::boot(SchedConfig::default()).unwrap();
    let lock = Lock::new(&kernel);

    c.bench_function("lock_uncontended", |b| {
        b.iter(|| {
            lock.acquire();
            lock.release();
        })
    });
}

fn bench_lock_handoff_with_donation(c: &mut Criterion) {
    let kernel = Kernel::boot(SchedConfig::default()).unwrap();
    let lock = Arc::new(Lock::new(&kernel));
    let go = Arc::new(Semaphore::new(&kernel, 0));

    {
        let lock = Arc::clone(&lock);
        let go = Arc::clone(&go);
        kernel
            .create("contender", PRI_DEFAULT + 1, move || loop {
                go.down();
                lock.acquire();
                lock.release();
            })
            .unwrap();
    }

    c.bench_function("lock_handoff_with_donation", |b| {
        b.iter(|| {
            lock.acquire();
            go.up();
            lock.release();
        })
    });
}

criterion_group!(
    benches,
    bench_sema_ping_pong,
    bench_lock_uncontended,
    bench_lock_handoff_with_donation
);
criterion_main!(benches);
