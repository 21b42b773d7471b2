//! The yield hook is process-global, so it gets its own test binary.

use kernel_sync::{SleepLock, relax};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

static YIELDS: AtomicUsize = AtomicUsize::new(0);

fn counting_yield() {
    YIELDS.fetch_add(1, Ordering::Relaxed);
    thread::yield_now();
}

#[test]
fn contended_sleep_lock_goes_through_the_hook() {
    assert!(!relax::is_installed());
    relax::install(counting_yield);
    assert!(relax::is_installed());

    let lock = Arc::new(SleepLock::new((), "hooked"));
    let ready = Arc::new(Barrier::new(2));

    let g = lock.lock();
    let waiter = {
        let lock = Arc::clone(&lock);
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            ready.wait();
            drop(lock.lock());
        })
    };
    ready.wait();

    while YIELDS.load(Ordering::Relaxed) == 0 {
        thread::yield_now();
    }
    drop(g);
    waiter.join().unwrap();

    assert!(YIELDS.load(Ordering::Relaxed) > 0);
}
