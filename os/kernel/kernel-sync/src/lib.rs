//! # Kernel synchronization primitives
//!
//! Both lock flavours share one [`Mutex`] front end and differ only in how a
//! contended acquire waits:
//!
//! * [`SpinLock`] busy-waits. Use it for short critical sections over shared
//!   bookkeeping (pool membership, reference counts, free-list heads). Never
//!   perform I/O or block while holding one.
//! * [`SleepLock`] gives the CPU away between attempts through the
//!   [`relax`] hook. Use it for long-held ownership of a resource, e.g. a disk
//!   block buffer held across a synchronous device transfer.
//!
//! Every lock carries a static name for diagnostics.

#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![allow(unsafe_code)]

mod mutex;
mod raw_sleep;
mod raw_spin;
pub mod relax;

pub use mutex::{Mutex, MutexGuard};
pub use raw_sleep::RawSleep;
pub use raw_spin::RawSpin;

pub type SpinLock<T> = Mutex<T, RawSpin>;
pub type SpinLockGuard<'a, T> = MutexGuard<'a, T, RawSpin>;

pub type SleepLock<T> = Mutex<T, RawSleep>;
pub type SleepLockGuard<'a, T> = MutexGuard<'a, T, RawSleep>;

impl<T> SpinLock<T> {
    pub const fn new(value: T, name: &'static str) -> Self {
        Self::from_raw(RawSpin::new(), value, name)
    }
}

impl<T> SleepLock<T> {
    pub const fn new(value: T, name: &'static str) -> Self {
        Self::from_raw(RawSleep::new(), value, name)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
    fn raw_is_locked(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must hold the lock.
    unsafe fn raw_unlock(&self);
}
