//! # Waiting strategy for sleep locks
//!
//! A contended [`SleepLock`](crate::SleepLock) calls [`yield_now`] between
//! acquisition attempts. The scheduler installs its yield routine once at
//! boot with [`install`]; until then waiters spin. Hosted builds (feature
//! `std`) fall back to yielding the OS thread instead.

use core::ptr::null_mut;
use core::sync::atomic::{AtomicPtr, Ordering};

static HOOK: AtomicPtr<()> = AtomicPtr::new(null_mut());

/// Register the routine waiters call to give up the CPU.
pub fn install(hook: fn()) {
    HOOK.store(hook as *mut (), Ordering::Release);
}

/// Whether a scheduler hook has been registered.
#[must_use]
pub fn is_installed() -> bool {
    !HOOK.load(Ordering::Acquire).is_null()
}

/// Give the CPU away once.
#[inline]
pub fn yield_now() {
    let hook = HOOK.load(Ordering::Acquire);
    if hook.is_null() {
        fallback();
    } else {
        // SAFETY: only `install` stores into HOOK, and it stores a `fn()`.
        let hook = unsafe { core::mem::transmute::<*mut (), fn()>(hook) };
        hook();
    }
}

#[cfg(feature = "std")]
#[inline]
fn fallback() {
    std::thread::yield_now();
}

#[cfg(not(feature = "std"))]
#[inline]
fn fallback() {
    core::hint::spin_loop();
}
