use crate::{RawLock, RawUnlock, relax};
use core::sync::atomic::{AtomicBool, Ordering};

/// Long-term lock: a contended acquire gives the CPU away between attempts.
///
/// The waiter may be suspended indefinitely; nothing here times out or
/// observes cancellation. Callers that need that check their own flags
/// between acquisitions.
pub struct RawSleep {
    held: AtomicBool,
}

impl Default for RawSleep {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSleep {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn lock(&self) {
        while !self.try_lock() {
            relax::yield_now();
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// # Safety
    /// The caller must hold the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl RawLock for RawSleep {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }

    fn raw_is_locked(&self) -> bool {
        self.is_locked()
    }
}

impl RawUnlock for RawSleep {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
