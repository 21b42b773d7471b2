use core::ptr::NonNull;

/// Header written into the first bytes of every **free** frame.
///
/// ```text
/// +------------------+--------------------------------+
/// | Run (next link)  |  junk fill up to PGSIZE        |
/// +------------------+--------------------------------+
/// ^ frame base
/// ```
#[repr(C)]
pub(crate) struct Run {
    next: Option<NonNull<Run>>,
}

/// Intrusive LIFO list of free frames.
///
/// # Invariants
/// - Every linked frame is free, page-aligned and linked exactly once.
/// - `len` is the number of linked frames.
pub(crate) struct FreeList {
    head: Option<NonNull<Run>>,
    len: usize,
}

// Safety: The list is always used under a SpinLock; the links are only touched while locked.
unsafe impl Send for FreeList {}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Link a free frame.
    ///
    /// # Safety
    /// - `run` must point to a writable, suitably aligned free frame that is
    ///   not linked into any list.
    pub(crate) const unsafe fn push(&mut self, run: NonNull<Run>) {
        unsafe { run.as_ptr().write(Run { next: self.head }) };
        self.head = Some(run);
        self.len += 1;
    }

    /// Unlink the most recently pushed frame.
    pub(crate) fn pop(&mut self) -> Option<NonNull<Run>> {
        let run = self.head?;
        // SAFETY: linked frames hold a valid `Run` header.
        self.head = unsafe { run.as_ref().next };
        self.len -= 1;
        Some(run)
    }
}
