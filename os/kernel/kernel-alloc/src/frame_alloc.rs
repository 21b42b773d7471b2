//! Per-CPU physical frame allocator.

use crate::addr::{Frame, FrameRange, PhysicalAddress};
use crate::cpu::Cpus;
use crate::free_list::{FreeList, Run};
use core::ptr::NonNull;
use kernel_info::memory::{ALLOC_JUNK, FREE_JUNK, PGSIZE, page_round_down, page_round_up};
use kernel_sync::SpinLock;
use log::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KallocError {
    #[error("out of memory")]
    OutOfMemory,
}

/// Hands out the pages of one physical range, with a free list per CPU.
///
/// Frames are taken from and returned to the current CPU's list, so CPUs do
/// not contend in the common case. A CPU whose list is empty takes a frame
/// from the first non-empty list of another CPU, in ascending CPU order.
/// At most one list lock is held at any time.
///
/// A freed frame joins the list of the CPU that frees it, whichever list it
/// came from.
pub struct FrameAllocator<C, const NCPU: usize> {
    cpus: C,
    shards: [SpinLock<FreeList>; NCPU],
    range: FrameRange,
}

impl<C, const NCPU: usize> FrameAllocator<C, NCPU>
where
    C: Cpus,
{
    /// Manage every whole page in `[start, end)`, dealt round-robin across
    /// the CPUs.
    ///
    /// # Safety
    /// - `[start, end)` must be writable memory that nothing else uses for as
    ///   long as the allocator or any frame it hands out lives.
    /// - `end` must not lie before `start`.
    pub unsafe fn new(cpus: C, start: *mut u8, end: *mut u8) -> Self {
        const { assert!(NCPU > 0, "frame allocator needs at least one CPU") };

        let lo = page_round_up(start.addr() as u64);
        let hi = page_round_down(end.addr() as u64).max(lo);
        let range = FrameRange {
            start: PhysicalAddress::new(lo),
            end: PhysicalAddress::new(hi),
        };

        let this = Self {
            cpus,
            shards: core::array::from_fn(|_| SpinLock::new(FreeList::new(), "kmem")),
            range,
        };

        #[allow(clippy::cast_possible_truncation)]
        let first = start.wrapping_add((lo - start.addr() as u64) as usize);
        for i in 0..range.len() {
            // SAFETY: inside the caller-provided region, page-aligned.
            let ptr = unsafe { NonNull::new_unchecked(first.wrapping_add(i * PGSIZE)) };
            let frame = unsafe { Frame::from_ptr(ptr) };
            this.free_to(i % NCPU, frame);
        }

        debug!(
            "kalloc: {} frames in {}..{} over {NCPU} CPUs",
            range.len(),
            range.start,
            range.end
        );
        this
    }

    /// Allocate one frame, filled with [`ALLOC_JUNK`].
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] if every CPU's list is empty.
    pub fn alloc(&self) -> Result<Frame, KallocError> {
        let run = self
            .cpus
            .with_current(|cpu| self.take(cpu))
            .ok_or(KallocError::OutOfMemory)?;

        Ok(Self::prepare(run))
    }

    /// Return a frame to the current CPU's list, filled with [`FREE_JUNK`].
    ///
    /// # Panics
    /// `kfree` if the frame is not a page of this allocator's range.
    pub fn free(&self, frame: Frame) {
        self.cpus.with_current(|cpu| self.free_to(cpu, frame));
    }

    /// Frames currently free, over all CPUs.
    pub fn free_frames(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Frames currently on `cpu`'s list.
    pub fn shard_len(&self, cpu: usize) -> usize {
        self.shards[cpu].lock().len()
    }

    /// Frames under management, free or not.
    pub const fn total_frames(&self) -> usize {
        self.range.len()
    }

    pub const fn range(&self) -> FrameRange {
        self.range
    }

    /// Whether `frame` is one of ours; does not say whether it is free.
    pub fn owns(&self, frame: &Frame) -> bool {
        self.range.contains_frame(frame.addr())
    }

    pub(crate) const fn cpus(&self) -> &C {
        &self.cpus
    }

    /// Pop from `cpu`'s list, else from the other lists in ascending order.
    pub(crate) fn take(&self, cpu: usize) -> Option<NonNull<Run>> {
        if let Some(run) = self.shards[cpu].lock().pop() {
            return Some(run);
        }

        (0..NCPU).filter(|&other| other != cpu).find_map(|other| {
            let run = self.shards[other].lock().pop()?;
            trace!("kalloc: cpu {cpu} took a frame from cpu {other}");
            Some(run)
        })
    }

    pub(crate) fn free_to(&self, cpu: usize, mut frame: Frame) {
        assert!(self.owns(&frame), "kfree");

        // SAFETY: checked to be one of our pages; the caller gave up ownership.
        unsafe { frame.fill(FREE_JUNK) };
        let run = frame.into_ptr().cast::<Run>();
        unsafe { self.shards[cpu].lock().push(run) };
    }

    /// Hand out an already unlinked frame, filled with [`ALLOC_JUNK`].
    pub(crate) fn prepare(run: NonNull<Run>) -> Frame {
        // SAFETY: unlinked frames from our lists are ours to hand out.
        let mut frame = unsafe { Frame::from_ptr(run.cast()) };
        unsafe { frame.fill(ALLOC_JUNK) };
        frame
    }
}
