//! Reference-counted frames for copy-on-write sharing.
//!
//! Every managed frame has a share count. A fresh allocation starts at 1;
//! each address space that maps the frame read-only adds a reference. `free`
//! drops one reference and returns the frame to its free list only when the
//! last one goes.
//!
//! Lock order: the count table lock, then at most one free-list lock.

use crate::addr::{Frame, FrameRange, PhysicalAddress};
use crate::cpu::Cpus;
use crate::frame_alloc::{FrameAllocator, KallocError};
use kernel_sync::{SpinLock, SpinLockGuard};

/// [`FrameAllocator`] with a share count per frame, for up to `NFRAME`
/// frames.
pub struct SharedFrameAllocator<C, const NCPU: usize, const NFRAME: usize> {
    frames: FrameAllocator<C, NCPU>,
    counts: SpinLock<[u32; NFRAME]>,
}

impl<C, const NCPU: usize, const NFRAME: usize> SharedFrameAllocator<C, NCPU, NFRAME>
where
    C: Cpus,
{
    /// # Safety
    /// As for [`FrameAllocator::new`].
    ///
    /// # Panics
    /// If the range holds more than `NFRAME` frames.
    pub unsafe fn new(cpus: C, start: *mut u8, end: *mut u8) -> Self {
        let frames = unsafe { FrameAllocator::new(cpus, start, end) };
        assert!(
            frames.total_frames() <= NFRAME,
            "kinit: {} frames exceed the share table",
            frames.total_frames()
        );
        Self {
            frames,
            counts: SpinLock::new([0; NFRAME], "kmem_count"),
        }
    }

    /// Allocate a frame with a share count of 1.
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] if no frame is free.
    pub fn alloc(&self) -> Result<Frame, KallocError> {
        self.lock_counts().alloc()
    }

    /// Drop one reference to `frame`; the last one frees it.
    ///
    /// # Panics
    /// `kfree` if the frame is not one of ours.
    pub fn free(&self, frame: Frame) {
        self.lock_counts().free(frame);
    }

    /// Add a reference to the frame at `pa`, returning the new count.
    ///
    /// # Panics
    /// `kref` if `pa` is not one of our frames.
    pub fn add_reference(&self, pa: PhysicalAddress) -> u32 {
        self.lock_counts().add_reference(pa)
    }

    /// Overwrite the share count of the frame at `pa`.
    ///
    /// # Panics
    /// `kref` if `pa` is not one of our frames.
    pub fn force_set(&self, pa: PhysicalAddress, count: u32) {
        self.lock_counts().force_set(pa, count);
    }

    /// Share count of the frame at `pa`.
    ///
    /// # Panics
    /// `kref` if `pa` is not one of our frames.
    pub fn count(&self, pa: PhysicalAddress) -> u32 {
        self.lock_counts().count(pa)
    }

    /// Make `frame` private to the caller before a write.
    ///
    /// A frame nobody else references is left alone. Otherwise the caller's
    /// reference moves to a fresh copy of the page, which replaces `frame`.
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] if a copy is needed and no frame is free;
    /// `frame` is unchanged in that case.
    pub fn unshare(&self, frame: &mut Frame) -> Result<(), KallocError> {
        self.lock_counts().unshare(frame)
    }

    /// Hold the count table across several operations.
    pub fn lock_counts(&self) -> ShareGuard<'_, C, NCPU, NFRAME> {
        ShareGuard {
            owner: self,
            counts: self.counts.lock(),
        }
    }

    /// Frames currently free, over all CPUs.
    pub fn free_frames(&self) -> usize {
        self.frames.free_frames()
    }

    /// Frames currently on `cpu`'s list.
    pub fn shard_len(&self, cpu: usize) -> usize {
        self.frames.shard_len(cpu)
    }

    /// Frames under management, free or not.
    pub const fn total_frames(&self) -> usize {
        self.frames.total_frames()
    }

    pub const fn range(&self) -> FrameRange {
        self.frames.range()
    }

    fn index(&self, pa: PhysicalAddress) -> usize {
        let Some(i) = self.frames.range().index_of(pa) else {
            panic!("kref: {pa:?} not managed");
        };
        i
    }
}

/// The share count table, locked.
///
/// Lets copy-on-write code read and update counts, allocate and free as one
/// atomic step.
pub struct ShareGuard<'a, C, const NCPU: usize, const NFRAME: usize> {
    owner: &'a SharedFrameAllocator<C, NCPU, NFRAME>,
    counts: SpinLockGuard<'a, [u32; NFRAME]>,
}

impl<C, const NCPU: usize, const NFRAME: usize> ShareGuard<'_, C, NCPU, NFRAME>
where
    C: Cpus,
{
    /// See [`SharedFrameAllocator::alloc`].
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] if no frame is free.
    pub fn alloc(&mut self) -> Result<Frame, KallocError> {
        let frames = &self.owner.frames;
        let run = frames
            .cpus()
            .with_current(|cpu| frames.take(cpu))
            .ok_or(KallocError::OutOfMemory)?;
        let frame = FrameAllocator::<C, NCPU>::prepare(run);

        let i = self.owner.index(frame.addr());
        self.counts[i] = 1;
        Ok(frame)
    }

    /// See [`SharedFrameAllocator::free`].
    pub fn free(&mut self, frame: Frame) {
        let Some(i) = self.owner.frames.range().index_of(frame.addr()) else {
            panic!("kfree");
        };

        let count = &mut self.counts[i];
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.owner.frames.free(frame);
        }
    }

    /// See [`SharedFrameAllocator::add_reference`].
    pub fn add_reference(&mut self, pa: PhysicalAddress) -> u32 {
        let i = self.owner.index(pa);
        self.counts[i] += 1;
        self.counts[i]
    }

    /// See [`SharedFrameAllocator::force_set`].
    pub fn force_set(&mut self, pa: PhysicalAddress, count: u32) {
        let i = self.owner.index(pa);
        self.counts[i] = count;
    }

    /// See [`SharedFrameAllocator::count`].
    pub fn count(&self, pa: PhysicalAddress) -> u32 {
        self.counts[self.owner.index(pa)]
    }

    /// See [`SharedFrameAllocator::unshare`].
    ///
    /// # Errors
    /// [`KallocError::OutOfMemory`] if a copy is needed and no frame is free.
    pub fn unshare(&mut self, frame: &mut Frame) -> Result<(), KallocError> {
        let i = self.owner.index(frame.addr());
        assert!(self.counts[i] > 0, "unshare: {frame:?} not allocated");
        if self.counts[i] == 1 {
            return Ok(());
        }

        let mut copy = self.alloc()?;
        copy.as_mut_slice().copy_from_slice(frame.as_slice());
        self.counts[i] -= 1;
        *frame = copy;
        Ok(())
    }
}
