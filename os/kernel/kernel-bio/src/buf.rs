use crate::cache::Pool;
use crate::device::{BlockData, BlockId};
use crate::lru::NIL;
use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use kernel_info::BSIZE;
use kernel_sync::{SleepLock, SleepLockGuard};

/// One buffer slot of the cache.
///
/// Everything except `data` is guarded by the lock of the shard the slot
/// currently belongs to; the fields are atomics only so that diagnostics can
/// peek without taking that lock. `data` is guarded by its own sleep lock,
/// which is what a [`Buf`] holds.
pub struct Slot {
    /// Packed [`BlockId`], or [`BlockId::UNBOUND`].
    pub key: AtomicU64,
    pub refcnt: AtomicU32,
    /// Clock value of the last lookup hit or rebind.
    pub tick: AtomicU64,
    /// Index of the owning shard.
    pub shard: AtomicUsize,
    /// Contents reflect the disk.
    pub valid: AtomicBool,
    pub prev: AtomicUsize,
    pub next: AtomicUsize,
    pub data: SleepLock<BlockData>,
}

impl Slot {
    pub const fn new(shard: usize) -> Self {
        Self {
            key: AtomicU64::new(BlockId::UNBOUND),
            refcnt: AtomicU32::new(0),
            tick: AtomicU64::new(0),
            shard: AtomicUsize::new(shard),
            valid: AtomicBool::new(false),
            prev: AtomicUsize::new(NIL),
            next: AtomicUsize::new(NIL),
            data: SleepLock::new([0; BSIZE], "buffer"),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("block", &BlockId::unpack(self.key.load(Ordering::Relaxed)))
            .field("refcnt", &self.refcnt.load(Ordering::Relaxed))
            .field("shard", &self.shard.load(Ordering::Relaxed))
            .field("valid", &self.valid.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A locked buffer.
///
/// Holding a `Buf` means holding the buffer's ownership lock and one of its
/// references. Dropping it releases both, which is `brelse`.
pub struct Buf<'a> {
    pool: Pool<'a>,
    index: usize,
    block: BlockId,
    data: ManuallyDrop<SleepLockGuard<'a, BlockData>>,
}

impl<'a> Buf<'a> {
    pub(crate) const fn new(
        pool: Pool<'a>,
        index: usize,
        block: BlockId,
        data: SleepLockGuard<'a, BlockData>,
    ) -> Self {
        Self {
            pool,
            index,
            block,
            data: ManuallyDrop::new(data),
        }
    }

    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    #[must_use]
    pub const fn dev(&self) -> u32 {
        self.block.dev
    }

    #[must_use]
    pub const fn blockno(&self) -> u32 {
        self.block.blockno
    }

    /// Whether the contents have been read from, or written to, the disk.
    pub fn is_valid(&self) -> bool {
        self.slot().valid.load(Ordering::Relaxed)
    }

    pub(crate) fn set_valid(&self) {
        self.slot().valid.store(true, Ordering::Relaxed);
    }

    pub(crate) const fn pool(&self) -> Pool<'a> {
        self.pool
    }

    pub(crate) const fn index(&self) -> usize {
        self.index
    }

    fn slot(&self) -> &Slot {
        self.pool.slot(self.index)
    }
}

impl Deref for Buf<'_> {
    type Target = BlockData;

    fn deref(&self) -> &BlockData {
        &self.data
    }
}

impl DerefMut for Buf<'_> {
    fn deref_mut(&mut self) -> &mut BlockData {
        &mut self.data
    }
}

impl Drop for Buf<'_> {
    fn drop(&mut self) {
        // SAFETY: dropped exactly once, here; `data` is not touched afterwards.
        unsafe { ManuallyDrop::drop(&mut self.data) };
        self.pool.release(self.index);
    }
}

impl fmt::Debug for Buf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("block", &self.block)
            .field("slot", &self.index)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}
