use crate::buf::{Buf, Slot};
use crate::device::{BlockDevice, BlockId, Transfer};
use crate::lru::Shard;
use crate::stats::CacheStats;
use core::fmt;
use core::hint::spin_loop;
use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_sync::{SpinLock, SpinLockGuard};
use log::{debug, trace};

/// The kernel's buffer cache over device `D`.
pub type Bcache<D> = BufferCache<D, { kernel_info::NBUF }, { kernel_info::NBUCKET }>;

/// Fixed pool of `NBUF` block buffers split into `NBUCKET` shards.
///
/// A block lives in shard `blockno % NBUCKET`. Each shard's lock guards the
/// identity, validity and reference count of its member buffers, so lookups
/// of blocks in different shards never contend. When a shard has no
/// unreferenced buffer left, a miss steals the least recently used free
/// buffer from another shard under the global `bsteal` lock.
///
/// The buffer contents are guarded by a per-buffer sleep lock, held by the
/// [`Buf`] handed out from [`get`](Self::get) and [`read`](Self::read).
/// Device I/O happens with only that lock held.
pub struct BufferCache<D, const NBUF: usize, const NBUCKET: usize> {
    device: D,
    slots: [Slot; NBUF],
    shards: [SpinLock<Shard>; NBUCKET],
    steal: SpinLock<()>,
    clock: AtomicU64,
    stats: CacheStats,
}

impl<D, const NBUF: usize, const NBUCKET: usize> BufferCache<D, NBUF, NBUCKET>
where
    D: BlockDevice,
{
    /// Builds the cache with every buffer unbound, dealt round-robin across
    /// the shards.
    pub fn new(device: D) -> Self {
        const {
            assert!(NBUCKET > 0, "buffer cache needs at least one shard");
            assert!(NBUF > 0, "buffer cache needs at least one buffer");
        }

        let slots: [Slot; NBUF] = core::array::from_fn(|i| Slot::new(i % NBUCKET));
        let mut shards: [SpinLock<Shard>; NBUCKET] =
            core::array::from_fn(|_| SpinLock::new(Shard::new(), "bcache"));
        for i in 0..NBUF {
            shards[i % NBUCKET].get_mut().push_front(&slots, i);
        }

        debug!("bcache: {NBUF} buffers in {NBUCKET} shards");

        Self {
            device,
            slots,
            shards,
            steal: SpinLock::new((), "bsteal"),
            clock: AtomicU64::new(0),
            stats: CacheStats::new(),
        }
    }

    /// Returns the locked buffer for `(dev, blockno)`, binding a buffer to it
    /// if it is not cached. The contents are only meaningful if
    /// [`Buf::is_valid`].
    ///
    /// Blocks until no other holder owns the buffer.
    ///
    /// # Panics
    /// `bget: no buffers` if every buffer is referenced, or `bget: reserved
    /// block id` for block `u32::MAX` of device `u32::MAX`.
    pub fn get(&self, dev: u32, blockno: u32) -> Buf<'_> {
        self.pool().get(BlockId::new(dev, blockno))
    }

    /// Returns the locked buffer for `(dev, blockno)` with the block's
    /// contents, reading it from the device on a miss.
    pub fn read(&self, dev: u32, blockno: u32) -> Buf<'_> {
        let mut b = self.get(dev, blockno);
        if !b.is_valid() {
            let block = b.block();
            self.device.transfer(block, &mut b, Transfer::Read);
            b.set_valid();
            self.stats.record_read();
        }
        b
    }

    /// Writes the buffer's contents to disk.
    ///
    /// # Panics
    /// `bwrite` if the buffer was handed out by a different cache.
    pub fn write(&self, b: &mut Buf<'_>) {
        assert!(self.owns(b), "bwrite");
        let block = b.block();
        self.device.transfer(block, b, Transfer::Write);
        b.set_valid();
        self.stats.record_write();
    }

    /// Releases the buffer's ownership lock and the caller's reference.
    ///
    /// Same as dropping `b`.
    ///
    /// # Panics
    /// `brelse` if the buffer was handed out by a different cache.
    pub fn release(&self, b: Buf<'_>) {
        assert!(self.owns(&b), "brelse");
        drop(b);
    }

    /// Takes an extra reference that keeps the buffer bound to its block
    /// after `b` is released.
    ///
    /// # Panics
    /// `bpin` if the buffer was handed out by a different cache.
    pub fn pin(&self, b: &Buf<'_>) {
        assert!(self.owns(b), "bpin");
        self.pool().pin(b.index());
    }

    /// Drops a reference taken with [`pin`](Self::pin).
    ///
    /// # Panics
    /// `bunpin` if the buffer holds no reference besides `b` itself, or was
    /// handed out by a different cache.
    pub fn unpin(&self, b: &Buf<'_>) {
        assert!(self.owns(b), "bunpin");
        self.pool().unpin(b.index());
    }

    /// Shard currently holding the buffer bound to `(dev, blockno)`.
    pub fn locate(&self, dev: u32, blockno: u32) -> Option<usize> {
        self.pool()
            .find(BlockId::new(dev, blockno))
            .map(|(shard, _)| shard)
    }

    /// Reference count of the buffer bound to `(dev, blockno)`.
    pub fn refcnt(&self, dev: u32, blockno: u32) -> Option<u32> {
        let pool = self.pool();
        pool.find(BlockId::new(dev, blockno))
            .map(|(_, i)| pool.slot(i).refcnt.load(Ordering::Relaxed))
    }

    /// Number of buffers currently in shard `shard`.
    ///
    /// # Panics
    /// If `shard >= NBUCKET`.
    pub fn shard_len(&self, shard: usize) -> usize {
        self.shards[shard].lock().len()
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub const fn device(&self) -> &D {
        &self.device
    }

    fn owns(&self, b: &Buf<'_>) -> bool {
        ptr::eq(b.pool().slots.as_ptr(), self.slots.as_ptr())
    }

    const fn pool(&self) -> Pool<'_> {
        Pool {
            slots: &self.slots,
            shards: &self.shards,
            steal: &self.steal,
            clock: &self.clock,
            stats: &self.stats,
        }
    }
}

impl<D, const NBUF: usize, const NBUCKET: usize> fmt::Debug for BufferCache<D, NBUF, NBUCKET> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferCache")
            .field("stats", &self.stats)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of a cache's bookkeeping, independent of the device and of
/// the pool dimensions. Every [`Buf`] carries one to release itself.
#[derive(Copy, Clone)]
pub struct Pool<'a> {
    slots: &'a [Slot],
    shards: &'a [SpinLock<Shard>],
    steal: &'a SpinLock<()>,
    clock: &'a AtomicU64,
    stats: &'a CacheStats,
}

impl<'a> Pool<'a> {
    pub fn slot(self, i: usize) -> &'a Slot {
        &self.slots[i]
    }

    fn now(self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn get(self, block: BlockId) -> Buf<'a> {
        let key = block.pack();
        assert_ne!(key, BlockId::UNBOUND, "bget: reserved block id {block:?}");

        let home = block.home(self.shards.len());
        let mut shard = self.shards[home].lock();

        let cached = shard
            .iter(self.slots)
            .find(|&i| self.slots[i].key.load(Ordering::Relaxed) == key);

        let index = if let Some(i) = cached {
            let s = &self.slots[i];
            s.refcnt.fetch_add(1, Ordering::Relaxed);
            s.tick.store(self.now(), Ordering::Relaxed);
            self.stats.record_hit();
            i
        } else {
            self.stats.record_miss();
            let i = match self.least_recent_free(&shard) {
                Some(i) => i,
                None => self.steal(home, &mut shard),
            };

            let s = &self.slots[i];
            if s.key.load(Ordering::Relaxed) != BlockId::UNBOUND {
                self.stats.record_eviction();
            }
            s.key.store(key, Ordering::Relaxed);
            s.valid.store(false, Ordering::Relaxed);
            s.refcnt.store(1, Ordering::Relaxed);
            s.tick.store(self.now(), Ordering::Relaxed);
            i
        };

        // The shard lock covers lookup through rebind, so a concurrent miss
        // for the same block finds this binding instead of making another.
        drop(shard);

        let data = self.slots[index].data.lock();
        Buf::new(self, index, block, data)
    }

    /// Unreferenced member of `shard` with the oldest tick.
    fn least_recent_free(self, shard: &Shard) -> Option<usize> {
        shard
            .iter_rev(self.slots)
            .filter(|&i| self.slots[i].refcnt.load(Ordering::Relaxed) == 0)
            .min_by_key(|&i| self.slots[i].tick.load(Ordering::Relaxed))
    }

    /// Moves the oldest unreferenced buffer of any other shard into `home`,
    /// whose lock the caller holds.
    fn steal(self, home: usize, shard: &mut SpinLockGuard<'_, Shard>) -> usize {
        let _steal = self.steal.lock();

        loop {
            let Some(victim) = self.oldest_free_elsewhere(home) else {
                panic!("bget: no buffers");
            };

            let s = &self.slots[victim];
            let from = s.shard.load(Ordering::Acquire);

            // The donor's holder may itself be waiting for a shard lock we
            // hold; never block on it.
            let Some(mut donor) = self.shards[from].try_lock() else {
                spin_loop();
                continue;
            };

            // Claimed or moved since the scan.
            if s.refcnt.load(Ordering::Relaxed) != 0 || s.shard.load(Ordering::Relaxed) != from {
                continue;
            }

            donor.unlink(self.slots, victim);
            s.shard.store(home, Ordering::Release);
            drop(donor);

            shard.push_front(self.slots, victim);
            self.stats.record_steal();
            trace!("bcache: stole buffer {victim} from shard {from} for shard {home}");
            return victim;
        }
    }

    /// Racy scan over all slots outside `home`; the result is re-checked under
    /// the donor's lock.
    fn oldest_free_elsewhere(self, home: usize) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.shard.load(Ordering::Acquire) != home && s.refcnt.load(Ordering::Acquire) == 0
            })
            .min_by_key(|(_, s)| s.tick.load(Ordering::Relaxed))
            .map(|(i, _)| i)
    }

    pub fn release(self, i: usize) {
        let s = &self.slots[i];
        // A referenced buffer is never stolen, so its shard is stable.
        let mut shard = self.shards[s.shard.load(Ordering::Acquire)].lock();
        if s.refcnt.fetch_sub(1, Ordering::Release) == 1 {
            shard.move_to_front(self.slots, i);
        }
    }

    fn pin(self, i: usize) {
        let s = &self.slots[i];
        let _shard = self.shards[s.shard.load(Ordering::Acquire)].lock();
        s.refcnt.fetch_add(1, Ordering::Relaxed);
    }

    fn unpin(self, i: usize) {
        let s = &self.slots[i];
        let _shard = self.shards[s.shard.load(Ordering::Acquire)].lock();
        assert!(s.refcnt.load(Ordering::Relaxed) > 1, "bunpin");
        s.refcnt.fetch_sub(1, Ordering::Release);
    }

    /// `(shard, slot)` of the buffer bound to `block`, locking one shard at a
    /// time.
    fn find(self, block: BlockId) -> Option<(usize, usize)> {
        let key = block.pack();
        self.shards.iter().enumerate().find_map(|(n, shard)| {
            let shard = shard.lock();
            shard
                .iter(self.slots)
                .find(|&i| self.slots[i].key.load(Ordering::Relaxed) == key)
                .map(|i| (n, i))
        })
    }
}
