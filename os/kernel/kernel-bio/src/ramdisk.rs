use crate::device::{BlockData, BlockDevice, BlockId, Transfer};
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_info::BSIZE;
use kernel_sync::SpinLock;

/// Memory-backed disk of `N` blocks.
///
/// Answers for every device number; the block number alone selects the
/// backing block. Transfers past the end are fatal.
pub struct RamDisk<const N: usize> {
    blocks: SpinLock<[BlockData; N]>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl<const N: usize> RamDisk<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blocks: SpinLock::new([[0; BSIZE]; N], "ramdisk"),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of blocks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Device reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Device writes served so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Copy of a block's contents, bypassing any cache.
    pub fn peek(&self, blockno: u32) -> BlockData {
        self.blocks.with_lock(|blocks| blocks[Self::index(blockno)])
    }

    /// Overwrite a block's contents, bypassing any cache.
    pub fn poke(&self, blockno: u32, data: &BlockData) {
        self.blocks
            .with_lock(|blocks| blocks[Self::index(blockno)] = *data);
    }

    fn index(blockno: u32) -> usize {
        let i = blockno as usize;
        assert!(i < N, "ramdisk: block {blockno} out of range");
        i
    }
}

impl<const N: usize> Default for RamDisk<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BlockDevice for RamDisk<N> {
    fn transfer(&self, block: BlockId, data: &mut BlockData, dir: Transfer) {
        let i = Self::index(block.blockno);
        let mut blocks = self.blocks.lock();
        match dir {
            Transfer::Read => {
                data.copy_from_slice(&blocks[i]);
                self.reads.fetch_add(1, Ordering::Relaxed);
            }
            Transfer::Write => {
                blocks[i].copy_from_slice(data);
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
