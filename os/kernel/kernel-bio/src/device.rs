//! Block device contract consumed by the buffer cache.

use core::fmt;
use kernel_info::BSIZE;

/// Payload of one disk block.
pub type BlockData = [u8; BSIZE];

/// Identity of a disk block: `(device, block number)`.
///
/// Device number `u32::MAX` is reserved; together with block `u32::MAX` it
/// encodes an unbound buffer slot.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub dev: u32,
    pub blockno: u32,
}

impl BlockId {
    pub(crate) const UNBOUND: u64 = u64::MAX;

    #[inline]
    #[must_use]
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }

    /// Shard this block hashes to in a cache of `shards` shards.
    #[inline]
    #[must_use]
    pub const fn home(self, shards: usize) -> usize {
        self.blockno as usize % shards
    }

    #[inline]
    pub(crate) const fn pack(self) -> u64 {
        ((self.dev as u64) << 32) | self.blockno as u64
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn unpack(key: u64) -> Option<Self> {
        if key == Self::UNBOUND {
            None
        } else {
            Some(Self::new((key >> 32) as u32, key as u32))
        }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({}:{})", self.dev, self.blockno)
    }
}

/// Direction of a block transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Disk to memory.
    Read,
    /// Memory to disk.
    Write,
}

/// A synchronous block device.
///
/// `transfer` returns once the block has been read into, or written from,
/// `data`. The cache calls it with the buffer's ownership lock held and no
/// shard lock held.
pub trait BlockDevice {
    fn transfer(&self, block: BlockId, data: &mut BlockData, dir: Transfer);
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn transfer(&self, block: BlockId, data: &mut BlockData, dir: Transfer) {
        (**self).transfer(block, data, dir);
    }
}
