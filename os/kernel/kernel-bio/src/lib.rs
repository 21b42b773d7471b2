//! # Block buffer cache
//!
//! Caches disk blocks in a fixed pool of buffers so that filesystem code can
//! share them between concurrently running kernel threads:
//!
//! * only one thread at a time holds a given block's buffer ([`Buf`]), and
//! * a block is cached in at most one buffer while anyone references it.
//!
//! ```text
//!   get(dev, n) ──► shard n % NBUCKET ──hit──► refcnt += 1 ──► sleep-lock buffer
//!                        │
//!                        └─miss─► oldest free member ──none──► steal from another shard
//! ```
//!
//! Interface:
//! * [`BufferCache::read`] returns a locked buffer with the block's contents.
//! * [`BufferCache::write`] writes a locked buffer to disk.
//! * Dropping the [`Buf`] (or [`BufferCache::release`]) unlocks it.
//! * [`BufferCache::pin`]/[`BufferCache::unpin`] keep a buffer cached across
//!   several lock/unlock cycles.
//!
//! The device behind the cache is any [`BlockDevice`]; [`RamDisk`] keeps
//! blocks in memory.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod buf;
mod cache;
mod device;
mod lru;
mod ramdisk;
mod stats;

pub use buf::Buf;
pub use cache::{Bcache, BufferCache};
pub use device::{BlockData, BlockDevice, BlockId, Transfer};
pub use ramdisk::RamDisk;
pub use stats::CacheStats;
