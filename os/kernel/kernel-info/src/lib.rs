//! # Kernel Parameters
//!
//! Compile-time sizing for the kernel's shared resource pools. Every subsystem
//! that hands out disk block buffers or physical page frames, and every
//! collaborator that has to agree with them on a block or page size, reads its
//! numbers from here.
//!
//! ## Overview
//!
//! ```text
//!                ┌───────────────────────────────┐
//!  filesystem ──►│ buffer cache                  │── miss ──► block device
//!                │  NBUF slots of BSIZE bytes    │
//!                │  NBUCKET independently-locked │
//!                │  shards, keyed by blockno     │
//!                └───────────────────────────────┘
//!
//!                ┌───────────────────────────────┐
//!  vm / proc  ──►│ page allocator                │
//!                │  PGSIZE frames, one free list │
//!                │  per CPU (NCPU shards)        │
//!                └───────────────────────────────┘
//! ```
//!
//! ### Block geometry ([`BSIZE`])
//! The buffer cache and the block device transfer whole blocks; the size is
//! shared with the on-disk filesystem layout.
//!
//! ### Page geometry ([`memory`])
//! Frame size, the managed physical range and the junk patterns written into
//! frames on allocation and release.
//!
//! ## Configuration Management
//!
//! All values are `const` and validated with `const` assertions, so an invalid
//! combination fails the build rather than the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;

/// Maximum number of CPUs.
pub const NCPU: usize = 8;

/// Max number of blocks any filesystem operation writes.
pub const MAXOPBLOCKS: usize = 10;

/// Size of the disk block cache, in buffers.
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// Number of independently-locked buffer cache shards.
///
/// A prime keeps `blockno % NBUCKET` from lining up with strided access
/// patterns such as inode or bitmap blocks.
pub const NBUCKET: usize = 13;

/// Block size, in bytes.
pub const BSIZE: usize = 1024;

/// Device number of the file system root disk.
pub const ROOTDEV: u32 = 1;

const _: () = {
    assert!(NCPU > 0);
    assert!(NBUCKET > 0);
    assert!(NBUF >= NBUCKET);
    assert!(BSIZE.is_power_of_two());
};
