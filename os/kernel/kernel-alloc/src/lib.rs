//! # Physical Page Allocation
//!
//! Hands out 4 KiB physical frames to the rest of the kernel: process
//! address spaces, kernel stacks, pipe buffers.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Share Counts (copy-on-write)             │
//! │    • one count per frame, one lock                  │
//! │    • free on last reference, unshare on write       │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical Frame Allocator                  │
//! │    • one intrusive free list per CPU                │
//! │    • steal from other CPUs when the local list is   │
//! │      empty                                          │
//! │    • junk fill on alloc and free                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Physical Frame Allocator ([`FrameAllocator`])
//!
//! * **Per-CPU lists**: each CPU allocates from and frees to its own list
//!   under its own lock, so CPUs rarely contend.
//! * **Stealing**: a CPU with an empty list pops from the first non-empty list
//!   of another CPU, never holding two list locks.
//! * **Recoverable exhaustion**: running out of frames is an
//!   [`KallocError::OutOfMemory`], not a panic.
//!
//! The CPU id comes from a [`Cpus`] implementation, which must keep the
//! caller on one CPU while the id is in use.
//!
//! ### Share Counts ([`SharedFrameAllocator`])
//!
//! Layers copy-on-write reference counts over the frame allocator. Compound
//! updates go through a [`ShareGuard`].
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{BootCpu, FrameAllocator};
//! use kernel_info::memory::{ALLOC_JUNK, PGSIZE};
//!
//! #[repr(C, align(4096))]
//! struct Ram([u8; 4 * PGSIZE]);
//! let mut ram = Box::new(Ram([0; 4 * PGSIZE]));
//! let range = ram.0.as_mut_ptr_range();
//!
//! let kmem = unsafe { FrameAllocator::<_, 2>::new(BootCpu, range.start, range.end) };
//! let frame = kmem.alloc().unwrap();
//! assert!(frame.as_slice().iter().all(|&b| b == ALLOC_JUNK));
//! kmem.free(frame);
//! assert_eq!(kmem.free_frames(), 4);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod addr;
mod cpu;
mod frame_alloc;
mod free_list;
mod share_count;

pub use addr::{Frame, FrameRange, PhysicalAddress};
pub use cpu::{BootCpu, Cpus};
pub use frame_alloc::{FrameAllocator, KallocError};
pub use share_count::{ShareGuard, SharedFrameAllocator};

/// The kernel's page allocator, sized for every frame below `PHYSTOP`.
pub type Kmem<C> = SharedFrameAllocator<
    C,
    { kernel_info::NCPU },
    { kernel_info::memory::MAX_FRAMES },
>;
