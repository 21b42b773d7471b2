//! # Physical Memory Layout

/// Bytes per page frame.
pub const PGSIZE: usize = 4096;

/// Bits of offset within a page.
pub const PGSHIFT: u32 = 12;

/// Start of RAM as seen by the kernel; physical memory is direct-mapped.
pub const KERNBASE: u64 = 0x8000_0000;

/// End of the RAM the kernel manages.
pub const PHYSTOP: u64 = KERNBASE + 128 * 1024 * 1024;

/// Upper bound on the number of frames the page allocator can manage.
pub const MAX_FRAMES: usize = ((PHYSTOP - KERNBASE) as usize) / PGSIZE;

/// Written over every frame handed out, so reads of stale contents show up.
pub const ALLOC_JUNK: u8 = 0x05;

/// Written over every frame returned, to catch dangling references.
pub const FREE_JUNK: u8 = 0x01;

/// Round `addr` up to the next page boundary.
#[inline]
#[must_use]
pub const fn page_round_up(addr: u64) -> u64 {
    (addr + PGSIZE as u64 - 1) & !(PGSIZE as u64 - 1)
}

/// Round `addr` down to its page boundary.
#[inline]
#[must_use]
pub const fn page_round_down(addr: u64) -> u64 {
    addr & !(PGSIZE as u64 - 1)
}

const _: () = {
    assert!(PGSIZE == 1 << PGSHIFT);
    assert!(KERNBASE.is_multiple_of(PGSIZE as u64));
    assert!(PHYSTOP > KERNBASE);
    assert!(ALLOC_JUNK != FREE_JUNK);
};
