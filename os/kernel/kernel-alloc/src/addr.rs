//! Physical addresses and page frames.
//!
//! Physical memory is direct-mapped, so a frame's physical address is also
//! the address the kernel writes through.

use core::fmt;
use core::ops::Add;
use core::ptr::NonNull;
use kernel_info::memory::PGSIZE;

/// Physical memory address.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.addr() as u64)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0.is_multiple_of(PGSIZE as u64)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// One page of physical memory, owned by whoever holds the handle.
///
/// A `Frame` handed out by an allocator is page-aligned and inside that
/// allocator's range. Handles built with [`Frame::from_ptr`] are checked when
/// they are given back.
#[derive(Eq, PartialEq)]
pub struct Frame(NonNull<u8>);

// Safety: a frame is plain memory with a single owner.
unsafe impl Send for Frame {}
unsafe impl Sync for Frame {}

impl Frame {
    /// Wrap the page starting at `ptr`.
    ///
    /// # Safety
    /// `ptr` must point to `PGSIZE` writable bytes that no one else uses,
    /// typically a frame previously handed out and turned into a pointer with
    /// [`Frame::into_ptr`].
    #[inline]
    #[must_use]
    pub const unsafe fn from_ptr(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    #[inline]
    #[must_use]
    pub const fn into_ptr(self) -> NonNull<u8> {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn addr(&self) -> PhysicalAddress {
        PhysicalAddress::from_ptr(self.0.as_ptr())
    }

    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    #[inline]
    #[must_use]
    pub const fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// The frame's bytes.
    #[inline]
    #[must_use]
    pub const fn as_slice(&self) -> &[u8] {
        // SAFETY: a frame owns PGSIZE bytes.
        unsafe { core::slice::from_raw_parts(self.0.as_ptr(), PGSIZE) }
    }

    #[inline]
    #[must_use]
    pub const fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: a frame owns PGSIZE bytes, and `&mut self` makes them ours.
        unsafe { core::slice::from_raw_parts_mut(self.0.as_ptr(), PGSIZE) }
    }

    /// Overwrite the whole page with `byte`.
    ///
    /// # Safety
    /// The frame must refer to `PGSIZE` writable bytes.
    #[inline]
    pub(crate) const unsafe fn fill(&mut self, byte: u8) {
        unsafe { self.0.as_ptr().write_bytes(byte, PGSIZE) };
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:?})", self.addr())
    }
}

/// Half-open range of whole frames `[start, end)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameRange {
    pub start: PhysicalAddress,
    pub end: PhysicalAddress,
}

impl FrameRange {
    /// Number of frames in the range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn len(&self) -> usize {
        ((self.end.as_u64() - self.start.as_u64()) / PGSIZE as u64) as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end.as_u64() <= self.start.as_u64()
    }

    /// Whether `addr` is a frame base inside the range.
    #[inline]
    #[must_use]
    pub const fn contains_frame(&self, addr: PhysicalAddress) -> bool {
        addr.is_page_aligned()
            && addr.as_u64() >= self.start.as_u64()
            && addr.as_u64() < self.end.as_u64()
    }

    /// Position of the frame at `addr` within the range.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(&self, addr: PhysicalAddress) -> Option<usize> {
        if self.contains_frame(addr) {
            Some(((addr.as_u64() - self.start.as_u64()) / PGSIZE as u64) as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_indexing() {
        let r = FrameRange {
            start: PhysicalAddress::new(0x8000_0000),
            end: PhysicalAddress::new(0x8000_4000),
        };
        assert_eq!(r.len(), 4);
        assert!(!r.is_empty());
        assert_eq!(r.index_of(PhysicalAddress::new(0x8000_0000)), Some(0));
        assert_eq!(r.index_of(PhysicalAddress::new(0x8000_3000)), Some(3));
        assert_eq!(r.index_of(PhysicalAddress::new(0x8000_4000)), None);
        assert_eq!(r.index_of(PhysicalAddress::new(0x8000_1008)), None);
        assert_eq!(r.index_of(PhysicalAddress::new(0x7fff_f000)), None);
    }

    #[test]
    fn debug_format() {
        assert_eq!(
            format!("{:?}", PhysicalAddress::new(0x1000)),
            "PA(0x0000000000001000)"
        );
    }
}
