#![allow(dead_code)]

use kernel_alloc::Cpus;
use kernel_info::memory::PGSIZE;
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::cell::Cell;

/// Page-aligned heap memory standing in for physical RAM.
pub struct Region {
    ptr: *mut u8,
    layout: Layout,
}

impl Region {
    pub fn new(frames: usize) -> Self {
        let layout = Layout::from_size_align(frames * PGSIZE, PGSIZE).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());
        Self { ptr, layout }
    }

    pub const fn start(&self) -> *mut u8 {
        self.ptr
    }

    pub fn end(&self) -> *mut u8 {
        self.ptr.wrapping_add(self.layout.size())
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

thread_local! {
    static CPU: Cell<usize> = const { Cell::new(0) };
}

/// Each test thread pretends to be the CPU it last set with [`set_cpu`].
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadCpu;

impl Cpus for ThreadCpu {
    fn with_current<R>(&self, f: impl FnOnce(usize) -> R) -> R {
        f(CPU.get())
    }
}

pub fn set_cpu(id: usize) {
    CPU.set(id);
}
