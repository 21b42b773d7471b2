//! Per-shard recency lists.
//!
//! The links live in the slots themselves as indices into the cache's slot
//! array, so moving a buffer between shards never allocates. A shard's list is
//! only touched with that shard's lock held.

use crate::buf::Slot;
use core::sync::atomic::Ordering;

pub const NIL: usize = usize::MAX;

/// Membership list of one shard, most recently inserted first.
#[derive(Debug)]
pub struct Shard {
    head: usize,
    tail: usize,
    len: usize,
}

impl Shard {
    pub const fn new() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub fn push_front(&mut self, slots: &[Slot], i: usize) {
        let s = &slots[i];
        s.prev.store(NIL, Ordering::Relaxed);
        s.next.store(self.head, Ordering::Relaxed);
        if self.head == NIL {
            self.tail = i;
        } else {
            slots[self.head].prev.store(i, Ordering::Relaxed);
        }
        self.head = i;
        self.len += 1;
    }

    pub fn unlink(&mut self, slots: &[Slot], i: usize) {
        let s = &slots[i];
        let prev = s.prev.load(Ordering::Relaxed);
        let next = s.next.load(Ordering::Relaxed);

        if prev == NIL {
            self.head = next;
        } else {
            slots[prev].next.store(next, Ordering::Relaxed);
        }
        if next == NIL {
            self.tail = prev;
        } else {
            slots[next].prev.store(prev, Ordering::Relaxed);
        }

        s.prev.store(NIL, Ordering::Relaxed);
        s.next.store(NIL, Ordering::Relaxed);
        self.len -= 1;
    }

    pub fn move_to_front(&mut self, slots: &[Slot], i: usize) {
        if self.head != i {
            self.unlink(slots, i);
            self.push_front(slots, i);
        }
    }

    /// Member indices, most recently inserted first.
    pub fn iter<'a>(&self, slots: &'a [Slot]) -> impl Iterator<Item = usize> + use<'a> {
        let mut cur = self.head;
        core::iter::from_fn(move || {
            if cur == NIL {
                return None;
            }
            let i = cur;
            cur = slots[i].next.load(Ordering::Relaxed);
            Some(i)
        })
    }

    /// Member indices, least recently inserted first.
    pub fn iter_rev<'a>(&self, slots: &'a [Slot]) -> impl Iterator<Item = usize> + use<'a> {
        let mut cur = self.tail;
        core::iter::from_fn(move || {
            if cur == NIL {
                return None;
            }
            let i = cur;
            cur = slots[i].prev.load(Ordering::Relaxed);
            Some(i)
        })
    }
}
