use kernel_bio::{BlockDevice, BlockId, BufferCache, RamDisk, Transfer};
use kernel_info::BSIZE;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

fn stamped<const N: usize>() -> RamDisk<N> {
    let disk = RamDisk::new();
    for n in 0..N {
        let mut block = [0u8; BSIZE];
        block.fill(n as u8);
        disk.poke(n as u32, &block);
    }
    disk
}

#[test]
fn read_hits_cache_after_first_miss() {
    let disk = stamped::<8>();
    let cache = BufferCache::<_, 4, 2>::new(&disk);

    let b = cache.read(0, 3);
    assert_eq!(b.block(), BlockId::new(0, 3));
    assert!(b.is_valid());
    assert!(b.iter().all(|&x| x == 3));
    cache.release(b);

    let b = cache.read(0, 3);
    assert!(b.iter().all(|&x| x == 3));
    drop(b);

    assert_eq!(disk.reads(), 1);
    assert_eq!(cache.stats().misses(), 1);
    assert_eq!(cache.stats().hits(), 1);
    assert_eq!(cache.stats().reads(), 1);
    assert_eq!(cache.refcnt(0, 3), Some(0));
}

#[test]
fn write_goes_through_to_device() {
    let disk = RamDisk::<8>::new();
    let cache = BufferCache::<_, 4, 2>::new(&disk);

    let mut b = cache.get(0, 5);
    assert!(!b.is_valid());
    b.fill(0xab);
    cache.write(&mut b);
    drop(b);

    assert_eq!(disk.writes(), 1);
    assert!(disk.peek(5).iter().all(|&x| x == 0xab));

    // Written contents count as valid, no read needed.
    let b = cache.read(0, 5);
    assert_eq!(b[17], 0xab);
    assert_eq!(disk.reads(), 0);
}

#[test]
fn same_block_on_different_devices_is_distinct() {
    let disk = stamped::<4>();
    let cache = BufferCache::<_, 4, 2>::new(&disk);

    let a = cache.get(1, 2);
    let b = cache.get(2, 2);
    assert_eq!(a.dev(), 1);
    assert_eq!(b.dev(), 2);
    assert_eq!(a.blockno(), b.blockno());
    drop((a, b));

    assert_eq!(cache.stats().misses(), 2);
}

#[test]
fn single_shard_evicts_least_recently_used() {
    let disk = stamped::<8>();
    let cache = BufferCache::<_, 3, 1>::new(&disk);

    for n in 0..3 {
        drop(cache.read(0, n));
    }
    // Touch block 0 so block 1 becomes the oldest.
    drop(cache.read(0, 0));

    drop(cache.read(0, 3));
    assert_eq!(cache.locate(0, 1), None);
    assert_eq!(cache.locate(0, 0), Some(0));
    assert_eq!(cache.locate(0, 2), Some(0));
    assert_eq!(cache.locate(0, 3), Some(0));
    assert_eq!(cache.stats().evictions(), 1);

    drop(cache.read(0, 4));
    assert_eq!(cache.locate(0, 2), None);
}

#[test]
fn sixteen_buffers_in_four_shards() {
    let disk = stamped::<32>();
    let cache = BufferCache::<_, 16, 4>::new(&disk);

    for n in 0..16 {
        let b = cache.get(0, n);
        drop(b);
    }
    for n in 0..16 {
        assert_eq!(cache.locate(0, n), Some(n as usize % 4), "block {n}");
    }
    assert_eq!(cache.stats().evictions(), 0);
    assert_eq!(cache.stats().steals(), 0);

    drop(cache.get(0, 16));
    assert_eq!(cache.locate(0, 0), None);
    assert_eq!(cache.locate(0, 16), Some(0));
    assert_eq!(cache.stats().evictions(), 1);
    for n in 1..16 {
        assert!(cache.locate(0, n).is_some(), "block {n} evicted");
    }
}

#[test]
fn pinned_shard_steals_from_another() {
    let disk = stamped::<8>();
    let cache = BufferCache::<_, 4, 2>::new(&disk);
    assert_eq!(cache.shard_len(0), 2);
    assert_eq!(cache.shard_len(1), 2);

    // Both buffers of shard 0 stay referenced.
    let b0 = cache.read(0, 0);
    let b2 = cache.read(0, 2);

    let b4 = cache.read(0, 4);
    assert!(b4.iter().all(|&x| x == 4));
    assert_eq!(cache.locate(0, 4), Some(0));
    assert_eq!(cache.shard_len(0), 3);
    assert_eq!(cache.shard_len(1), 1);
    assert_eq!(cache.stats().steals(), 1);

    drop((b0, b2, b4));

    // The stolen buffer is now an ordinary member of shard 0.
    drop(cache.read(0, 6));
    assert_eq!(cache.locate(0, 6), Some(0));
    assert_eq!(cache.shard_len(0), 3);
    assert_eq!(cache.stats().steals(), 1);
}

#[test]
fn steals_under_contention_keep_blocks_unique() {
    let threads: u32 = 4;
    let iters: u32 = 300;

    let disk = stamped::<64>();
    let cache = BufferCache::<_, 8, 2>::new(&disk);
    let held = Mutex::new(HashSet::new());
    let start = Barrier::new(threads as usize);

    // Every buffer of shard 0 stays referenced, so the first miss on an even
    // block has to take one from shard 1.
    let pinned = [0, 2, 4, 6].map(|n| cache.read(0, n));
    assert_eq!(cache.shard_len(0), 4);

    thread::scope(|s| {
        for t in 0..threads {
            let (cache, held, start) = (&cache, &held, &start);
            s.spawn(move || {
                start.wait();
                for i in 0..iters {
                    // Half the threads work on even blocks, half on odd ones.
                    let n = 8 + 2 * ((i * 7 + t) % 24) + t % 2;
                    let b = cache.read(0, n);
                    assert!(held.lock().unwrap().insert(n), "block {n} held twice");
                    assert!(b.iter().all(|&x| x == n as u8), "block {n} corrupted");
                    assert_eq!(cache.locate(0, n), Some(n as usize % 2));
                    assert!(held.lock().unwrap().remove(&n));
                    drop(b);
                }
            });
        }
    });

    assert!(cache.stats().steals() > 0);
    drop(pinned);

    assert_eq!(cache.shard_len(0) + cache.shard_len(1), 8);
    for n in 0..64 {
        if let Some(shard) = cache.locate(0, n) {
            assert_eq!(shard, n as usize % 2, "block {n}");
            assert_eq!(cache.refcnt(0, n), Some(0));
        }
    }
    assert_eq!(cache.stats().lookups(), 4 + u64::from(threads * iters));
}

#[test]
#[should_panic(expected = "bget: reserved block id")]
fn reserved_block_id_is_rejected() {
    let disk = RamDisk::<4>::new();
    let cache = BufferCache::<_, 2, 1>::new(&disk);
    let _b = cache.get(u32::MAX, u32::MAX);
}

#[test]
fn debug_lists_bound_blocks() {
    let disk = stamped::<8>();
    let cache = BufferCache::<_, 2, 1>::new(&disk);

    let b = cache.read(0, 3);
    let dump = format!("{cache:?}");
    assert!(dump.contains("Some(BlockId(0:3))"), "{dump}");
    assert!(dump.contains("block: None"), "{dump}");
    assert!(dump.contains("refcnt: 1"), "{dump}");
    drop(b);
}

#[test]
#[should_panic(expected = "bget: no buffers")]
fn exhaustion_is_fatal() {
    let disk = RamDisk::<8>::new();
    let cache = BufferCache::<_, 2, 2>::new(&disk);

    let _a = cache.get(0, 0);
    let _b = cache.get(0, 1);
    let _c = cache.get(0, 2);
}

#[test]
fn pinned_buffer_survives_eviction() {
    let disk = stamped::<8>();
    let cache = BufferCache::<_, 2, 1>::new(&disk);

    let b = cache.read(0, 0);
    cache.pin(&b);
    drop(b);
    assert_eq!(cache.refcnt(0, 0), Some(1));

    drop(cache.read(0, 1));
    drop(cache.read(0, 2));
    assert_eq!(cache.locate(0, 0), Some(0));
    assert_eq!(cache.locate(0, 1), None);

    let b = cache.read(0, 0);
    assert_eq!(cache.refcnt(0, 0), Some(2));
    cache.unpin(&b);
    drop(b);
    assert_eq!(cache.refcnt(0, 0), Some(0));
    assert_eq!(disk.reads(), 3);
}

#[test]
#[should_panic(expected = "bunpin")]
fn unpin_without_pin_is_fatal() {
    let disk = RamDisk::<4>::new();
    let cache = BufferCache::<_, 2, 1>::new(&disk);

    let b = cache.get(0, 0);
    cache.unpin(&b);
}

#[test]
#[should_panic(expected = "bwrite")]
fn foreign_buffer_is_rejected() {
    let disk = RamDisk::<4>::new();
    let a = BufferCache::<_, 2, 1>::new(&disk);
    let b = BufferCache::<_, 2, 1>::new(&disk);

    let mut buf = a.get(0, 0);
    b.write(&mut buf);
}

#[test]
fn owner_is_exclusive_across_threads() {
    let threads = 8;
    let iters = 500;

    let disk = RamDisk::<4>::new();
    let cache = BufferCache::<_, 8, 2>::new(&disk);
    let in_cs = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                for _ in 0..iters {
                    let mut b = cache.read(0, 1);
                    let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(prev, 0, "two owners of one buffer");

                    let n = u64::from_le_bytes(b[..8].try_into().unwrap()) + 1;
                    b[..8].copy_from_slice(&n.to_le_bytes());

                    in_cs.fetch_sub(1, Ordering::SeqCst);
                    drop(b);
                    thread::yield_now();
                }
            });
        }
    });

    let b = cache.read(0, 1);
    let n = u64::from_le_bytes(b[..8].try_into().unwrap());
    assert_eq!(n, (threads * iters) as u64);
    drop(b);
    assert_eq!(cache.refcnt(0, 1), Some(0));
    assert_eq!(disk.reads(), 1);
}

#[test]
fn concurrent_misses_bind_one_buffer() {
    let threads = 8;
    let disk = stamped::<8>();
    let cache = BufferCache::<_, 8, 3>::new(&disk);
    let start = Barrier::new(threads);

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                start.wait();
                let b = cache.read(0, 7);
                assert!(b.iter().all(|&x| x == 7));
            });
        }
    });

    assert_eq!(cache.stats().misses(), 1);
    assert_eq!(cache.stats().hits(), threads as u64 - 1);
    assert_eq!(cache.refcnt(0, 7), Some(0));
}

#[test]
fn mixed_workload_keeps_blocks_unique() {
    let threads = 4;
    let iters = 400;

    let disk = stamped::<32>();
    let cache = BufferCache::<_, 8, 3>::new(&disk);

    thread::scope(|s| {
        for t in 0..threads {
            let cache = &cache;
            s.spawn(move || {
                let mut n: u32 = t * 7;
                for i in 0..iters {
                    n = (n * 13 + 5) % 32;
                    let mut b = cache.read(0, n);
                    assert_eq!(b.blockno(), n);
                    assert!(b.iter().all(|&x| x == n as u8), "block {n} corrupted");
                    if i % 5 == 0 {
                        cache.write(&mut b);
                    }
                }
            });
        }
    });

    let members: usize = (0..3).map(|s| cache.shard_len(s)).sum();
    assert_eq!(members, 8);
    for n in 0..32 {
        if let Some(shard) = cache.locate(0, n) {
            assert_eq!(shard, n as usize % 3);
            assert_eq!(cache.refcnt(0, n), Some(0));
        }
    }
    let stats = cache.stats();
    assert_eq!(stats.lookups(), u64::from(threads * iters));
}

struct Recorder(std::sync::Mutex<Vec<(BlockId, Transfer)>>);

impl BlockDevice for Recorder {
    fn transfer(&self, block: BlockId, data: &mut kernel_bio::BlockData, dir: Transfer) {
        if dir == Transfer::Read {
            data.fill(0);
        }
        self.0.lock().unwrap().push((block, dir));
    }
}

#[test]
fn device_sees_one_transfer_per_miss_and_write() {
    let dev = Recorder(std::sync::Mutex::new(Vec::new()));
    let cache = BufferCache::<_, 2, 1>::new(&dev);

    drop(cache.read(ROOT, 9));
    drop(cache.read(ROOT, 9));
    let mut b = cache.read(ROOT, 9);
    cache.write(&mut b);
    drop(b);

    let log = dev.0.lock().unwrap();
    assert_eq!(
        *log,
        [
            (BlockId::new(ROOT, 9), Transfer::Read),
            (BlockId::new(ROOT, 9), Transfer::Write),
        ]
    );
}

const ROOT: u32 = kernel_info::ROOTDEV;
