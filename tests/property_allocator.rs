//! Property-based tests for allocator and file store invariants
//!
//! Uses proptest to check that the block map stays consistent with the live
//! extents across random allocate/release sequences, and that store writes
//! round-trip through seek and read.

use partfs::{BlockAllocator, BlockMap, Extent, FileStore, OnMissing, StoreConfig};
use proptest::prelude::*;
use std::collections::HashSet;
use std::io::SeekFrom;

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Release(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..24).prop_map(Op::Allocate),
        any::<usize>().prop_map(Op::Release),
    ]
}

proptest! {
    #[test]
    fn prop_used_blocks_match_live_extents(
        total in 1usize..300,
        ops in prop::collection::vec(op_strategy(), 1..60)
    ) {
        let mut map = BlockMap::new(total);
        let mut live: Vec<Extent> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate(n) => {
                    let free_before = map.free_blocks();
                    match map.allocate(n) {
                        Ok(extent) => {
                            prop_assert_eq!(extent.length, n);
                            prop_assert!(extent.end() <= total);
                            for other in &live {
                                prop_assert!(!extent.overlaps(other), "{:?} overlaps {:?}", extent, other);
                            }
                            prop_assert_eq!(map.free_blocks(), free_before - n);
                            live.push(extent);
                        }
                        Err(_) => prop_assert_eq!(map.free_blocks(), free_before),
                    }
                }
                Op::Release(idx) => {
                    if !live.is_empty() {
                        let extent = live.swap_remove(idx % live.len());
                        map.release(extent).unwrap();
                    }
                }
            }

            let expected: HashSet<usize> = live.iter().flat_map(|e| e.blocks()).collect();
            for block in 0..total {
                prop_assert_eq!(map.is_used(block), expected.contains(&block));
            }
            prop_assert_eq!(map.free_blocks() + map.used_blocks(), total);
        }
    }

    #[test]
    fn prop_first_fit_returns_lowest_start(
        total in 1usize..200,
        used in prop::collection::vec(any::<bool>(), 200),
        needed in 1usize..16
    ) {
        let mut map = BlockMap::new(total);
        for (block, _) in used.iter().enumerate().take(total).filter(|(_, u)| **u) {
            map.reserve(Extent::new(block, 1)).unwrap();
        }

        let lowest = (0..total.saturating_sub(needed - 1))
            .find(|&s| (s..s + needed).all(|b| !map.is_used(b)));

        match map.find_free_run(needed) {
            Ok(start) => {
                prop_assert_eq!(Some(start), lowest);
                prop_assert!(start == 0 || map.is_used(start - 1));
            }
            Err(_) => prop_assert_eq!(lowest, None),
        }
    }

    #[test]
    fn prop_write_seek_read_round_trip(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..700), 1..6),
        offset in 0u64..4096
    ) {
        let temp = tempfile::TempDir::new().unwrap();
        let config = StoreConfig {
            partition_size: 64 * 512,
            ..StoreConfig::default()
        };
        let mut store = FileStore::format_at(temp.path(), config).unwrap();
        store.open("prop.bin", OnMissing::Create).unwrap();

        let mut model: Vec<u8> = Vec::new();
        for chunk in &chunks {
            let at = store.seek(SeekFrom::Start(offset)).unwrap() as usize;
            prop_assert_eq!(at, offset.min(model.len() as u64) as usize);

            store.write(chunk).unwrap();
            let end = at + chunk.len();
            if end > model.len() {
                model.resize(end, 0);
            }
            model[at..end].copy_from_slice(chunk);

            prop_assert_eq!(store.size().unwrap(), model.len() as u64);
            prop_assert_eq!(store.handle().unwrap().cursor(), end as u64);
        }

        store.seek(SeekFrom::Start(0)).unwrap();
        let read = store.read(model.len() + 10).unwrap();
        prop_assert_eq!(&read, &model);
        prop_assert_eq!(std::fs::read(temp.path().join("prop.bin")).unwrap(), model);
        store.check_consistency().unwrap();
    }
}
