//! Allocator corruption detection tests
//!
//! Verifies that invariant violations are caught by the block map and by the
//! store's consistency check instead of silently corrupting state.

use partfs::{BlockAllocator, BlockMap, ErrorKind, Extent, FileStore, OnMissing, StoreConfig};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use tempfile::TempDir;

fn store(temp: &TempDir) -> FileStore {
    let config = StoreConfig {
        partition_size: 32 * 512,
        ..StoreConfig::default()
    };
    FileStore::format_at(temp.path(), config).unwrap()
}

#[test]
fn test_tampered_partition_is_detected() {
    let temp = TempDir::new().unwrap();
    let mut store = store(&temp);
    store.open("a.bin", OnMissing::Create).unwrap();
    store.write(&[0x11u8; 700]).unwrap();
    store.sync().unwrap();
    store.check_consistency().unwrap();

    // Flip a byte inside the mirrored content behind the store's back
    let mut image = OpenOptions::new()
        .write(true)
        .open(temp.path().join("partition.img"))
        .unwrap();
    image.seek(SeekFrom::Start(600)).unwrap();
    image.write_all(&[0xFF]).unwrap();
    image.sync_all().unwrap();

    let err = store.check_consistency().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllocationInconsistency);
}

#[test]
fn test_bytes_past_content_are_not_checked() {
    let temp = TempDir::new().unwrap();
    let mut store = store(&temp);
    store.open("a.bin", OnMissing::Create).unwrap();
    store.write(&[0x22u8; 100]).unwrap();

    // Slack inside the last block does not belong to the file
    let mut image = OpenOptions::new()
        .write(true)
        .open(temp.path().join("partition.img"))
        .unwrap();
    image.seek(SeekFrom::Start(300)).unwrap();
    image.write_all(&[0xFF; 10]).unwrap();

    store.check_consistency().unwrap();
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "already free"))]
fn test_double_release_is_rejected() {
    let mut map = BlockMap::new(64);
    let extent = map.allocate(4).unwrap();
    map.release(extent).unwrap();

    let err = map.release(extent).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllocationInconsistency);
    assert_eq!(map.free_blocks(), 64);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "already used"))]
fn test_overlapping_reserve_leaves_map_untouched() {
    let mut map = BlockMap::new(64);
    map.reserve(Extent::new(10, 5)).unwrap();

    let err = map.reserve(Extent::new(12, 8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllocationInconsistency);
    assert_eq!(map.used_indices(), vec![10, 11, 12, 13, 14]);
    assert_eq!(map.free_blocks(), 59);
}

#[test]
fn test_free_counter_tracks_bits_through_churn() {
    let mut map = BlockMap::new(130);
    let mut live = Vec::new();

    for i in 0..40 {
        if let Ok(extent) = map.allocate(i % 7 + 1) {
            live.push(extent);
        }
        if i % 3 == 0 && !live.is_empty() {
            map.release(live.remove(0)).unwrap();
        }
        let bits = (0..130).filter(|&b| map.is_used(b)).count();
        assert_eq!(map.used_blocks(), bits);
        assert_eq!(map.free_blocks(), 130 - bits);
    }
}

#[test]
fn test_store_survives_repeated_growth_and_reopen() {
    let temp = TempDir::new().unwrap();
    let mut store = store(&temp);

    for round in 0..5u8 {
        store.open("grow.bin", OnMissing::Create).unwrap();
        store.seek(SeekFrom::End(0)).unwrap();
        store.write(&vec![round; 1000]).unwrap();
        store.check_consistency().unwrap();
        store.close().unwrap();
        assert_eq!(store.stats().used_blocks, 0);
    }

    let record = store.open("grow.bin", OnMissing::Fail).unwrap();
    assert_eq!(record.size(), 5000);
    assert_eq!(record.blocks_count(), 10);
    store.check_consistency().unwrap();
}
