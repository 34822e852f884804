#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use partfs::{FileStore, OnMissing, StoreConfig};
use std::io::SeekFrom;

#[derive(Debug, Arbitrary)]
enum StoreOp {
    Open { name_idx: u8, create: bool },
    Write { data: Vec<u8> },
    Read { len: u16 },
    Seek { offset: i32, base: u8 },
    Close,
    Delete,
    Move { src_idx: u8, dst_idx: u8 },
}

fn name(idx: u8) -> String {
    format!("file{}.bin", idx % 4)
}

// Random handle operations must never break the block accounting
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<StoreOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let temp = match tempfile::TempDir::new() {
        Ok(t) => t,
        Err(_) => return,
    };
    let config = StoreConfig {
        partition_size: 16 * 512,
        ..StoreConfig::default()
    };
    let mut store = match FileStore::format_at(temp.path(), config) {
        Ok(s) => s,
        Err(_) => return,
    };

    for op in ops.iter().take(64) {
        let _ = match op {
            StoreOp::Open { name_idx, create } => {
                let on_missing = if *create { OnMissing::Create } else { OnMissing::Fail };
                store.open(&name(*name_idx), on_missing).map(|_| ())
            }
            StoreOp::Write { data } => store.write(data).map(|_| ()),
            StoreOp::Read { len } => store.read(*len as usize).map(|_| ()),
            StoreOp::Seek { offset, base } => {
                let pos = match base % 3 {
                    0 => SeekFrom::Start((*offset).max(0) as u64),
                    1 => SeekFrom::Current(*offset as i64),
                    _ => SeekFrom::End(*offset as i64),
                };
                store.seek(pos).map(|_| ())
            }
            StoreOp::Close => store.close(),
            StoreOp::Delete => store.delete(),
            StoreOp::Move { src_idx, dst_idx } => {
                store.move_file(&name(*src_idx), &name(*dst_idx)).map(|_| ())
            }
        };

        if let Some(record) = store.handle() {
            assert!(record.cursor() <= record.size());
        }
        store.check_consistency().unwrap();
    }
});
