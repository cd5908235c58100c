#![allow(dead_code)]

use latchdb::{Catalog, Engine, FieldDesc, FieldType, HeapFile, TupleDesc};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub fn setup() {
    latchdb::init_log();
}

pub fn int_schema(n: usize) -> TupleDesc {
    let fields = (0..n)
        .map(|i| FieldDesc {
            name: format!("c{}", i),
            field_type: FieldType::Int,
        })
        .collect();
    TupleDesc::new(fields, Some(0))
}

/// A single-table engine backed by a throwaway file, for tests that
/// only need one heap file to drive the lock/buffer-pool core.
pub fn single_table_engine(columns: usize, page_size: usize, capacity: usize) -> (Arc<Engine>, i32) {
    let tmp = NamedTempFile::new().unwrap();
    let table_id = 1;
    let heap_file = HeapFile::new(tmp.path(), table_id, int_schema(columns), page_size).unwrap();
    std::mem::forget(tmp);

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(Arc::new(heap_file));
    (Engine::new(catalog, capacity), table_id)
}
