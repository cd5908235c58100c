use std::sync::Arc;

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    error::EngineResult,
    ids::TransactionId,
    lock_table::LockTable,
    tuple::Tuple,
};

/// The process composition root: a `Catalog`, a `LockTable`, and a
/// `BufferPool`, each held by `Arc` so they can be shared across
/// threads. Every operation is reached through an `Engine` value (or a
/// clone of one) instead of a hidden global — there is no
/// `static mut`/`Once`-backed singleton anywhere in this crate, unlike
/// the teacher lineage's `Database`/`Unique`.
pub struct Engine {
    catalog: Arc<Catalog>,
    lock_table: Arc<LockTable>,
    buffer_pool: Arc<BufferPool>,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, capacity: usize) -> Arc<Self> {
        let lock_table = Arc::new(LockTable::new());
        let buffer_pool = Arc::new(BufferPool::new(
            capacity,
            Arc::clone(&lock_table),
            Arc::clone(&catalog),
        ));
        Arc::new(Self {
            catalog,
            lock_table,
            buffer_pool,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.lock_table
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn begin_transaction(self: &Arc<Self>) -> Transaction {
        Transaction {
            tid: TransactionId::new(),
            engine: Arc::clone(self),
        }
    }
}

/// A thin handle a caller drives a unit of work through: just a
/// `Tid` plus a reference to the `Engine` it was born from. Grounded
/// in the teacher's `Transaction`, but without the global lookups
/// `commit`/`abort` used there — everything it needs comes from
/// `engine` directly.
pub struct Transaction {
    tid: TransactionId,
    engine: Arc<Engine>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.tid
    }

    pub fn insert_tuple(&self, table_id: i32, tuple: Tuple) -> EngineResult<()> {
        self.engine
            .buffer_pool()
            .insert_tuple(self.tid, table_id, tuple)?;
        Ok(())
    }

    pub fn delete_tuple(&self, record_id: crate::ids::RecordId) -> EngineResult<()> {
        self.engine.buffer_pool().delete_tuple(self.tid, record_id)?;
        Ok(())
    }

    pub fn iter(&self, table_id: i32) -> EngineResult<Vec<Tuple>> {
        let table = self
            .engine
            .catalog()
            .get_table(table_id)
            .ok_or_else(|| crate::error::EngineError::BadPageId(format!("no such table: {}", table_id)))?;
        table
            .iter(self.engine.buffer_pool(), self.tid)
            .collect()
    }

    pub fn commit(self) -> EngineResult<()> {
        self.engine.buffer_pool().transaction_complete(self.tid, true)
    }

    pub fn abort(self) -> EngineResult<()> {
        self.engine.buffer_pool().transaction_complete(self.tid, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heap_file::HeapFile,
        tuple::{Field, FieldDesc, FieldType, TupleDesc},
    };
    use tempfile::NamedTempFile;

    fn int_schema(n: usize) -> TupleDesc {
        let fields = (0..n)
            .map(|i| FieldDesc {
                name: format!("c{}", i),
                field_type: FieldType::Int,
            })
            .collect();
        TupleDesc::new(fields, Some(0))
    }

    #[test]
    fn commit_makes_inserted_rows_visible_to_a_later_transaction() {
        let tmp = NamedTempFile::new().unwrap();
        let table_id = 1;
        let heap_file = HeapFile::new(tmp.path(), table_id, int_schema(2), 128).unwrap();
        std::mem::forget(tmp);

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::new(heap_file));
        let engine = Engine::new(catalog, 16);

        let writer = engine.begin_transaction();
        writer
            .insert_tuple(table_id, Tuple::new(vec![Field::Int(1), Field::Int(2)]))
            .unwrap();
        writer.commit().unwrap();

        let reader = engine.begin_transaction();
        let rows = reader.iter(table_id).unwrap();
        assert_eq!(rows.len(), 1);
        reader.commit().unwrap();
    }

    #[test]
    fn abort_hides_the_uncommitted_insert() {
        let tmp = NamedTempFile::new().unwrap();
        let table_id = 1;
        let heap_file = HeapFile::new(tmp.path(), table_id, int_schema(2), 128).unwrap();
        std::mem::forget(tmp);

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::new(heap_file));
        let engine = Engine::new(catalog, 16);

        let writer = engine.begin_transaction();
        writer
            .insert_tuple(table_id, Tuple::new(vec![Field::Int(1), Field::Int(2)]))
            .unwrap();
        writer.abort().unwrap();

        let reader = engine.begin_transaction();
        let rows = reader.iter(table_id).unwrap();
        assert!(rows.is_empty());
        reader.commit().unwrap();
    }
}
