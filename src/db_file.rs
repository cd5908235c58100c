use crate::{
    buffer_pool::BufferPool,
    error::EngineResult,
    ids::{PageId, RecordId, TransactionId},
    page::Page,
    tuple::{Tuple, TupleDesc},
};

/// External collaborator interface: everything the lock/buffer-pool
/// core requires of a table's on-disk file.
///
/// `insert_tuple`/`delete_tuple`/the iterator all take `&BufferPool`
/// rather than touching disk directly, because per §4.5 they must walk
/// pages *through* the buffer pool (so they pick up locks and cached
/// copies) rather than around it.
pub trait DbFile: Send + Sync {
    fn table_id(&self) -> i32;

    fn tuple_desc(&self) -> &TupleDesc;

    fn read_page(&self, pid: PageId) -> EngineResult<Page>;

    fn write_page(&self, page: &Page) -> EngineResult<()>;

    fn num_pages(&self) -> usize;

    /// Insert `tuple`, returning every page id the insertion touched
    /// (the page it landed on; heap files never touch more than one).
    fn insert_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> EngineResult<Vec<PageId>>;

    /// Delete the tuple at `record_id`, returning every page id the
    /// deletion touched.
    fn delete_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        record_id: RecordId,
    ) -> EngineResult<Vec<PageId>>;

    /// A restartable, page-by-page iterator over every live tuple in
    /// the table, acquiring a shared lock on each page as it is
    /// visited.
    fn iter<'a>(
        &'a self,
        buffer_pool: &'a BufferPool,
        tid: TransactionId,
    ) -> Box<dyn Iterator<Item = EngineResult<Tuple>> + 'a>;
}
