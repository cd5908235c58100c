use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use log::debug;

use crate::{
    catalog::Catalog,
    db_file::DbFile,
    error::{EngineError, EngineResult},
    ids::{PageId, RecordId, TransactionId},
    lock_table::LockTable,
    page::{new_page_pod, PagePod, PagePodExt},
    permission::Permission,
    tuple::Tuple,
};

struct Inner {
    cache: HashMap<PageId, PagePod>,
    /// Least-recently-used at the front, most-recently-used at the back.
    lru: VecDeque<PageId>,
}

impl Inner {
    fn touch(&mut self, pid: PageId) {
        self.lru.retain(|p| *p != pid);
        self.lru.push_back(pid);
    }
}

/// Fixed-capacity, NO-STEAL, LRU-evicted page cache sitting on top of
/// the lock table. Every page access goes through `get_page`, which
/// acquires the matching lock before touching the cache — mirroring
/// the teacher's `PageCache::get_leaf_page`'s "request lock, then
/// fetch" order, generalized from per-page-category buffers to a
/// single `DbFile`-agnostic one.
pub struct BufferPool {
    capacity: usize,
    lock_table: Arc<LockTable>,
    catalog: Arc<Catalog>,
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(capacity: usize, lock_table: Arc<LockTable>, catalog: Arc<Catalog>) -> Self {
        Self {
            capacity,
            lock_table,
            catalog,
            inner: Mutex::new(Inner {
                cache: HashMap::new(),
                lru: VecDeque::new(),
            }),
        }
    }

    fn table_of(&self, pid: PageId) -> EngineResult<Arc<dyn DbFile>> {
        self.table_of_id(pid.table_id)
    }

    fn table_of_id(&self, table_id: i32) -> EngineResult<Arc<dyn DbFile>> {
        self.catalog
            .get_table(table_id)
            .ok_or_else(|| EngineError::BadPageId(format!("no such table: {}", table_id)))
    }

    /// Fetch `pid` under `perm`, blocking on the matching lock and
    /// possibly evicting a clean page to make room. Propagates
    /// `TransactionAborted` straight through if a deadlock is detected
    /// while waiting for the lock.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> EngineResult<PagePod> {
        self.lock_table.acquire(tid, pid, perm.to_lock())?;

        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(page_pod) = inner.cache.get(&pid).cloned() {
                inner.touch(pid);
                return Ok(page_pod);
            }
        }

        // disk I/O happens with the buffer-pool mutex released; the page
        // lock already serializes writers, so a concurrent reader racing
        // to load the same page is merely redundant work, not a bug.
        let table = self.table_of(pid)?;
        let page = table.read_page(pid)?;
        let page_pod = new_page_pod(page);

        // Re-validate under the lock right before insertion: another
        // miss for a different page may have filled the last slot (or
        // even loaded this same page) while I/O was in flight above, so
        // capacity and cache membership are both re-checked here rather
        // than trusting the pre-I/O snapshot.
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.cache.get(&pid).cloned() {
            inner.touch(pid);
            return Ok(existing);
        }
        while inner.cache.len() >= self.capacity {
            self.evict_one(&mut inner)?;
        }
        inner.cache.insert(pid, page_pod.clone());
        inner.touch(pid);
        debug!("loaded {} into buffer pool", pid);
        Ok(page_pod)
    }

    /// NO-STEAL LRU: scan from the least-recently-used end for the
    /// first clean page. A dirty page is never chosen; if every
    /// resident page is dirty there is no victim and the caller's
    /// transaction must abort.
    fn evict_one(&self, inner: &mut Inner) -> EngineResult<()> {
        let victim = inner
            .lru
            .iter()
            .find(|pid| !inner.cache[pid].rl().is_dirty())
            .copied();

        match victim {
            Some(pid) => {
                inner.cache.remove(&pid);
                inner.lru.retain(|p| *p != pid);
                Ok(())
            }
            None => Err(EngineError::CacheFull(
                "every cached page is dirty, no clean victim to evict".into(),
            )),
        }
    }

    /// Release a single lock early, bypassing strict 2PL. Exposed for
    /// test use only, per the contract `BufferPool.release_page` is
    /// documented with.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) -> EngineResult<()> {
        match self.lock_table.held_lock(tid, pid) {
            Some(crate::permission::Lock::Shared) => self.lock_table.release_shared(tid, pid),
            Some(crate::permission::Lock::Exclusive) => self.lock_table.release_exclusive(tid, pid),
            None => Ok(()),
        }
    }

    /// Commit or abort `tid`: flush its dirty pages (commit) or revert
    /// them to their before-image (abort), then release every lock it
    /// holds. Inferred from the teacher's `tx_complete` (its body is a
    /// stub in the source lineage) plus `flush_pages`/`discard_page`.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> EngineResult<()> {
        let dirty_pages: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner
                .cache
                .iter()
                .filter(|(_, page)| page.rl().dirty_by() == Some(tid))
                .map(|(pid, _)| *pid)
                .collect()
        };

        for pid in dirty_pages {
            let page_pod = {
                let inner = self.inner.lock().unwrap();
                inner.cache.get(&pid).cloned()
            };
            let Some(page_pod) = page_pod else { continue };

            if commit {
                let table = self.table_of(pid)?;
                let mut page = page_pod.wl();
                table.write_page(&page)?;
                page.set_before_image();
                page.mark_dirty(None);
            } else {
                let mut page = page_pod.wl();
                page.restore_before_image();
            }
        }

        self.lock_table.release_all(tid);
        Ok(())
    }

    /// Dispatch to the table's `DbFile::insert_tuple`, then mark every
    /// page it touched dirty under `tid`.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: i32,
        tuple: Tuple,
    ) -> EngineResult<Vec<PageId>> {
        let table = self.table_of_id(table_id)?;
        let touched = table.insert_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, &touched);
        Ok(touched)
    }

    pub fn delete_tuple(&self, tid: TransactionId, record_id: RecordId) -> EngineResult<Vec<PageId>> {
        let table = self.table_of(record_id.page_id)?;
        let touched = table.delete_tuple(self, tid, record_id)?;
        self.mark_dirty(tid, &touched);
        Ok(touched)
    }

    fn mark_dirty(&self, tid: TransactionId, pages: &[PageId]) {
        let inner = self.inner.lock().unwrap();
        for pid in pages {
            if let Some(page_pod) = inner.cache.get(pid) {
                page_pod.wl().mark_dirty(Some(tid));
            }
        }
    }

    /// Flush every dirty page in the pool to disk, clearing dirty
    /// flags. Maintenance endpoint; normal commit only flushes one
    /// transaction's pages (`transaction_complete`).
    pub fn flush_all(&self) -> EngineResult<()> {
        let dirty_pages: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner
                .cache
                .iter()
                .filter(|(_, page)| page.rl().is_dirty())
                .map(|(pid, _)| *pid)
                .collect()
        };

        for pid in dirty_pages {
            let page_pod = {
                let inner = self.inner.lock().unwrap();
                inner.cache.get(&pid).cloned()
            };
            let Some(page_pod) = page_pod else { continue };
            let table = self.table_of(pid)?;
            let mut page = page_pod.wl();
            table.write_page(&page)?;
            page.set_before_image();
            page.mark_dirty(None);
        }
        Ok(())
    }

    /// Drop `pid` from the cache without flushing it. Used by
    /// recovery paths and tests that need to force a reload from disk.
    pub fn discard(&self, pid: PageId) {
        let mut inner = self.inner.lock().unwrap();
        inner.cache.remove(&pid);
        inner.lru.retain(|p| *p != pid);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
