use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ids::{PageId, TransactionId};

/// One resident page: raw fixed-size bytes, the transaction (if any)
/// that dirtied it, and the before-image snapshot used to revert on
/// abort without touching disk.
///
/// Deliberately opaque about what's *in* the bytes — the slot-bitmap
/// tuple layout lives in `heap_file`, which is the only code that
/// interprets `data()`'s contents.
pub struct Page {
    pid: PageId,
    data: Vec<u8>,
    before_image: Vec<u8>,
    dirty_by: Option<TransactionId>,
}

impl Page {
    pub fn new(pid: PageId, data: Vec<u8>) -> Self {
        let before_image = data.clone();
        Self {
            pid,
            data,
            before_image,
            dirty_by: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn dirty_by(&self) -> Option<TransactionId> {
        self.dirty_by
    }

    pub fn mark_dirty(&mut self, by: Option<TransactionId>) {
        self.dirty_by = by;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_by.is_some()
    }

    /// Snapshot the current bytes as the new before-image. Called after
    /// a clean flush to disk, or at load time (the constructor already
    /// does this for freshly-read pages).
    pub fn set_before_image(&mut self) {
        self.before_image = self.data.clone();
    }

    /// Revert in-memory bytes to the last before-image and clear the
    /// dirty flag. This is the entirety of NO-STEAL abort: since no
    /// dirty page was ever written to disk, the pre-transaction bytes
    /// are still sitting in `before_image`.
    pub fn restore_before_image(&mut self) {
        self.data = self.before_image.clone();
        self.dirty_by = None;
    }
}

/// Shared, lockable handle to a resident page. Multiple readers may
/// hold a read guard concurrently; `PageLock` is what actually
/// serializes writers at the transaction level, this `RwLock` only
/// protects the in-process memory from torn reads/writes.
pub type PagePod = Arc<RwLock<Page>>;

pub(crate) trait PagePodExt {
    fn rl(&self) -> RwLockReadGuard<'_, Page>;
    fn wl(&self) -> RwLockWriteGuard<'_, Page>;
}

impl PagePodExt for PagePod {
    fn rl(&self) -> RwLockReadGuard<'_, Page> {
        self.read().unwrap()
    }

    fn wl(&self) -> RwLockWriteGuard<'_, Page> {
        self.write().unwrap()
    }
}

pub(crate) fn new_page_pod(page: Page) -> PagePod {
    Arc::new(RwLock::new(page))
}
