use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

/// Opaque, monotonically-unique transaction identifier.
///
/// Only equality and hashing are defined on it; transactions are not
/// ordered with respect to one another.
#[derive(Eq, PartialEq, Clone, Copy, Hash)]
pub struct TransactionId {
    id: u64,
}

impl TransactionId {
    /// Allocate a fresh id. Cheap and lock-free.
    pub fn new() -> Self {
        Self {
            id: NEXT_TID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn raw(&self) -> u64 {
        self.id
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// `(table_id, page_number)` — the stable address of a page on disk.
#[derive(Eq, PartialEq, Clone, Copy, Hash)]
pub struct PageId {
    pub table_id: i32,
    pub page_number: usize,
}

impl PageId {
    pub fn new(table_id: i32, page_number: usize) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "page({}, {})", self.table_id, self.page_number)
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// The location of a single tuple: the page it lives on plus its slot
/// index within that page's header bitmap.
#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_index: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_index: usize) -> Self {
        Self {
            page_id,
            slot_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn page_id_equality_is_by_value() {
        let a = PageId::new(3, 7);
        let b = PageId::new(3, 7);
        let c = PageId::new(3, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
