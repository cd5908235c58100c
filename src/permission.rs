/// The mode a page is requested in. Mirrors the teacher lineage's
/// `concurrent_status::Permission`, kept as its own tiny type so the
/// buffer pool API reads in terms of intent (`ReadOnly`/`ReadWrite`)
/// rather than lock kind.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::Shared,
            Permission::ReadWrite => Lock::Exclusive,
        }
    }
}

/// The two lock modes a `PageLock` grants.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Lock {
    Shared,
    Exclusive,
}
