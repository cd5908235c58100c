use std::{fmt, io};

use backtrace::Backtrace;

/// The single error type threaded through the whole engine.
///
/// Modeled after the "one struct with a message" error type the teacher
/// lineage uses (`SimpleError`/`SmallError`), but split into the kinds
/// the lock/buffer-pool protocol actually distinguishes so callers can
/// match on them instead of parsing strings.
#[derive(Debug)]
pub enum EngineError {
    /// Release of a lock the caller does not hold.
    NotHeld(String),

    /// A deadlock was detected while this transaction was waiting; the
    /// transaction must be rolled back by the caller.
    TransactionAborted(String),

    /// Every page in the buffer pool is dirty; there is no clean victim
    /// to evict.
    CacheFull(String),

    /// The requested page does not exist.
    BadPageId(String),

    /// I/O failure reading or writing a page.
    IoError(String),

    /// An unrecognized permission value was requested.
    BadPermission(String),
}

impl EngineError {
    fn message(&self) -> &str {
        match self {
            EngineError::NotHeld(m) => m,
            EngineError::TransactionAborted(m) => m,
            EngineError::CacheFull(m) => m,
            EngineError::BadPageId(m) => m,
            EngineError::IoError(m) => m,
            EngineError::BadPermission(m) => m,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            EngineError::NotHeld(_) => "NotHeld",
            EngineError::TransactionAborted(_) => "TransactionAborted",
            EngineError::CacheFull(_) => "CacheFull",
            EngineError::BadPageId(_) => "BadPageId",
            EngineError::IoError(_) => "IoError",
            EngineError::BadPermission(_) => "BadPermission",
        }
    }

    /// Print a backtrace to stderr, for the cases (deadlock, cache
    /// exhaustion) where seeing the call site matters during debugging.
    pub fn show_backtrace(&self) {
        let bt = Backtrace::new();
        eprintln!("{}: {}\n{:?}", self.kind_name(), self.message(), bt);
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.message())
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::IoError(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
