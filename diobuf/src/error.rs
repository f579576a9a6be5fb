use std::io;

/// Errors surfaced by the writer and its allocation helpers.
///
/// The enum is `Clone` because the writer latches the first descriptor
/// failure and returns it again from every later call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("the writer is closed")]
    Closed,

    #[error("the writer is already closed")]
    AlreadyClosed,

    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error("invalid buffer capacity: {0}")]
    InvalidCapacity(usize),

    #[error("can't allocate aligned buffer")]
    AllocationFailed,

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Descriptor I/O failure, with the kind preserved for matching.
    #[error("I/O error: {msg}")]
    Io { kind: io::ErrorKind, msg: String },
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            msg: err.to_string(),
        }
    }
}
