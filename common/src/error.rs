//! Layered error types. `BufferPoolError` covers the page store; `TreeError`
//! covers everything the B+ tree itself can fail with, including a `BufferPool`
//! variant that wraps the former.

use thiserror::Error;

use crate::PageId;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("buffer pool exhausted: no victim frame available")]
    PoolExhausted,

    #[error("page {page_id} is not pinned")]
    NotPinned { page_id: PageId },

    #[error("page {page_id} is still pinned")]
    StillPinned { page_id: PageId },

    #[error("page {page_id} is not resident")]
    NotResident { page_id: PageId },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Three-way outcome used throughout the tree: `Ok(T)` is the `OK` case with a
/// payload, `Ok(None)`-shaped call sites model `DONE`, and `Err` is `FAIL`.
/// Concretely the tree's public methods return `Result<T, TreeError>` and use
/// a `TreeError::Done` variant where the source's `DONE` status applies to a
/// fallible lookup rather than a plain `Option`.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("no such key/record pair")]
    NotFound,

    #[error("no more data")]
    Done,

    #[error("page has no space for this record")]
    NoSpace,

    #[error("structural invariant violated: {0}")]
    Invariant(String),

    #[error("operation not supported")]
    NotSupported,

    #[error(transparent)]
    BufferPool(#[from] BufferPoolError),
}
