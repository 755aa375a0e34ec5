/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blob writer was used after it finished.
    #[error("blob writer already closed")]
    WriterClosed,
}

impl StoreError {
    /// `true` for failures of the storage medium itself (disk full,
    /// permissions), as opposed to misuse of a writer.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
