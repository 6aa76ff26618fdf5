use thiserror::Error;

use arraybridge_storage::{StorageError, StoreKey};

use super::{
    ArrayPath, ArrayPathError, ChunkCodecError, ChunkCoordinate, ChunkGridError, ChunkIndexError,
    ChunkKeyError, DescriptorError,
};

/// An array creation error.
#[derive(Clone, Debug, Error)]
pub enum ArrayCreateError {
    /// An invalid array path.
    #[error(transparent)]
    ArrayPathError(#[from] ArrayPathError),
    /// The descriptor could not be read or written.
    #[error(transparent)]
    DescriptorError(#[from] DescriptorError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}

/// Array errors.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ArrayError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid chunk coordinate or cell region.
    #[error(transparent)]
    ChunkGridError(#[from] ChunkGridError),
    /// A chunk key error.
    #[error(transparent)]
    ChunkKeyError(#[from] ChunkKeyError),
    /// A chunk could not be encoded or decoded.
    #[error(transparent)]
    ChunkCodecError(#[from] ChunkCodecError),
    /// The chunk index could not be read or written.
    #[error(transparent)]
    ChunkIndexError(#[from] ChunkIndexError),
    /// The chunk is not in the chunk index.
    #[error("chunk {_0:?} not found")]
    ChunkNotFound(ChunkCoordinate),
    /// An encoded chunk exceeds the configured maximum size.
    #[error("chunk {key} has size {size}, which exceeds the maximum chunk size {max}")]
    ChunkTooLarge {
        /// The chunk key.
        key: StoreKey,
        /// The encoded chunk size.
        size: u64,
        /// The maximum chunk size.
        max: u64,
    },
    /// A chunk is in the chunk index, but its object is missing.
    #[error("chunk {_0} is in the chunk index but its object is missing")]
    MissingChunkObject(StoreKey),
    /// The array was erased by this handle.
    #[error("array {_0} has been erased")]
    Erased(ArrayPath),
}
