//! Chunked, sparse arrays.
//!
//! An array is defined by its [`ArrayDescriptor`], which is written once when the array is created:
//!  - **schema**: the ordered attributes (name and [`DataType`]) and dimensions (name, bounds, and chunk length),
//!  - **compression**: applied to every chunk object and index segment,
//!  - **chunk encoding**: the payload format of chunk objects,
//!  - **index split threshold**: the maximum number of chunk coordinates per index segment, and
//!  - (optional) **attributes**: user metadata.
//!
//! An array at path `/a` in a store has the objects
//!  - `a/metadata`: the JSON descriptor,
//!  - `a/index/<first_rank>-<last_rank>-<checksum>`: chunk index segments, and
//!  - `a/chunks/c_<i0>_<i1>...`: one object per populated chunk.
//!
//! The documentation for [`Array`] details how to interact with arrays.

mod array_builder;
mod array_errors;
mod array_sync_readable;
mod array_sync_writable;
mod byte_reader;

pub mod array_descriptor;
pub mod array_path;
pub mod array_schema;
pub mod chunk_codec;
pub mod chunk_data;
pub mod chunk_grid;
pub mod chunk_index;
pub mod chunk_key_encoding;
pub mod codec;
pub mod data_type;
pub mod metadata_store;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;

use arraybridge_storage::{StorageError, StoreKey};

pub use self::array_builder::ArrayBuilder;
pub use self::array_descriptor::{
    ArrayDescriptor, ChunkCompression, ChunkEncoding, DescriptorError, FORMAT_VERSION,
};
pub use self::array_errors::{ArrayCreateError, ArrayError};
pub use self::array_path::{ArrayPath, ArrayPathError};
pub use self::array_schema::{
    ArraySchema, ArraySchemaError, Attribute, Dimension, DEFAULT_CHUNK_LENGTH,
};
pub use self::chunk_codec::{ChunkCodec, ChunkCodecError};
pub use self::chunk_data::{ChunkData, Column, ColumnValues};
pub use self::chunk_grid::{ChunkGrid, ChunkGridError};
pub use self::chunk_index::{
    ChunkIndex, ChunkIndexError, ChunkIndexState, ChunkIndexWriter, IndexEntry, SegmentName,
};
pub use self::chunk_key_encoding::{ChunkKeyEncoding, ChunkKeyError};
pub use self::data_type::DataType;
pub use self::metadata_store::{DescriptorWriteMode, MetadataStore};

/// A chunk coordinate: the cell coordinate of the origin of a chunk along each dimension.
pub type ChunkCoordinate = Vec<i64>;

/// The position of a chunk in the chunk grid along each dimension.
pub type ChunkIndices = Vec<u64>;

/// A chunked, sparse array.
///
/// ## Initialisation
/// A *new* array is created with [`Array::create`] or an [`ArrayBuilder`], which write the array descriptor.
/// An *existing* array is opened with [`Array::open`], which reads the array descriptor.
///
/// ## Writing
/// Chunks are written with [`put_chunk`](Array::put_chunk), or rows spanning many chunks with [`put_rows`](Array::put_rows).
/// A chunk object is always stored before its coordinate is recorded in the chunk index.
/// Recorded coordinates are buffered by the handle and flushed as index segments once
/// `index_split_threshold` coordinates are buffered. Call [`finalize`](Array::finalize) when done writing
/// to flush the remaining coordinates. Other handles only see flushed coordinates.
///
/// There must be at most one writing handle per array at a time.
///
/// ## Reading
/// [`list_chunks`](Array::list_chunks) enumerates populated chunks without retrieving any chunk,
/// and [`get_chunk`](Array::get_chunk) retrieves one. The chunk index is authoritative: a chunk that
/// is not in the index is [`ArrayError::ChunkNotFound`], even if an object exists at its key.
///
/// ## Parallelism
/// [`get_chunks`](Array::get_chunks), [`put_rows`](Array::put_rows), and index listing process chunks
/// and segments concurrently, bounded by the [chunk concurrent limit](crate::config::Config#chunk-concurrent-limit).
pub struct Array<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the array in the store.
    path: ArrayPath,
    /// The descriptor.
    descriptor: ArrayDescriptor,
    /// The chunk grid.
    chunk_grid: ChunkGrid,
    /// Maps chunk coordinates to chunk object names.
    chunk_key_encoding: ChunkKeyEncoding,
    /// Encodes and decodes chunk objects.
    chunk_codec: ChunkCodec,
    /// Reads the chunk index.
    chunk_index: ChunkIndex,
    /// The chunk index entries recorded by this handle.
    index_writer: Mutex<ChunkIndexWriter>,
    /// Set by [`erase`](Array::erase), after which the handle no longer writes.
    erased: AtomicBool,
}

impl<TStorage: ?Sized> Array<TStorage> {
    fn new_with_descriptor(
        storage: Arc<TStorage>,
        path: ArrayPath,
        descriptor: ArrayDescriptor,
        index_state: ChunkIndexState,
    ) -> Self {
        let chunk_grid = ChunkGrid::new(&descriptor.schema.dimensions);
        Self {
            storage,
            chunk_key_encoding: ChunkKeyEncoding::new(&chunk_grid),
            chunk_codec: ChunkCodec::new(&descriptor),
            chunk_index: ChunkIndex::new(
                path.index_prefix(),
                chunk_grid.clone(),
                descriptor.compression,
            ),
            index_writer: Mutex::new(ChunkIndexWriter::new(
                descriptor.index_split_threshold,
                index_state,
            )),
            erased: AtomicBool::new(false),
            path,
            descriptor,
            chunk_grid,
        }
    }

    fn ensure_not_erased(&self) -> Result<(), ArrayError> {
        if self.erased.load(Ordering::Acquire) {
            Err(ArrayError::Erased(self.path.clone()))
        } else {
            Ok(())
        }
    }

    /// Get the underlying storage backing the array.
    #[must_use]
    pub fn storage(&self) -> Arc<TStorage> {
        self.storage.clone()
    }

    /// Get the path of the array.
    #[must_use]
    pub const fn path(&self) -> &ArrayPath {
        &self.path
    }

    /// Get the descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ArrayDescriptor {
        &self.descriptor
    }

    /// Get the schema.
    #[must_use]
    pub const fn schema(&self) -> &ArraySchema {
        &self.descriptor.schema
    }

    /// Get the dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.descriptor.schema.dimensions
    }

    /// Get the user attributes.
    #[must_use]
    pub const fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.descriptor.attributes
    }

    /// Get the chunk grid.
    #[must_use]
    pub const fn chunk_grid(&self) -> &ChunkGrid {
        &self.chunk_grid
    }

    /// Get the chunk key encoding.
    #[must_use]
    pub const fn chunk_key_encoding(&self) -> &ChunkKeyEncoding {
        &self.chunk_key_encoding
    }

    /// Return the key of the chunk object at `coordinate`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `coordinate` is not a valid chunk coordinate.
    pub fn chunk_key(&self, coordinate: &[i64]) -> Result<StoreKey, ArrayError> {
        let name = self.chunk_key_encoding.encode_key(coordinate)?;
        Ok(self
            .path
            .chunks_prefix()
            .key(&name)
            .map_err(StorageError::from)?)
    }

    /// Return the state of the chunk index as seen by this handle.
    #[must_use]
    pub fn index_state(&self) -> ChunkIndexState {
        self.index_writer.lock().state()
    }

    /// Return the number of chunk index entries recorded by this handle that have not been flushed.
    #[must_use]
    pub fn pending_index_entries(&self) -> usize {
        self.index_writer.lock().pending_len()
    }
}

impl<TStorage: ?Sized> Drop for Array<TStorage> {
    fn drop(&mut self) {
        let pending = self.index_writer.get_mut().pending_len();
        if pending > 0 {
            log::warn!(
                "array {} dropped with {pending} chunk index entries that were not flushed, call finalize() after writing",
                self.path
            );
        }
    }
}
