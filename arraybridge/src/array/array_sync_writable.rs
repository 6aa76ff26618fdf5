use std::sync::{atomic::Ordering, Arc};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use arraybridge_storage::{
    ListableStorageTraits, ReadableStorageTraits, StoreKey, WritableStorageTraits,
};

use super::{
    Array, ArrayCreateError, ArrayDescriptor, ArrayError, ArrayPath, ChunkCoordinate, ChunkData,
    ChunkIndexState, DescriptorWriteMode, MetadataStore,
};
use crate::{config::global_config, iter_concurrent_limit};

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> Array<TStorage> {
    /// Create a new array in `storage` at `path` and write `descriptor`.
    ///
    /// The chunk index of the new array is [`Unindexed`](ChunkIndexState::Unindexed).
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if
    ///  - `path` is invalid,
    ///  - `descriptor` is invalid,
    ///  - a descriptor already exists at `path`, or
    ///  - there is an underlying store error.
    pub fn create(
        storage: Arc<TStorage>,
        path: &str,
        descriptor: ArrayDescriptor,
    ) -> Result<Self, ArrayCreateError> {
        let path = ArrayPath::new(path)?;
        MetadataStore::new(storage.clone(), &path)
            .write(&descriptor, DescriptorWriteMode::CreateNew)?;
        Ok(Self::new_with_descriptor(
            storage,
            path,
            descriptor,
            ChunkIndexState::Unindexed,
        ))
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Array<TStorage> {
    /// Encode and store the chunk object at `coordinate`, returning its rank.
    ///
    /// Returns [`None`] without storing anything if `chunk` has no rows.
    fn store_chunk_object(
        &self,
        coordinate: &[i64],
        chunk: &ChunkData,
    ) -> Result<Option<u64>, ArrayError> {
        let rank = self.chunk_grid.rank(coordinate)?;
        if chunk.is_empty() {
            chunk.validate(&self.descriptor.schema)?;
            log::debug!(
                "skipping empty chunk {coordinate:?} of array {}",
                self.path
            );
            return Ok(None);
        }
        let key = self.chunk_key(coordinate)?;
        let encoded = self.chunk_codec.encode(coordinate, chunk)?;
        let chunk_max_size = global_config().chunk_max_size();
        if encoded.len() as u64 > chunk_max_size {
            return Err(ArrayError::ChunkTooLarge {
                key,
                size: encoded.len() as u64,
                max: chunk_max_size,
            });
        }
        self.storage.set(&key, encoded.into())?;
        Ok(Some(rank))
    }

    fn record_chunk(&self, rank: u64, coordinate: ChunkCoordinate) -> Result<(), ArrayError> {
        self.index_writer
            .lock()
            .record(&self.chunk_index, &*self.storage, rank, coordinate)?;
        Ok(())
    }

    /// Encode `chunk` and store it at `coordinate`, then record `coordinate` in the chunk index.
    ///
    /// `chunk` must have the columns of the schema (attributes then dimensions) and every row must lie in the chunk.
    /// A chunk with no rows is neither stored nor recorded.
    ///
    /// The chunk object is stored before the coordinate is recorded.
    /// The coordinate is visible to other handles once it is flushed in an index segment,
    /// which happens every `index_split_threshold` recorded chunks and on [`finalize`](Array::finalize).
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `coordinate` is invalid,
    ///  - `chunk` does not match the schema or has a row outside the chunk,
    ///  - the encoded chunk exceeds the configured maximum chunk size,
    ///  - the array has been [erased](Array::erase) by this handle, or
    ///  - there is an underlying store error.
    pub fn put_chunk(&self, coordinate: &[i64], chunk: &ChunkData) -> Result<(), ArrayError> {
        self.ensure_not_erased()?;
        if let Some(rank) = self.store_chunk_object(coordinate, chunk)? {
            self.record_chunk(rank, coordinate.to_vec())?;
        }
        Ok(())
    }

    /// Partition `rows` by chunk and put each chunk.
    ///
    /// Chunk objects are stored concurrently, then recorded in the chunk index in rank order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `rows` does not match the schema, a row is outside the array bounds, or a chunk cannot be put.
    /// Chunks stored before the error are not recorded.
    /// Fails with [`ArrayError::Erased`] once the array has been [erased](Array::erase) by this handle.
    pub fn put_rows(&self, rows: &ChunkData) -> Result<(), ArrayError> {
        self.ensure_not_erased()?;
        let chunks: Vec<(ChunkCoordinate, ChunkData)> = rows
            .partition(&self.descriptor.schema, &self.chunk_grid)?
            .into_iter()
            .collect();
        let chunk_concurrent_limit = global_config().chunk_concurrent_limit();
        let store_chunk = |(coordinate, chunk): (ChunkCoordinate, ChunkData)| {
            self.store_chunk_object(&coordinate, &chunk)
                .map(|rank| (rank, coordinate))
        };
        let mut stored =
            iter_concurrent_limit!(chunk_concurrent_limit, chunks, map, store_chunk)
                .collect::<Result<Vec<_>, _>>()?;
        stored.sort_by_key(|(rank, _)| *rank);
        for (rank, coordinate) in stored {
            if let Some(rank) = rank {
                self.record_chunk(rank, coordinate)?;
            }
        }
        Ok(())
    }

    /// Flush any chunk index entries recorded by this handle.
    ///
    /// Afterwards every chunk put by this handle is visible to other handles.
    /// This is idempotent.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the index segment cannot be stored. The entries remain buffered and `finalize` can be retried.
    /// Fails with [`ArrayError::Erased`] once the array has been [erased](Array::erase) by this handle.
    pub fn finalize(&self) -> Result<(), ArrayError> {
        self.ensure_not_erased()?;
        self.index_writer
            .lock()
            .finalize(&self.chunk_index, &*self.storage)?;
        Ok(())
    }
}

impl<TStorage: ?Sized + ListableStorageTraits + WritableStorageTraits> Array<TStorage> {
    /// Erase the array: its descriptor, chunk index, and chunk objects.
    ///
    /// Entries recorded by this handle that have not been flushed are discarded.
    /// Afterwards this handle rejects [`put_chunk`](Array::put_chunk), [`put_rows`](Array::put_rows), and [`finalize`](Array::finalize).
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if there is an underlying store error.
    pub fn erase(&self) -> Result<(), ArrayError> {
        self.erased.store(true, Ordering::Release);
        let mut keys: Vec<StoreKey> = self.storage.list_prefix(&self.path.chunks_prefix())?;
        keys.extend(self.storage.list_prefix(&self.path.index_prefix())?);
        keys.push(self.path.descriptor_key());
        self.storage.erase_values(&keys)?;
        let mut index_writer = self.index_writer.lock();
        *index_writer = super::ChunkIndexWriter::new(
            self.descriptor.index_split_threshold,
            ChunkIndexState::Unindexed,
        );
        Ok(())
    }
}
