use std::{ops::RangeInclusive, sync::Arc};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use arraybridge_storage::{ListableStorageTraits, ReadableStorageTraits};

use super::{
    chunk_index::merge_entries, Array, ArrayCreateError, ArrayError, ArrayPath, ChunkCoordinate,
    ChunkData, ChunkIndexState, IndexEntry, MetadataStore,
};
use crate::{config::global_config, iter_concurrent_limit};

impl<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits> Array<TStorage> {
    /// Open an existing array in `storage` at `path`.
    ///
    /// An array without index segments is opened as [`Unindexed`](ChunkIndexState::Unindexed) and has no chunks.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if
    ///  - `path` is invalid,
    ///  - the descriptor does not exist, is corrupt, or has an unsupported format version, or
    ///  - there is an underlying store error.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        let path = ArrayPath::new(path)?;
        let descriptor = MetadataStore::new(storage.clone(), &path).read()?;
        let index_state = if storage.list_prefix(&path.index_prefix())?.is_empty() {
            ChunkIndexState::Unindexed
        } else {
            ChunkIndexState::Readable
        };
        Ok(Self::new_with_descriptor(
            storage,
            path,
            descriptor,
            index_state,
        ))
    }

    /// Merge durable index `entries` with the entries recorded by this handle in `ranks`.
    fn with_pending_entries(
        &self,
        entries: Vec<IndexEntry>,
        ranks: &RangeInclusive<u64>,
    ) -> Vec<IndexEntry> {
        let mut pending = self.index_writer.lock().pending_entries();
        if pending.is_empty() {
            return entries;
        }
        pending.retain(|(rank, _)| ranks.contains(rank));
        merge_entries([entries, pending])
    }

    /// Return the coordinates of every populated chunk in ascending rank order.
    ///
    /// Includes the chunks recorded by this handle that have not been flushed.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the chunk index cannot be read or is corrupt.
    pub fn list_chunks(&self) -> Result<Vec<ChunkCoordinate>, ArrayError> {
        let entries = self.chunk_index.list(&*self.storage)?;
        Ok(self
            .with_pending_entries(entries, &(0..=u64::MAX))
            .into_iter()
            .map(|(_, coordinate)| coordinate)
            .collect())
    }

    /// Return the coordinates of the populated chunks intersecting the inclusive cell `region`, in ascending rank order.
    ///
    /// Only index segments that may hold chunks in the region are retrieved.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the region dimensionality is incorrect or the chunk index cannot be read or is corrupt.
    pub fn list_chunks_in_region(
        &self,
        region: &[RangeInclusive<i64>],
    ) -> Result<Vec<ChunkCoordinate>, ArrayError> {
        let Some(index_ranges) = self.chunk_grid.chunk_indices_in_region(region)? else {
            return Ok(vec![]);
        };
        let ranks = self.chunk_grid.rank_range(&index_ranges);
        let entries = self.chunk_index.list_rank_range(&*self.storage, &ranks)?;
        let mut coordinates = Vec::new();
        for (_, coordinate) in self.with_pending_entries(entries, &ranks) {
            let indices = self.chunk_grid.chunk_indices(&coordinate)?;
            if indices
                .iter()
                .zip(&index_ranges)
                .all(|(index, range)| range.contains(index))
            {
                coordinates.push(coordinate);
            }
        }
        Ok(coordinates)
    }

    /// Returns true if the chunk at `coordinate` is in the chunk index.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `coordinate` is invalid or the chunk index cannot be read or is corrupt.
    pub fn chunk_exists(&self, coordinate: &[i64]) -> Result<bool, ArrayError> {
        let rank = self.chunk_grid.rank(coordinate)?;
        if self.index_writer.lock().contains_pending(rank) {
            return Ok(true);
        }
        Ok(self.chunk_index.contains(&*self.storage, rank)?)
    }

    /// Retrieve and decode the chunk object at `coordinate` without consulting the chunk index.
    fn retrieve_chunk_object(&self, coordinate: &[i64]) -> Result<ChunkData, ArrayError> {
        let key = self.chunk_key(coordinate)?;
        let encoded = self
            .storage
            .get(&key)?
            .ok_or_else(|| ArrayError::MissingChunkObject(key.clone()))?;
        let chunk_max_size = global_config().chunk_max_size();
        if encoded.len() as u64 > chunk_max_size {
            return Err(ArrayError::ChunkTooLarge {
                key,
                size: encoded.len() as u64,
                max: chunk_max_size,
            });
        }
        Ok(self.chunk_codec.decode(encoded.to_vec())?)
    }

    /// Retrieve the chunk at `coordinate`.
    ///
    /// # Errors
    /// Returns
    ///  - [`ArrayError::ChunkNotFound`] if the chunk is not in the chunk index,
    ///  - [`ArrayError::MissingChunkObject`] if it is in the index but its object is missing,
    ///  - [`ArrayError::ChunkTooLarge`] if the chunk object exceeds the configured maximum chunk size, or
    ///  - another [`ArrayError`] if `coordinate` is invalid, the chunk cannot be decoded, or there is an underlying store error.
    pub fn get_chunk(&self, coordinate: &[i64]) -> Result<ChunkData, ArrayError> {
        if !self.chunk_exists(coordinate)? {
            return Err(ArrayError::ChunkNotFound(coordinate.to_vec()));
        }
        self.retrieve_chunk_object(coordinate)
    }

    /// Retrieve the chunks at `coordinates` concurrently, in the order of `coordinates`.
    ///
    /// The chunk index is read once for all `coordinates`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if any chunk cannot be retrieved, see [`get_chunk`](Array::get_chunk).
    pub fn get_chunks(&self, coordinates: &[ChunkCoordinate]) -> Result<Vec<ChunkData>, ArrayError> {
        let ranks = coordinates
            .iter()
            .map(|coordinate| self.chunk_grid.rank(coordinate))
            .collect::<Result<Vec<_>, _>>()?;
        let (Some(&first), Some(&last)) = (ranks.iter().min(), ranks.iter().max()) else {
            return Ok(vec![]);
        };
        let range = first..=last;
        let entries = self.chunk_index.list_rank_range(&*self.storage, &range)?;
        let entries = self.with_pending_entries(entries, &range);
        for (coordinate, rank) in coordinates.iter().zip(&ranks) {
            if entries.binary_search_by_key(rank, |(rank, _)| *rank).is_err() {
                return Err(ArrayError::ChunkNotFound(coordinate.clone()));
            }
        }

        let chunk_concurrent_limit = global_config().chunk_concurrent_limit();
        let indexed_coordinates: Vec<(usize, &ChunkCoordinate)> =
            coordinates.iter().enumerate().collect();
        let retrieve_chunk = |(index, coordinate): (usize, &ChunkCoordinate)| {
            self.retrieve_chunk_object(coordinate)
                .map(|chunk| (index, chunk))
        };
        let mut chunks = iter_concurrent_limit!(
            chunk_concurrent_limit,
            indexed_coordinates,
            map,
            retrieve_chunk
        )
        .collect::<Result<Vec<_>, _>>()?;
        chunks.sort_by_key(|(index, _)| *index);
        Ok(chunks.into_iter().map(|(_, chunk)| chunk).collect())
    }
}
