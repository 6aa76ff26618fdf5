//! The chunk index: the sparse set of chunks that exist in an array.
//!
//! The index is stored as immutable *segments* under the index prefix of an array.
//! Each segment holds a bounded number of chunk coordinates in ascending rank order and is named
//! after the rank range it covers (see [`SegmentName`]).
//!
//! A [`ChunkIndexWriter`] buffers recorded coordinates and flushes them as a segment once the buffer
//! holds `index_split_threshold` entries, and on [`finalize`](ChunkIndexWriter::finalize).
//! Segments flushed at different times may cover overlapping rank ranges, so readers merge all
//! relevant segments by rank and remove duplicates.

mod segment;

pub use segment::SegmentName;

use std::{collections::BTreeMap, ops::RangeInclusive};

use derive_more::Display;
use itertools::Itertools;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thiserror::Error;

use arraybridge_storage::{
    ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StorePrefix,
    WritableStorageTraits,
};

use super::{codec::CodecError, ChunkCompression, ChunkCoordinate, ChunkGrid, ChunkGridError};
use crate::{config::global_config, iter_concurrent_limit};

/// A chunk index entry: the rank of a chunk and its coordinate.
pub type IndexEntry = (u64, ChunkCoordinate);

/// A chunk index error.
#[derive(Clone, Debug, Error)]
pub enum ChunkIndexError {
    /// An index segment could not be parsed.
    #[error("corrupt index segment {key}: {reason}")]
    CorruptIndexSegment {
        /// The segment key.
        key: StoreKey,
        /// The reason the segment is corrupt.
        reason: String,
    },
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// An invalid chunk coordinate.
    #[error(transparent)]
    ChunkGridError(#[from] ChunkGridError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}

/// The state of the chunk index of an array.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum ChunkIndexState {
    /// No index segments have been written.
    Unindexed,
    /// A writer is recording chunks.
    Building,
    /// At least one index segment exists and no writer has unflushed entries.
    Readable,
}

/// Reads and names the index segments of an array.
#[derive(Clone, Debug)]
pub struct ChunkIndex {
    prefix: StorePrefix,
    grid: ChunkGrid,
    compression: ChunkCompression,
}

impl ChunkIndex {
    /// Create a chunk index with segments under `prefix`.
    #[must_use]
    pub fn new(prefix: StorePrefix, grid: ChunkGrid, compression: ChunkCompression) -> Self {
        Self {
            prefix,
            grid,
            compression,
        }
    }

    /// The prefix of the index segments.
    #[must_use]
    pub fn prefix(&self) -> &StorePrefix {
        &self.prefix
    }

    /// The key of the segment `name`.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError::StorageError`] if the index prefix cannot hold the segment name.
    pub fn segment_key(&self, name: &SegmentName) -> Result<StoreKey, ChunkIndexError> {
        Ok(self
            .prefix
            .key(&name.to_string())
            .map_err(StorageError::from)?)
    }

    /// List the index segments, sorted by name.
    ///
    /// # Errors
    /// Returns [`ChunkIndexError::CorruptIndexSegment`] if an object under the index prefix is not a segment,
    /// or a [`ChunkIndexError::StorageError`] if listing fails.
    pub fn segments<TStorage: ?Sized + ListableStorageTraits>(
        &self,
        storage: &TStorage,
    ) -> Result<Vec<(StoreKey, SegmentName)>, ChunkIndexError> {
        let mut segments = storage
            .list_prefix(&self.prefix)?
            .into_iter()
            .map(|key| {
                let name = key
                    .as_str()
                    .strip_prefix(self.prefix.as_str())
                    .unwrap_or(key.as_str());
                match name.parse::<SegmentName>() {
                    Ok(name) => Ok((key, name)),
                    Err(reason) => Err(ChunkIndexError::CorruptIndexSegment { key, reason }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        segments.sort_by_key(|(_, name)| *name);
        Ok(segments)
    }

    /// Returns true if any index segment exists.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError::StorageError`] if listing fails.
    pub fn has_segments<TStorage: ?Sized + ListableStorageTraits>(
        &self,
        storage: &TStorage,
    ) -> Result<bool, ChunkIndexError> {
        Ok(!storage.list_prefix(&self.prefix)?.is_empty())
    }

    fn read_segment<TStorage: ?Sized + ReadableStorageTraits>(
        &self,
        storage: &TStorage,
        key: &StoreKey,
        name: &SegmentName,
    ) -> Result<Vec<IndexEntry>, ChunkIndexError> {
        let encoded = storage
            .get(key)?
            .ok_or_else(|| ChunkIndexError::CorruptIndexSegment {
                key: key.clone(),
                reason: "the segment was listed but could not be retrieved".to_string(),
            })?;
        segment::decode_segment(&self.compression, &self.grid, key, name, encoded.to_vec())
    }

    /// Read `segments` concurrently and merge their entries.
    fn read_segments<TStorage: ?Sized + ReadableStorageTraits>(
        &self,
        storage: &TStorage,
        segments: Vec<(StoreKey, SegmentName)>,
    ) -> Result<Vec<IndexEntry>, ChunkIndexError> {
        log::debug!(
            "reading {} index segments under {}",
            segments.len(),
            self.prefix
        );
        let chunk_concurrent_limit = global_config().chunk_concurrent_limit();
        let read_segment = |(key, name): (StoreKey, SegmentName)| self.read_segment(storage, &key, &name);
        let entries = iter_concurrent_limit!(chunk_concurrent_limit, segments, map, read_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merge_entries(entries))
    }

    /// List every entry of the index in ascending rank order.
    ///
    /// An array without index segments has no entries.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError`] if listing or retrieving fails or any segment is corrupt.
    pub fn list<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
        &self,
        storage: &TStorage,
    ) -> Result<Vec<IndexEntry>, ChunkIndexError> {
        let segments = self.segments(storage)?;
        self.read_segments(storage, segments)
    }

    /// List the entries of the index with a rank in `ranks`, in ascending rank order.
    ///
    /// Only segments whose rank range overlaps `ranks` are retrieved.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError`] if listing or retrieving fails or a retrieved segment is corrupt.
    pub fn list_rank_range<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
        &self,
        storage: &TStorage,
        ranks: &RangeInclusive<u64>,
    ) -> Result<Vec<IndexEntry>, ChunkIndexError> {
        let segments = self
            .segments(storage)?
            .into_iter()
            .filter(|(_, name)| name.overlaps(ranks))
            .collect();
        let mut entries = self.read_segments(storage, segments)?;
        entries.retain(|(rank, _)| ranks.contains(rank));
        Ok(entries)
    }

    /// Returns true if the index holds `rank`.
    ///
    /// Only segments whose rank range covers `rank` are retrieved.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError`] if listing or retrieving fails or a retrieved segment is corrupt.
    pub fn contains<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
        &self,
        storage: &TStorage,
        rank: u64,
    ) -> Result<bool, ChunkIndexError> {
        Ok(!self.list_rank_range(storage, &(rank..=rank))?.is_empty())
    }
}

/// Merge lists of entries sorted by rank into one sorted list without duplicate ranks.
pub fn merge_entries(entries: impl IntoIterator<Item = Vec<IndexEntry>>) -> Vec<IndexEntry> {
    entries
        .into_iter()
        .kmerge_by(|a, b| a.0 < b.0)
        .dedup_by(|a, b| a.0 == b.0)
        .collect()
}

/// Buffers chunk index entries and flushes them as index segments.
///
/// There must be at most one writer per array at a time.
#[derive(Debug)]
pub struct ChunkIndexWriter {
    index_split_threshold: usize,
    pending: BTreeMap<u64, ChunkCoordinate>,
    state: ChunkIndexState,
}

impl ChunkIndexWriter {
    /// Create a writer that flushes a segment every `index_split_threshold` entries.
    ///
    /// `state` is the state of the index when the writer is created.
    #[must_use]
    pub fn new(index_split_threshold: u64, state: ChunkIndexState) -> Self {
        Self {
            index_split_threshold: usize::try_from(index_split_threshold)
                .unwrap_or(usize::MAX)
                .max(1),
            pending: BTreeMap::new(),
            state,
        }
    }

    /// The index state.
    #[must_use]
    pub fn state(&self) -> ChunkIndexState {
        self.state
    }

    /// The number of recorded entries that have not been flushed.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The recorded entries that have not been flushed, in ascending rank order.
    #[must_use]
    pub fn pending_entries(&self) -> Vec<IndexEntry> {
        self.pending
            .iter()
            .map(|(rank, coordinate)| (*rank, coordinate.clone()))
            .collect()
    }

    /// Returns true if `rank` has been recorded but not flushed.
    #[must_use]
    pub fn contains_pending(&self, rank: u64) -> bool {
        self.pending.contains_key(&rank)
    }

    /// Record that the chunk at `coordinate` with `rank` exists.
    ///
    /// Flushes a segment if the buffer reaches the index split threshold.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError`] if a flush fails. The entry remains buffered.
    pub fn record<TStorage: ?Sized + WritableStorageTraits>(
        &mut self,
        index: &ChunkIndex,
        storage: &TStorage,
        rank: u64,
        coordinate: ChunkCoordinate,
    ) -> Result<(), ChunkIndexError> {
        self.pending.insert(rank, coordinate);
        self.state = ChunkIndexState::Building;
        if self.pending.len() >= self.index_split_threshold {
            self.flush(index, storage)?;
        }
        Ok(())
    }

    /// Write the buffered entries as a segment and clear the buffer.
    ///
    /// Returns the key of the segment, or [`None`] if there were no buffered entries.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError`] if encoding or storing the segment fails.
    /// The buffer is kept, so retrying writes the same segment.
    pub fn flush<TStorage: ?Sized + WritableStorageTraits>(
        &mut self,
        index: &ChunkIndex,
        storage: &TStorage,
    ) -> Result<Option<StoreKey>, ChunkIndexError> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let (name, encoded) =
            segment::encode_segment(&index.compression, index.grid.dimensionality(), &self.pending)?;
        let key = index.segment_key(&name)?;
        storage.set(&key, encoded.into())?;
        log::debug!(
            "flushed index segment {key} with {} entries",
            self.pending.len()
        );
        self.pending.clear();
        Ok(Some(key))
    }

    /// Flush any buffered entries and mark the index [`Readable`](ChunkIndexState::Readable) if it has segments.
    ///
    /// This is idempotent.
    ///
    /// # Errors
    /// Returns a [`ChunkIndexError`] if the flush fails.
    pub fn finalize<TStorage: ?Sized + WritableStorageTraits>(
        &mut self,
        index: &ChunkIndex,
        storage: &TStorage,
    ) -> Result<(), ChunkIndexError> {
        self.flush(index, storage)?;
        if self.state == ChunkIndexState::Building {
            self.state = ChunkIndexState::Readable;
        }
        Ok(())
    }
}
