//! The regular chunk grid of an array.
//!
//! A chunk is identified by its *coordinate*: the cell coordinate of its origin along every dimension.
//! Its *indices* are its position in the grid, and its *rank* is the row-major linearisation of its indices
//! (the first dimension varies slowest).

use std::ops::RangeInclusive;

use thiserror::Error;

use super::{ChunkCoordinate, ChunkIndices, Dimension};

/// A chunk grid error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChunkGridError {
    /// The number of elements does not match the array dimensionality.
    #[error("expected {expected} dimensions, found {found}")]
    IncompatibleDimensionality {
        /// The array dimensionality.
        expected: usize,
        /// The number of elements supplied.
        found: usize,
    },
    /// A chunk coordinate is outside the array bounds or not aligned to the chunk grid.
    #[error("chunk coordinate {coordinate:?} is out of bounds or not chunk aligned in dimension {dimension}")]
    OutOfBounds {
        /// The chunk coordinate.
        coordinate: ChunkCoordinate,
        /// The offending dimension.
        dimension: usize,
    },
    /// A cell is outside the array bounds.
    #[error("cell {cell:?} is out of bounds in dimension {dimension}")]
    CellOutOfBounds {
        /// The cell.
        cell: Vec<i64>,
        /// The offending dimension.
        dimension: usize,
    },
    /// Chunk indices are outside the chunk grid.
    #[error("chunk indices {indices:?} are outside the chunk grid {grid_shape:?}")]
    IndicesOutOfBounds {
        /// The chunk indices.
        indices: ChunkIndices,
        /// The chunk grid shape.
        grid_shape: Vec<u64>,
    },
    /// A chunk rank is not less than the number of chunks.
    #[error("chunk rank {rank} is out of range for a grid with {num_chunks} chunks")]
    RankOutOfRange {
        /// The rank.
        rank: u64,
        /// The number of chunks in the grid.
        num_chunks: u64,
    },
}

/// A regular chunk grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    lower_bounds: Vec<i64>,
    upper_bounds: Vec<i64>,
    chunk_lengths: Vec<u64>,
    grid_shape: Vec<u64>,
    num_chunks: u64,
}

impl ChunkGrid {
    /// Create a chunk grid for `dimensions`.
    ///
    /// `dimensions` must belong to a validated [`ArraySchema`](super::ArraySchema).
    #[must_use]
    pub(crate) fn new(dimensions: &[Dimension]) -> Self {
        let grid_shape: Vec<u64> = dimensions.iter().map(Dimension::num_chunks).collect();
        Self {
            lower_bounds: dimensions.iter().map(|d| d.lower_bound).collect(),
            upper_bounds: dimensions.iter().map(|d| d.upper_bound).collect(),
            chunk_lengths: dimensions.iter().map(|d| d.chunk_length).collect(),
            num_chunks: grid_shape
                .iter()
                .try_fold(1u64, |acc, &n| acc.checked_mul(n))
                .unwrap_or(u64::MAX),
            grid_shape,
        }
    }

    /// The dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.grid_shape.len()
    }

    /// The number of chunks along each dimension.
    #[must_use]
    pub fn grid_shape(&self) -> &[u64] {
        &self.grid_shape
    }

    /// The total number of chunks in the grid.
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    fn check_dimensionality(&self, found: usize) -> Result<(), ChunkGridError> {
        if found == self.dimensionality() {
            Ok(())
        } else {
            Err(ChunkGridError::IncompatibleDimensionality {
                expected: self.dimensionality(),
                found,
            })
        }
    }

    /// Convert a chunk coordinate to chunk indices.
    ///
    /// # Errors
    /// Returns a [`ChunkGridError`] if the dimensionality is incorrect, or the coordinate is out of bounds or not chunk aligned.
    pub fn chunk_indices(&self, coordinate: &[i64]) -> Result<ChunkIndices, ChunkGridError> {
        self.check_dimensionality(coordinate.len())?;
        coordinate
            .iter()
            .enumerate()
            .map(|(dimension, &value)| {
                let offset = i128::from(value) - i128::from(self.lower_bounds[dimension]);
                let chunk_length = i128::from(self.chunk_lengths[dimension]);
                let aligned = value <= self.upper_bounds[dimension]
                    && offset >= 0
                    && offset % chunk_length == 0;
                aligned
                    .then(|| u64::try_from(offset / chunk_length).ok())
                    .flatten()
                    .ok_or_else(|| ChunkGridError::OutOfBounds {
                        coordinate: coordinate.to_vec(),
                        dimension,
                    })
            })
            .collect()
    }

    /// Convert chunk indices to a chunk coordinate.
    ///
    /// # Errors
    /// Returns a [`ChunkGridError`] if the dimensionality is incorrect or the indices are outside the grid.
    pub fn coordinate(&self, indices: &[u64]) -> Result<ChunkCoordinate, ChunkGridError> {
        self.check_dimensionality(indices.len())?;
        indices
            .iter()
            .enumerate()
            .map(|(dimension, &index)| {
                let origin = (index < self.grid_shape[dimension])
                    .then(|| {
                        i128::from(self.lower_bounds[dimension])
                            + i128::from(index) * i128::from(self.chunk_lengths[dimension])
                    })
                    .and_then(|origin| i64::try_from(origin).ok());
                origin.ok_or_else(|| ChunkGridError::IndicesOutOfBounds {
                    indices: indices.to_vec(),
                    grid_shape: self.grid_shape.clone(),
                })
            })
            .collect()
    }

    /// Return the rank of the chunk at `coordinate`.
    ///
    /// # Errors
    /// Returns a [`ChunkGridError`] if the coordinate is not a valid chunk coordinate.
    pub fn rank(&self, coordinate: &[i64]) -> Result<u64, ChunkGridError> {
        let indices = self.chunk_indices(coordinate)?;
        Ok(self.rank_of_indices(&indices))
    }

    /// Return the rank of validated chunk `indices`.
    fn rank_of_indices(&self, indices: &[u64]) -> u64 {
        indices
            .iter()
            .zip(&self.grid_shape)
            .fold(0, |rank, (&index, &count)| rank * count + index)
    }

    /// Return the chunk coordinate with rank `rank`.
    ///
    /// # Errors
    /// Returns [`ChunkGridError::RankOutOfRange`] if `rank` is not less than [`num_chunks`](ChunkGrid::num_chunks).
    pub fn unrank(&self, rank: u64) -> Result<ChunkCoordinate, ChunkGridError> {
        if rank >= self.num_chunks {
            return Err(ChunkGridError::RankOutOfRange {
                rank,
                num_chunks: self.num_chunks,
            });
        }
        let mut remainder = rank;
        let mut indices = vec![0; self.dimensionality()];
        for (index, &count) in indices.iter_mut().zip(&self.grid_shape).rev() {
            *index = remainder % count;
            remainder /= count;
        }
        self.coordinate(&indices)
    }

    /// Return the inclusive cell range covered by the chunk at `coordinate` along each dimension.
    ///
    /// The range of the final chunk along a dimension is truncated to the array bounds.
    ///
    /// # Errors
    /// Returns a [`ChunkGridError`] if the coordinate is not a valid chunk coordinate.
    pub fn chunk_span(
        &self,
        coordinate: &[i64],
    ) -> Result<Vec<RangeInclusive<i64>>, ChunkGridError> {
        self.chunk_indices(coordinate)?;
        Ok(coordinate
            .iter()
            .zip(&self.chunk_lengths)
            .zip(&self.upper_bounds)
            .map(|((&origin, &chunk_length), &upper_bound)| {
                let end = i128::from(origin) + i128::from(chunk_length) - 1;
                origin..=i64::try_from(end).map_or(upper_bound, |end| end.min(upper_bound))
            })
            .collect())
    }

    /// Return the coordinate of the chunk containing `cell`.
    ///
    /// # Errors
    /// Returns a [`ChunkGridError`] if the dimensionality is incorrect or the cell is outside the array bounds.
    pub fn chunk_origin_of_cell(&self, cell: &[i64]) -> Result<ChunkCoordinate, ChunkGridError> {
        self.check_dimensionality(cell.len())?;
        cell.iter()
            .enumerate()
            .map(|(dimension, &value)| {
                let lower_bound = self.lower_bounds[dimension];
                let origin = (lower_bound..=self.upper_bounds[dimension])
                    .contains(&value)
                    .then(|| {
                        let chunk_length = i128::from(self.chunk_lengths[dimension]);
                        let offset = i128::from(value) - i128::from(lower_bound);
                        i128::from(lower_bound) + offset / chunk_length * chunk_length
                    })
                    .and_then(|origin| i64::try_from(origin).ok());
                origin.ok_or_else(|| ChunkGridError::CellOutOfBounds {
                    cell: cell.to_vec(),
                    dimension,
                })
            })
            .collect()
    }

    /// Return the range of chunk indices intersecting the inclusive cell `region` along each dimension.
    ///
    /// Returns [`None`] if the region does not intersect the array.
    ///
    /// # Errors
    /// Returns [`ChunkGridError::IncompatibleDimensionality`] if the region dimensionality is incorrect.
    pub fn chunk_indices_in_region(
        &self,
        region: &[RangeInclusive<i64>],
    ) -> Result<Option<Vec<RangeInclusive<u64>>>, ChunkGridError> {
        self.check_dimensionality(region.len())?;
        let mut ranges = Vec::with_capacity(region.len());
        for (dimension, range) in region.iter().enumerate() {
            let lower_bound = self.lower_bounds[dimension];
            let start = (*range.start()).max(lower_bound);
            let end = (*range.end()).min(self.upper_bounds[dimension]);
            if start > end {
                return Ok(None);
            }
            let chunk_length = i128::from(self.chunk_lengths[dimension]);
            let index = |value: i64| {
                // bounded by the grid shape, which is a u64
                u64::try_from((i128::from(value) - i128::from(lower_bound)) / chunk_length)
                    .unwrap_or(u64::MAX)
            };
            ranges.push(index(start)..=index(end));
        }
        Ok(Some(ranges))
    }

    /// Return the inclusive range of ranks of chunks with indices in `ranges`.
    ///
    /// Every chunk within `ranges` has a rank within the returned range, though not every rank in the returned range is within `ranges`.
    #[must_use]
    pub fn rank_range(&self, ranges: &[RangeInclusive<u64>]) -> RangeInclusive<u64> {
        let first: Vec<u64> = ranges.iter().map(|range| *range.start()).collect();
        let last: Vec<u64> = ranges.iter().map(|range| *range.end()).collect();
        self.rank_of_indices(&first)..=self.rank_of_indices(&last)
    }
}
