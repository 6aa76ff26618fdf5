//! Chunk key encoding.
//!
//! A chunk at indices `[i0, i1, ...]` is stored at `c_<i0>_<i1>...` under the chunks prefix of its array.
//! Each index is zero-padded to the decimal width of the largest index along its dimension,
//! so every chunk key of an array has the same length and the lexical order of keys is the rank order of chunks.

use itertools::Itertools;
use thiserror::Error;

use super::{ChunkCoordinate, ChunkGrid, ChunkGridError};

/// The prefix of every chunk object name.
const CHUNK_NAME_PREFIX: &str = "c";

/// The separator between chunk indices in a chunk object name.
const SEPARATOR: char = '_';

/// A chunk key error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChunkKeyError {
    /// The key does not have the structure of a chunk key of this array.
    #[error("malformed chunk key {key:?}: {reason}")]
    MalformedKey {
        /// The key.
        key: String,
        /// The reason the key is malformed.
        reason: String,
    },
    /// The chunk coordinate is invalid.
    #[error(transparent)]
    ChunkGridError(#[from] ChunkGridError),
}

/// The chunk key encoding of an array.
#[derive(Clone, Debug)]
pub struct ChunkKeyEncoding {
    grid: ChunkGrid,
    widths: Vec<usize>,
}

fn decimal_width(value: u64) -> usize {
    value.checked_ilog10().map_or(1, |log| log as usize + 1)
}

impl ChunkKeyEncoding {
    /// Create the chunk key encoding for `grid`.
    #[must_use]
    pub fn new(grid: &ChunkGrid) -> Self {
        Self {
            grid: grid.clone(),
            widths: grid
                .grid_shape()
                .iter()
                .map(|&count| decimal_width(count.saturating_sub(1)))
                .collect(),
        }
    }

    /// Encode the chunk object name of the chunk at `coordinate`.
    ///
    /// # Errors
    /// Returns [`ChunkKeyError::ChunkGridError`] if `coordinate` is not a valid chunk coordinate.
    pub fn encode_key(&self, coordinate: &[i64]) -> Result<String, ChunkKeyError> {
        let indices = self.grid.chunk_indices(coordinate)?;
        Ok(std::iter::once(CHUNK_NAME_PREFIX.to_string())
            .chain(
                indices
                    .iter()
                    .zip(&self.widths)
                    .map(|(index, &width)| format!("{index:0width$}")),
            )
            .join(&SEPARATOR.to_string()))
    }

    /// Decode the chunk coordinate from a chunk object name.
    ///
    /// # Errors
    /// Returns [`ChunkKeyError::MalformedKey`] if `key` has the wrong prefix, number of indices, or index widths,
    /// contains non-digit characters, or refers to a chunk outside the grid.
    pub fn decode_key(&self, key: &str) -> Result<ChunkCoordinate, ChunkKeyError> {
        let malformed = |reason: String| ChunkKeyError::MalformedKey {
            key: key.to_string(),
            reason,
        };

        let mut parts = key.split(SEPARATOR);
        if parts.next() != Some(CHUNK_NAME_PREFIX) {
            return Err(malformed(format!(
                "expected prefix `{CHUNK_NAME_PREFIX}{SEPARATOR}`"
            )));
        }
        let parts = parts.collect_vec();
        if parts.len() != self.widths.len() {
            return Err(malformed(format!(
                "expected {} indices, found {}",
                self.widths.len(),
                parts.len()
            )));
        }
        let indices = parts
            .iter()
            .zip(&self.widths)
            .map(|(part, &width)| {
                if part.len() != width {
                    Err(malformed(format!(
                        "expected index {part:?} to have width {width}"
                    )))
                } else if !part.bytes().all(|byte| byte.is_ascii_digit()) {
                    Err(malformed(format!("index {part:?} is not a decimal integer")))
                } else {
                    part.parse::<u64>()
                        .map_err(|err| malformed(format!("index {part:?}: {err}")))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.grid
            .coordinate(&indices)
            .map_err(|err| malformed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Dimension;

    fn encoding() -> ChunkKeyEncoding {
        ChunkKeyEncoding::new(&ChunkGrid::new(&[
            Dimension::new("i", 0, 119, 10),
            Dimension::new("j", -5, 4, 5),
        ]))
    }

    #[test]
    fn chunk_key_encode() {
        let encoding = encoding();
        assert_eq!(encoding.encode_key(&[0, -5]).unwrap(), "c_00_0");
        assert_eq!(encoding.encode_key(&[90, 0]).unwrap(), "c_09_1");
        assert_eq!(encoding.encode_key(&[110, 0]).unwrap(), "c_11_1");
        assert!(matches!(
            encoding.encode_key(&[5, 0]),
            Err(ChunkKeyError::ChunkGridError(_))
        ));
    }

    #[test]
    fn chunk_key_round_trip() {
        let encoding = encoding();
        let grid = &encoding.grid;
        let mut previous: Option<String> = None;
        for rank in 0..grid.num_chunks() {
            let coordinate = grid.unrank(rank).unwrap();
            let key = encoding.encode_key(&coordinate).unwrap();
            assert_eq!(encoding.decode_key(&key).unwrap(), coordinate);
            if let Some(previous) = previous {
                assert!(previous < key);
            }
            previous = Some(key);
        }
    }

    #[test]
    fn chunk_key_decode_malformed() {
        let encoding = encoding();
        for key in [
            "", "x_00_0", "c", "c_00", "c_00_0_0", "c_0_0", "c_000_0", "c_0a_0", "c_+1_0",
            "c_12_0", "c_00_2", "c__0",
        ] {
            assert!(
                matches!(
                    encoding.decode_key(key),
                    Err(ChunkKeyError::MalformedKey { .. })
                ),
                "{key}"
            );
        }
    }

    #[test]
    fn chunk_key_single_chunk() {
        let encoding = ChunkKeyEncoding::new(&ChunkGrid::new(&[Dimension::new("i", 0, 9, 10)]));
        assert_eq!(encoding.encode_key(&[0]).unwrap(), "c_0");
        assert_eq!(encoding.decode_key("c_0").unwrap(), vec![0]);
    }
}
