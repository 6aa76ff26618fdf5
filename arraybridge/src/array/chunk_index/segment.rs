//! Index segment names and bodies.
//!
//! A segment is named `<first_rank>-<last_rank>-<checksum>`, with ranks as 20 digit decimals and the
//! `crc32c` checksum of the uncompressed body as 8 hex digits.
//!
//! The body (all integers little-endian):
//! ```text
//! magic       b"ABIX"
//! version     u8 (1)
//! ndim        u32
//! count       u64
//! coordinates count x ndim i64, in strictly ascending rank order
//! checksum    u32 crc32c of everything before it
//! ```
//! The whole body, including the checksum, is compressed with the array compression.

use std::{collections::BTreeMap, fmt::Display, ops::RangeInclusive, str::FromStr};

use arraybridge_storage::StoreKey;

use super::{ChunkIndexError, IndexEntry};
use crate::array::{
    byte_reader::ByteReader,
    codec::{self, crc32c, CodecError},
    ChunkCompression, ChunkCoordinate, ChunkGrid,
};
use crate::config::global_config;

const MAGIC: &[u8; 4] = b"ABIX";

const BODY_VERSION: u8 = 1;

const RANK_WIDTH: usize = 20;

const CHECKSUM_WIDTH: usize = 8;

/// The name of an index segment object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentName {
    /// The rank of the first entry.
    pub first_rank: u64,
    /// The rank of the last entry.
    pub last_rank: u64,
    /// The checksum of the uncompressed segment body.
    pub checksum: u32,
}

impl SegmentName {
    /// The inclusive rank range covered by the segment.
    #[must_use]
    pub fn ranks(&self) -> RangeInclusive<u64> {
        self.first_rank..=self.last_rank
    }

    /// Returns true if the segment rank range intersects `ranks`.
    #[must_use]
    pub fn overlaps(&self, ranks: &RangeInclusive<u64>) -> bool {
        self.first_rank <= *ranks.end() && *ranks.start() <= self.last_rank
    }
}

impl Display for SegmentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:0RANK_WIDTH$}-{:0RANK_WIDTH$}-{:0CHECKSUM_WIDTH$x}",
            self.first_rank, self.last_rank, self.checksum
        )
    }
}

impl FromStr for SegmentName {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid index segment name {name:?}");
        let parts: Vec<&str> = name.split('-').collect();
        let [first, last, checksum] = parts.as_slice() else {
            return Err(invalid());
        };
        let is_rank = |part: &str| part.len() == RANK_WIDTH && part.bytes().all(|b| b.is_ascii_digit());
        if !is_rank(first)
            || !is_rank(last)
            || checksum.len() != CHECKSUM_WIDTH
            || !checksum.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        let segment_name = Self {
            first_rank: first.parse().map_err(|_| invalid())?,
            last_rank: last.parse().map_err(|_| invalid())?,
            checksum: u32::from_str_radix(checksum, 16).map_err(|_| invalid())?,
        };
        if segment_name.first_rank > segment_name.last_rank {
            return Err(invalid());
        }
        Ok(segment_name)
    }
}

/// Encode the `entries` of a segment.
///
/// `entries` must not be empty.
pub(super) fn encode_segment(
    compression: &ChunkCompression,
    dimensionality: usize,
    entries: &BTreeMap<u64, ChunkCoordinate>,
) -> Result<(SegmentName, Vec<u8>), CodecError> {
    let mut body = Vec::with_capacity(17 + entries.len() * dimensionality * size_of::<i64>());
    body.extend_from_slice(MAGIC);
    body.push(BODY_VERSION);
    body.extend_from_slice(&(dimensionality as u32).to_le_bytes());
    body.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for coordinate in entries.values() {
        for value in coordinate {
            body.extend_from_slice(&value.to_le_bytes());
        }
    }
    let name = SegmentName {
        first_rank: entries.keys().next().copied().unwrap_or_default(),
        last_rank: entries.keys().next_back().copied().unwrap_or_default(),
        checksum: crc32c::checksum(&body),
    };
    Ok((name, codec::encode(compression, body)?))
}

/// Decode the entries of the segment `name` stored at `key`.
pub(super) fn decode_segment(
    compression: &ChunkCompression,
    grid: &ChunkGrid,
    key: &StoreKey,
    name: &SegmentName,
    encoded: Vec<u8>,
) -> Result<Vec<IndexEntry>, ChunkIndexError> {
    let corrupt = |reason: String| ChunkIndexError::CorruptIndexSegment {
        key: key.clone(),
        reason,
    };
    let body = match codec::decode(compression, encoded) {
        Ok(body) => body,
        Err(err @ CodecError::UnsupportedCompression(_)) => return Err(err.into()),
        Err(err) => return Err(corrupt(err.to_string())),
    };
    decode_body(grid, name, &body).map_err(corrupt)
}

fn decode_body(grid: &ChunkGrid, name: &SegmentName, body: &[u8]) -> Result<Vec<IndexEntry>, String> {
    if global_config().validate_checksums() && crc32c::checksum(body) != name.checksum {
        return Err("the segment body does not match the checksum in its name".to_string());
    }
    let mut reader = ByteReader::new(body);
    reader.expect_magic(MAGIC)?;
    let version = reader.read_u8()?;
    if version != BODY_VERSION {
        return Err(format!("unsupported segment body version {version}"));
    }
    let dimensionality = reader.read_u32()? as usize;
    if dimensionality != grid.dimensionality() {
        return Err(format!(
            "expected {} dimensions, found {dimensionality}",
            grid.dimensionality()
        ));
    }
    let count = reader.read_u64()?;
    if count == 0 {
        return Err("the segment is empty".to_string());
    }
    let entry_size = (dimensionality * size_of::<i64>()) as u64;
    if count.checked_mul(entry_size) != Some(reader.remaining() as u64) {
        return Err(format!(
            "{count} entries do not fit {} bytes",
            reader.remaining()
        ));
    }

    let mut entries: Vec<IndexEntry> = Vec::new();
    for _ in 0..count {
        let coordinate = (0..dimensionality)
            .map(|_| reader.read_i64())
            .collect::<Result<ChunkCoordinate, _>>()?;
        let rank = grid.rank(&coordinate).map_err(|err| err.to_string())?;
        if let Some((previous, _)) = entries.last() {
            if *previous >= rank {
                return Err(format!(
                    "rank {rank} of {coordinate:?} does not follow rank {previous}"
                ));
            }
        }
        entries.push((rank, coordinate));
    }
    reader.finish()?;

    let first = entries.first().map(|(rank, _)| *rank);
    let last = entries.last().map(|(rank, _)| *rank);
    if first != Some(name.first_rank) || last != Some(name.last_rank) {
        return Err(format!(
            "entries span ranks {first:?}..={last:?}, the name claims {:?}",
            name.ranks()
        ));
    }
    Ok(entries)
}
