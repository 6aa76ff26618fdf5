//! The chunk codec: encodes [`ChunkData`] to chunk objects and decodes them.
//!
//! ## The `columnar_v1` encoding
//! All integers are little-endian.
//! ```text
//! magic       b"ABCK"
//! version     u8 (1)
//! num_rows    u64
//! num_columns u32
//! columns     num_columns x {
//!     name_length u32
//!     name        UTF-8 bytes
//!     data_type   u8 (see DataType::tag)
//!     data_length u64
//!     data        fixed-size values, or (num_rows + 1) u64 offsets followed by UTF-8 bytes for strings
//! }
//! checksum    u32 crc32c of everything before it
//! ```
//! The whole body, including the checksum, is compressed with the array [`ChunkCompression`].

use std::ops::RangeInclusive;

use thiserror::Error;

use super::{
    byte_reader::ByteReader,
    codec::{self, CodecError},
    ArrayDescriptor, ArraySchema, ChunkCompression, ChunkData, ChunkEncoding, ChunkGrid,
    ChunkGridError, Column, ColumnValues, DataType,
};

const MAGIC: &[u8; 4] = b"ABCK";

const BODY_VERSION: u8 = 1;

/// A chunk codec error.
#[derive(Clone, Debug, Error)]
pub enum ChunkCodecError {
    /// The columns do not match the array schema.
    #[error("chunk columns [{found}] do not match the array schema columns [{expected}]")]
    SchemaMismatch {
        /// The schema columns, as `name:data_type`.
        expected: String,
        /// The chunk columns, as `name:data_type`.
        found: String,
    },
    /// A column has a different length to the first column.
    #[error("column {column} has {found} values, expected {expected}")]
    ColumnLengthMismatch {
        /// The column name.
        column: String,
        /// The expected number of values.
        expected: usize,
        /// The number of values found.
        found: usize,
    },
    /// A row lies outside the span of its chunk.
    #[error("dimension {dimension} value {value} is outside the chunk span {span:?}")]
    RowOutOfChunkBounds {
        /// The dimension name.
        dimension: String,
        /// The dimension value.
        value: i64,
        /// The cell span of the chunk along the dimension.
        span: RangeInclusive<i64>,
    },
    /// An encoded chunk is structurally invalid.
    #[error("corrupt chunk: {0}")]
    CorruptChunk(String),
    /// A codec error.
    #[error(transparent)]
    CodecError(#[from] CodecError),
    /// An invalid chunk coordinate or cell.
    #[error(transparent)]
    ChunkGridError(#[from] ChunkGridError),
}

/// Encodes and decodes the chunks of an array.
#[derive(Clone, Debug)]
pub struct ChunkCodec {
    schema: ArraySchema,
    compression: ChunkCompression,
    encoding: ChunkEncoding,
    grid: ChunkGrid,
}

impl ChunkCodec {
    /// Create the chunk codec of the array described by the validated `descriptor`.
    #[must_use]
    pub(crate) fn new(descriptor: &ArrayDescriptor) -> Self {
        Self {
            schema: descriptor.schema.clone(),
            compression: descriptor.compression,
            encoding: descriptor.chunk_encoding,
            grid: ChunkGrid::new(&descriptor.schema.dimensions),
        }
    }

    /// Encode the rows of the chunk at `coordinate`.
    ///
    /// # Errors
    /// Returns a [`ChunkCodecError`] if
    ///  - `coordinate` is not a valid chunk coordinate,
    ///  - the columns of `chunk` do not match the schema, or
    ///  - a row lies outside the chunk.
    pub fn encode(&self, coordinate: &[i64], chunk: &ChunkData) -> Result<Vec<u8>, ChunkCodecError> {
        let span = self.grid.chunk_span(coordinate)?;
        chunk.validate(&self.schema)?;
        for ((dimension, values), span) in self
            .schema
            .dimensions
            .iter()
            .zip(chunk.dimension_columns(&self.schema))
            .zip(span)
        {
            if let Some(&value) = values.iter().find(|&&value| !span.contains(&value)) {
                return Err(ChunkCodecError::RowOutOfChunkBounds {
                    dimension: dimension.name.clone(),
                    value,
                    span,
                });
            }
        }

        let body = match self.encoding {
            ChunkEncoding::ColumnarV1 => encode_columnar_v1(chunk),
        };
        Ok(codec::encode(&self.compression, body)?)
    }

    /// Decode an encoded chunk.
    ///
    /// # Errors
    /// Returns
    ///  - [`ChunkCodecError::CorruptChunk`] if decompression fails or the chunk is structurally invalid,
    ///  - [`ChunkCodecError::SchemaMismatch`] if the decoded columns do not match the schema, or
    ///  - [`ChunkCodecError::CodecError`] if the compression is not supported.
    pub fn decode(&self, encoded: Vec<u8>) -> Result<ChunkData, ChunkCodecError> {
        let body = codec::decode(&self.compression, encoded).map_err(|err| match err {
            CodecError::UnsupportedCompression(_) => ChunkCodecError::CodecError(err),
            CodecError::IOError(_)
            | CodecError::InvalidChecksum
            | CodecError::UnexpectedLength { .. } => ChunkCodecError::CorruptChunk(err.to_string()),
        })?;
        let chunk = match self.encoding {
            ChunkEncoding::ColumnarV1 => {
                decode_columnar_v1(&body).map_err(ChunkCodecError::CorruptChunk)?
            }
        };
        chunk.validate(&self.schema)?;
        Ok(chunk)
    }
}

macro_rules! fixed_size_values {
    ($values:expr, $data:ident, $value:ident => $to_bytes:expr) => {
        for $value in $values {
            $data.extend_from_slice(&$to_bytes);
        }
    };
}

fn encode_values(values: &ColumnValues, data: &mut Vec<u8>) {
    match values {
        ColumnValues::Bool(values) => data.extend(values.iter().map(|&value| u8::from(value))),
        ColumnValues::Int8(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::Int16(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::Int32(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::Int64(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::UInt8(values) => data.extend_from_slice(values),
        ColumnValues::UInt16(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::UInt32(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::UInt64(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::Float(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::Double(values) => fixed_size_values!(values, data, value => value.to_le_bytes()),
        ColumnValues::String(values) => {
            let mut offset = 0u64;
            data.extend_from_slice(&offset.to_le_bytes());
            for value in values {
                offset += value.len() as u64;
                data.extend_from_slice(&offset.to_le_bytes());
            }
            for value in values {
                data.extend_from_slice(value.as_bytes());
            }
        }
    }
}

fn encode_columnar_v1(chunk: &ChunkData) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(MAGIC);
    body.push(BODY_VERSION);
    body.extend_from_slice(&(chunk.num_rows() as u64).to_le_bytes());
    body.extend_from_slice(&(chunk.columns().len() as u32).to_le_bytes());
    let mut data = Vec::new();
    for column in chunk.columns() {
        body.extend_from_slice(&(column.name.len() as u32).to_le_bytes());
        body.extend_from_slice(column.name.as_bytes());
        body.push(column.values.data_type().tag());
        data.clear();
        encode_values(&column.values, &mut data);
        body.extend_from_slice(&(data.len() as u64).to_le_bytes());
        body.extend_from_slice(&data);
    }
    body
}

macro_rules! decode_fixed_size {
    ($data:expr, $ty:ty) => {
        $data
            .chunks_exact(size_of::<$ty>())
            .map(|bytes| {
                let mut array = [0u8; size_of::<$ty>()];
                array.copy_from_slice(bytes);
                <$ty>::from_le_bytes(array)
            })
            .collect::<Vec<$ty>>()
            .into()
    };
}

fn decode_strings(data: &[u8], num_rows: usize) -> Result<ColumnValues, String> {
    let mut reader = ByteReader::new(data);
    let offsets = (0..=num_rows)
        .map(|_| reader.read_u64())
        .collect::<Result<Vec<_>, _>>()?;
    let bytes = reader.take(reader.remaining())?;
    if offsets.first() != Some(&0)
        || offsets.last() != Some(&(bytes.len() as u64))
        || !offsets.is_sorted()
    {
        return Err(format!(
            "invalid string offsets for {} bytes of string data",
            bytes.len()
        ));
    }
    offsets
        .iter()
        .zip(offsets.iter().skip(1))
        .map(|(&start, &end)| {
            // offsets are bounded by bytes.len()
            let (start, end) = (start as usize, end as usize);
            std::str::from_utf8(&bytes[start..end])
                .map(str::to_string)
                .map_err(|err| format!("invalid UTF-8 string: {err}"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ColumnValues::String)
}

fn decode_values(data_type: DataType, data: &[u8], num_rows: usize) -> Result<ColumnValues, String> {
    if let Some(size) = data_type.fixed_size() {
        if num_rows.checked_mul(size) != Some(data.len()) {
            return Err(format!(
                "expected {num_rows} {data_type} values, found {} bytes",
                data.len()
            ));
        }
    }
    Ok(match data_type {
        DataType::Bool => data
            .iter()
            .map(|&byte| match byte {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(format!("invalid bool byte {byte}")),
            })
            .collect::<Result<Vec<_>, _>>()?
            .into(),
        DataType::Int8 => decode_fixed_size!(data, i8),
        DataType::Int16 => decode_fixed_size!(data, i16),
        DataType::Int32 => decode_fixed_size!(data, i32),
        DataType::Int64 => decode_fixed_size!(data, i64),
        DataType::UInt8 => data.to_vec().into(),
        DataType::UInt16 => decode_fixed_size!(data, u16),
        DataType::UInt32 => decode_fixed_size!(data, u32),
        DataType::UInt64 => decode_fixed_size!(data, u64),
        DataType::Float => decode_fixed_size!(data, f32),
        DataType::Double => decode_fixed_size!(data, f64),
        DataType::String => decode_strings(data, num_rows)?,
    })
}

fn decode_columnar_v1(body: &[u8]) -> Result<ChunkData, String> {
    let mut reader = ByteReader::new(body);
    reader.expect_magic(MAGIC)?;
    let version = reader.read_u8()?;
    if version != BODY_VERSION {
        return Err(format!("unsupported chunk body version {version}"));
    }
    let num_rows = usize::try_from(reader.read_u64()?)
        .map_err(|_| "the row count exceeds usize::MAX".to_string())?;
    let num_columns = reader.read_u32()?;
    let mut columns = Vec::new();
    for _ in 0..num_columns {
        let name_length = reader.read_u32()? as usize;
        let name = std::str::from_utf8(reader.take(name_length)?)
            .map_err(|err| format!("invalid UTF-8 column name: {err}"))?
            .to_string();
        let tag = reader.read_u8()?;
        let data_type =
            DataType::from_tag(tag).ok_or_else(|| format!("invalid data type tag {tag}"))?;
        let data_length = reader.read_length()?;
        let values = decode_values(data_type, reader.take(data_length)?, num_rows)
            .map_err(|err| format!("column {name}: {err}"))?;
        columns.push(Column::new(name, values));
    }
    reader.finish()?;
    Ok(ChunkData::new(columns))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn descriptor(compression: ChunkCompression) -> ArrayDescriptor {
        ArrayDescriptor::new(
            "<b:bool,i8:int8,i16:int16,i32:int32,i64:int64,u8:uint8,u16:uint16,u32:uint32,u64:uint64,f:float,d:double,s:string> [i=0:9:0:5; j=-10:9:0:10]"
                .parse()
                .unwrap(),
            compression,
            10,
        )
        .unwrap()
    }

    fn chunk() -> ChunkData {
        ChunkData::from_columns([
            ("b", vec![true, false, true].into()),
            ("i8", vec![-1i8, 0, 1].into()),
            ("i16", vec![-300i16, 0, 300].into()),
            ("i32", vec![i32::MIN, 0, i32::MAX].into()),
            ("i64", vec![i64::MIN, 0, i64::MAX].into()),
            ("u8", vec![0u8, 1, 255].into()),
            ("u16", vec![0u16, 1, u16::MAX].into()),
            ("u32", vec![0u32, 1, u32::MAX].into()),
            ("u64", vec![0u64, 1, u64::MAX].into()),
            ("f", vec![-0.5f32, f32::MAX, 1.0].into()),
            ("d", vec![-0.5f64, f64::MIN_POSITIVE, 1e300].into()),
            ("s", vec!["", "héllo", "world"].into()),
            ("i", vec![5i64, 9, 7].into()),
            ("j", vec![-10i64, -1, -5].into()),
        ])
    }

    fn compressions() -> Vec<ChunkCompression> {
        vec![
            ChunkCompression::None,
            #[cfg(feature = "gzip")]
            ChunkCompression::Gzip { level: 1 },
            #[cfg(feature = "zstd")]
            ChunkCompression::Zstd { level: 5 },
        ]
    }

    #[test]
    fn chunk_codec_all_data_types() {
        for compression in compressions() {
            let codec = ChunkCodec::new(&descriptor(compression));
            let encoded = codec.encode(&[5, -10], &chunk()).unwrap();
            assert_eq!(codec.decode(encoded).unwrap(), chunk());
        }
    }

    #[test]
    fn chunk_codec_empty() {
        let descriptor = descriptor(ChunkCompression::None);
        let codec = ChunkCodec::new(&descriptor);
        let empty = ChunkData::new_empty(&descriptor.schema);
        let encoded = codec.encode(&[0, -10], &empty).unwrap();
        assert_eq!(codec.decode(encoded).unwrap(), empty);
    }

    #[test]
    fn chunk_codec_layout() {
        let descriptor =
            ArrayDescriptor::new("<v:int32> [i=0:9:0:10]".parse().unwrap(), ChunkCompression::None, 1)
                .unwrap();
        let codec = ChunkCodec::new(&descriptor);
        let chunk = ChunkData::from_columns([("v", vec![7i32].into()), ("i", vec![3i64].into())]);
        let encoded = codec.encode(&[0], &chunk).unwrap();
        let mut expected = b"ABCK\x01".to_vec();
        expected.extend(1u64.to_le_bytes());
        expected.extend(2u32.to_le_bytes());
        expected.extend(1u32.to_le_bytes());
        expected.extend(b"v\x03");
        expected.extend(4u64.to_le_bytes());
        expected.extend(7i32.to_le_bytes());
        expected.extend(1u32.to_le_bytes());
        expected.extend(b"i\x04");
        expected.extend(8u64.to_le_bytes());
        expected.extend(3i64.to_le_bytes());
        expected.extend(::crc32c::crc32c(&expected).to_le_bytes());
        assert_eq!(encoded, expected);
    }

    #[test]
    fn chunk_codec_encode_errors() {
        let codec = ChunkCodec::new(&descriptor(ChunkCompression::None));
        assert!(matches!(
            codec.encode(&[1, -10], &chunk()),
            Err(ChunkCodecError::ChunkGridError(ChunkGridError::OutOfBounds { .. }))
        ));
        match codec.encode(&[0, -10], &chunk()) {
            Err(ChunkCodecError::RowOutOfChunkBounds {
                dimension,
                value,
                span,
            }) => {
                assert_eq!(dimension, "i");
                assert_eq!(value, 5);
                assert_eq!(span, 0..=4);
            }
            result => panic!("unexpected result {result:?}"),
        }
        let missing_column = ChunkData::from_columns([("i", vec![5i64].into())]);
        assert!(matches!(
            codec.encode(&[5, -10], &missing_column),
            Err(ChunkCodecError::SchemaMismatch { .. })
        ));
    }

    #[test]
    #[serial]
    fn chunk_codec_decode_corrupt() {
        let codec = ChunkCodec::new(&descriptor(ChunkCompression::None));
        let encoded = codec.encode(&[5, -10], &chunk()).unwrap();

        let mut flipped = encoded.clone();
        flipped[20] ^= 0xff;
        assert!(matches!(
            codec.decode(flipped),
            Err(ChunkCodecError::CorruptChunk(_))
        ));

        let truncated = codec::encode(&ChunkCompression::None, encoded[..40].to_vec()).unwrap();
        assert!(matches!(
            codec.decode(truncated),
            Err(ChunkCodecError::CorruptChunk(_))
        ));

        let mut bad_magic = encoded[..encoded.len() - 4].to_vec();
        bad_magic[0] = b'X';
        assert!(matches!(
            codec.decode(codec::encode(&ChunkCompression::None, bad_magic).unwrap()),
            Err(ChunkCodecError::CorruptChunk(_))
        ));

        let mut trailing = encoded[..encoded.len() - 4].to_vec();
        trailing.push(0);
        assert!(matches!(
            codec.decode(codec::encode(&ChunkCompression::None, trailing).unwrap()),
            Err(ChunkCodecError::CorruptChunk(_))
        ));
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn chunk_codec_decode_not_compressed() {
        let codec = ChunkCodec::new(&descriptor(ChunkCompression::Zstd { level: 1 }));
        assert!(matches!(
            codec.decode(b"not zstd".to_vec()),
            Err(ChunkCodecError::CorruptChunk(_))
        ));
    }

    #[test]
    fn chunk_codec_schema_mismatch() {
        let writer = ChunkCodec::new(
            &ArrayDescriptor::new("<v:int32> [i=0:9:0:10]".parse().unwrap(), ChunkCompression::None, 1)
                .unwrap(),
        );
        let reader = ChunkCodec::new(
            &ArrayDescriptor::new("<v:int64> [i=0:9:0:10]".parse().unwrap(), ChunkCompression::None, 1)
                .unwrap(),
        );
        let chunk = ChunkData::from_columns([("v", vec![7i32].into()), ("i", vec![3i64].into())]);
        let encoded = writer.encode(&[0], &chunk).unwrap();
        match reader.decode(encoded) {
            Err(ChunkCodecError::SchemaMismatch { expected, found }) => {
                assert_eq!(expected, "v:int64,i:int64");
                assert_eq!(found, "v:int32,i:int64");
            }
            result => panic!("unexpected result {result:?}"),
        }
    }
}
