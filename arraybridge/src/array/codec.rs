//! Byte codecs applied to chunk payloads and index segments.
//!
//! Encoding appends a `crc32c` checksum and then compresses with the array [`ChunkCompression`].
//! Decoding reverses these steps.

pub mod crc32c;
#[cfg(feature = "gzip")]
pub mod gzip;
#[cfg(feature = "zstd")]
pub mod zstd;

use std::sync::Arc;

use thiserror::Error;

use super::ChunkCompression;

/// A codec error.
#[derive(Clone, Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] Arc<std::io::Error>),
    /// The checksum does not match the content.
    #[error("the checksum is invalid")]
    InvalidChecksum,
    /// The encoded value is too short to hold a checksum.
    #[error("expected at least {expected} bytes, found {found}")]
    UnexpectedLength {
        /// The minimum length.
        expected: usize,
        /// The length found.
        found: usize,
    },
    /// The compression is not enabled in this build.
    #[error("{0} compression is not supported, enable the `{0}` feature")]
    UnsupportedCompression(&'static str),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::IOError(Arc::new(err))
    }
}

/// Compress `decoded_value` with `compression`.
///
/// # Errors
/// Returns a [`CodecError`] if compression fails or is not enabled.
pub fn compress(compression: &ChunkCompression, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    match compression {
        ChunkCompression::None => Ok(decoded_value),
        #[cfg(feature = "gzip")]
        ChunkCompression::Gzip { level } => gzip::encode(&decoded_value, *level),
        #[cfg(not(feature = "gzip"))]
        ChunkCompression::Gzip { .. } => Err(CodecError::UnsupportedCompression("gzip")),
        #[cfg(feature = "zstd")]
        ChunkCompression::Zstd { level } => zstd::encode(&decoded_value, *level),
        #[cfg(not(feature = "zstd"))]
        ChunkCompression::Zstd { .. } => Err(CodecError::UnsupportedCompression("zstd")),
    }
}

/// Decompress `encoded_value` with `compression`.
///
/// # Errors
/// Returns a [`CodecError`] if decompression fails or is not enabled.
pub fn decompress(compression: &ChunkCompression, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    match compression {
        ChunkCompression::None => Ok(encoded_value),
        #[cfg(feature = "gzip")]
        ChunkCompression::Gzip { .. } => gzip::decode(&encoded_value),
        #[cfg(not(feature = "gzip"))]
        ChunkCompression::Gzip { .. } => Err(CodecError::UnsupportedCompression("gzip")),
        #[cfg(feature = "zstd")]
        ChunkCompression::Zstd { .. } => zstd::decode(&encoded_value),
        #[cfg(not(feature = "zstd"))]
        ChunkCompression::Zstd { .. } => Err(CodecError::UnsupportedCompression("zstd")),
    }
}

/// Append a checksum to `body` and compress it with `compression`.
///
/// # Errors
/// Returns a [`CodecError`] if compression fails or is not enabled.
pub fn encode(compression: &ChunkCompression, body: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    compress(compression, crc32c::append_checksum(body))
}

/// Decompress `encoded_value` with `compression` and strip its checksum.
///
/// # Errors
/// Returns a [`CodecError`] if decompression fails or the checksum is invalid.
pub fn decode(compression: &ChunkCompression, encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    crc32c::strip_checksum(decompress(compression, encoded_value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"a body that compresses a body that compresses a body that compresses";

    fn compressions() -> Vec<ChunkCompression> {
        vec![
            ChunkCompression::None,
            #[cfg(feature = "gzip")]
            ChunkCompression::Gzip { level: 5 },
            #[cfg(feature = "zstd")]
            ChunkCompression::Zstd { level: 3 },
        ]
    }

    #[test]
    fn codec_encode_decode() {
        let body = BODY.repeat(16);
        for compression in compressions() {
            let encoded = encode(&compression, body.clone()).unwrap();
            if compression != ChunkCompression::None {
                assert!(encoded.len() < body.len());
            }
            assert_eq!(decode(&compression, encoded).unwrap(), body);
        }
    }

    #[test]
    fn codec_decode_garbage() {
        for compression in compressions() {
            if compression != ChunkCompression::None {
                assert!(decode(&compression, b"garbage".to_vec()).is_err());
            }
        }
    }
}
