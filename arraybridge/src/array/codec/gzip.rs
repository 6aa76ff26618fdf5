//! The `gzip` compression.

use std::io::{Cursor, Read};

use flate2::bufread::{GzDecoder, GzEncoder};

use super::CodecError;

/// Compress `decoded_value` with gzip at `level` (0-9).
///
/// # Errors
/// Returns a [`CodecError`] if compression fails.
pub fn encode(decoded_value: &[u8], level: u32) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Cursor::new(decoded_value), flate2::Compression::new(level));
    let mut out: Vec<u8> = Vec::new();
    encoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Decompress gzip `encoded_value`.
///
/// # Errors
/// Returns a [`CodecError`] if `encoded_value` is not valid gzip.
pub fn decode(encoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
    let mut out: Vec<u8> = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
