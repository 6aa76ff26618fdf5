//! The `zstd` compression.

use super::CodecError;

/// Compress `decoded_value` with zstd at `level`.
///
/// # Errors
/// Returns a [`CodecError`] if compression fails.
pub fn encode(decoded_value: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
    Ok(zstd::encode_all(decoded_value, level)?)
}

/// Decompress zstd `encoded_value`.
///
/// # Errors
/// Returns a [`CodecError`] if `encoded_value` is not a valid zstd frame.
pub fn decode(encoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(zstd::decode_all(encoded_value)?)
}
