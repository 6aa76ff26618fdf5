//! The `crc32c` checksum.
//!
//! The checksum is stored as 4 little-endian bytes after the value it covers.

use super::CodecError;
use crate::config::global_config;

/// The size in bytes of a checksum.
pub const CHECKSUM_SIZE: usize = size_of::<u32>();

/// Append the checksum of `value` to `value`.
#[must_use]
pub fn append_checksum(mut value: Vec<u8>) -> Vec<u8> {
    let checksum = ::crc32c::crc32c(&value).to_le_bytes();
    value.reserve_exact(checksum.len());
    value.extend(&checksum);
    value
}

/// Remove the trailing checksum of `encoded_value`, validating it unless checksum validation is disabled in the global [`Config`](crate::config::Config).
///
/// # Errors
/// Returns a [`CodecError`] if `encoded_value` is too short or the checksum is invalid.
pub fn strip_checksum(mut encoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    if encoded_value.len() < CHECKSUM_SIZE {
        return Err(CodecError::UnexpectedLength {
            expected: CHECKSUM_SIZE,
            found: encoded_value.len(),
        });
    }
    let length = encoded_value.len() - CHECKSUM_SIZE;
    if global_config().validate_checksums() {
        let checksum = ::crc32c::crc32c(&encoded_value[..length]).to_le_bytes();
        if checksum != encoded_value[length..] {
            return Err(CodecError::InvalidChecksum);
        }
    }
    encoded_value.truncate(length);
    Ok(encoded_value)
}

/// The `crc32c` checksum of `value`.
#[must_use]
pub fn checksum(value: &[u8]) -> u32 {
    ::crc32c::crc32c(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn crc32c_checksum() {
        let encoded = append_checksum(b"123456789".to_vec());
        // the standard crc32c check value
        assert_eq!(&encoded[9..], &0xE306_9283_u32.to_le_bytes());
        assert_eq!(strip_checksum(encoded.clone()).unwrap(), b"123456789");

        let mut corrupted = encoded;
        corrupted[0] ^= 1;
        assert!(matches!(
            strip_checksum(corrupted),
            Err(CodecError::InvalidChecksum)
        ));
        assert!(matches!(
            strip_checksum(vec![0, 1]),
            Err(CodecError::UnexpectedLength { .. })
        ));
    }
}
