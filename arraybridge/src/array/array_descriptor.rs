//! The array descriptor: the single, immutable, versioned metadata document of an array.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arraybridge_storage::{StorageError, StoreKey};

use super::{ArraySchema, ArraySchemaError};

/// The descriptor format version written by this crate.
///
/// Descriptors with a greater version are rejected with [`DescriptorError::UnsupportedVersion`].
pub const FORMAT_VERSION: u64 = 1;

/// The payload format of chunk objects.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ChunkEncoding {
    /// Attribute columns followed by dimension columns, see [`chunk_codec`](super::chunk_codec).
    #[default]
    #[serde(rename = "columnar_v1")]
    #[display("columnar_v1")]
    ColumnarV1,
}

/// The compression applied to chunk payloads and index segments.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ChunkCompression {
    /// No compression.
    #[default]
    #[display("none")]
    None,
    /// gzip compression.
    #[display("gzip(level={level})")]
    Gzip {
        /// The compression level, 0-9.
        level: u32,
    },
    /// zstd compression.
    #[display("zstd(level={level})")]
    Zstd {
        /// The compression level.
        level: i32,
    },
}

impl ChunkCompression {
    /// Validate the compression configuration.
    ///
    /// # Errors
    /// Returns [`DescriptorError::InvalidCompression`] if a compression level is out of range.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        match self {
            Self::None => Ok(()),
            Self::Gzip { level } => {
                if *level <= 9 {
                    Ok(())
                } else {
                    Err(DescriptorError::InvalidCompression(format!(
                        "gzip level {level} is not in 0..=9"
                    )))
                }
            }
            Self::Zstd { level } => {
                if (-7..=22).contains(level) {
                    Ok(())
                } else {
                    Err(DescriptorError::InvalidCompression(format!(
                        "zstd level {level} is not in -7..=22"
                    )))
                }
            }
        }
    }
}

/// An array descriptor.
///
/// The descriptor is written exactly once when an array is created and is immutable afterwards.
///
/// Example JSON document:
/// ```json
/// {
///     "format_version": 1,
///     "schema": {
///         "attributes": [{ "name": "v", "data_type": "int64" }],
///         "dimensions": [
///             { "name": "i", "lower_bound": 0, "upper_bound": 19, "chunk_length": 5, "overlap": 0 }
///         ]
///     },
///     "compression": { "name": "zstd", "level": 3 },
///     "chunk_encoding": "columnar_v1",
///     "index_split_threshold": 100000,
///     "attributes": { "namespace": "public" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayDescriptor {
    /// The descriptor format version.
    pub format_version: u64,
    /// The array schema.
    pub schema: ArraySchema,
    /// The compression of chunk payloads and index segments.
    pub compression: ChunkCompression,
    /// The chunk payload format.
    pub chunk_encoding: ChunkEncoding,
    /// The maximum number of chunk coordinates per index segment.
    pub index_split_threshold: u64,
    /// User metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ArrayDescriptor {
    /// Create a new descriptor with the current [`FORMAT_VERSION`].
    ///
    /// # Errors
    /// Returns a [`DescriptorError`] if the descriptor is invalid (see [`ArrayDescriptor::validate`]).
    pub fn new(
        schema: ArraySchema,
        compression: ChunkCompression,
        index_split_threshold: u64,
    ) -> Result<Self, DescriptorError> {
        let descriptor = Self {
            format_version: FORMAT_VERSION,
            schema,
            compression,
            chunk_encoding: ChunkEncoding::default(),
            index_split_threshold,
            attributes: serde_json::Map::default(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Validate the descriptor.
    ///
    /// # Errors
    /// Returns a [`DescriptorError`] if the schema is invalid, the compression level is out of range, or the index split threshold is zero.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        self.schema.validate()?;
        self.compression.validate()?;
        if self.index_split_threshold == 0 {
            return Err(DescriptorError::InvalidIndexSplitThreshold);
        }
        Ok(())
    }

    /// Serialise the descriptor to pretty printed JSON.
    ///
    /// # Errors
    /// Returns [`DescriptorError::Serialization`] if serialisation fails.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, DescriptorError> {
        serde_json::to_vec_pretty(self).map_err(|err| DescriptorError::Serialization(err.to_string()))
    }

    /// Parse a descriptor from the JSON `bytes` stored at `key`.
    ///
    /// The format version is inspected before the rest of the document.
    ///
    /// # Errors
    /// Returns
    ///  - [`DescriptorError::CorruptMetadata`] if the document is not JSON, lacks a valid `format_version`, or is otherwise invalid, or
    ///  - [`DescriptorError::UnsupportedVersion`] if `format_version` exceeds [`FORMAT_VERSION`].
    pub fn from_json_slice(key: &StoreKey, bytes: &[u8]) -> Result<Self, DescriptorError> {
        let corrupt = |reason: String| DescriptorError::CorruptMetadata {
            key: key.clone(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|err| corrupt(err.to_string()))?;
        let format_version = value
            .get("format_version")
            .ok_or_else(|| corrupt("missing field `format_version`".to_string()))?
            .as_u64()
            .filter(|version| *version > 0)
            .ok_or_else(|| corrupt("`format_version` must be a positive integer".to_string()))?;
        if format_version > FORMAT_VERSION {
            return Err(DescriptorError::UnsupportedVersion {
                key: key.clone(),
                found: format_version,
                supported: FORMAT_VERSION,
            });
        }

        let descriptor: Self =
            serde_json::from_value(value).map_err(|err| corrupt(err.to_string()))?;
        descriptor
            .validate()
            .map_err(|err| corrupt(err.to_string()))?;
        Ok(descriptor)
    }
}

/// An array descriptor error.
#[derive(Clone, Debug, Error)]
pub enum DescriptorError {
    /// No descriptor exists at the key.
    #[error("array descriptor not found at {0}")]
    NotFound(StoreKey),
    /// A descriptor already exists at the key.
    #[error("array descriptor already exists at {0}")]
    AlreadyExists(StoreKey),
    /// The descriptor could not be parsed or is invalid.
    #[error("corrupt array descriptor at {key}: {reason}")]
    CorruptMetadata {
        /// The descriptor key.
        key: StoreKey,
        /// The reason the descriptor is corrupt.
        reason: String,
    },
    /// The descriptor format version is not supported.
    #[error("array descriptor at {key} has format version {found}, only versions up to {supported} are supported")]
    UnsupportedVersion {
        /// The descriptor key.
        key: StoreKey,
        /// The format version found.
        found: u64,
        /// The greatest supported format version.
        supported: u64,
    },
    /// The schema is invalid.
    #[error(transparent)]
    InvalidSchema(#[from] ArraySchemaError),
    /// The compression configuration is invalid.
    #[error("invalid compression: {0}")]
    InvalidCompression(String),
    /// The index split threshold is zero.
    #[error("the index split threshold must be greater than zero")]
    InvalidIndexSplitThreshold,
    /// The descriptor could not be serialised.
    #[error("failed to serialise array descriptor: {0}")]
    Serialization(String),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ArrayDescriptor {
        let mut descriptor = ArrayDescriptor::new(
            "<v:int64,w:double> [i=0:9:0:5; j=10:19:0:5]".parse().unwrap(),
            ChunkCompression::Zstd { level: 3 },
            1000,
        )
        .unwrap();
        descriptor
            .attributes
            .insert("namespace".to_string(), "public".into());
        descriptor
    }

    #[test]
    fn array_descriptor_round_trip() {
        let key = StoreKey::new("metadata").unwrap();
        let descriptor = descriptor();
        let json = descriptor.to_json_vec().unwrap();
        assert_eq!(
            ArrayDescriptor::from_json_slice(&key, &json).unwrap(),
            descriptor
        );
    }

    #[test]
    fn array_descriptor_json() {
        let json = serde_json::to_value(descriptor()).unwrap();
        assert_eq!(json["format_version"], 1);
        assert_eq!(json["chunk_encoding"], "columnar_v1");
        assert_eq!(
            json["compression"],
            serde_json::json!({"name": "zstd", "level": 3})
        );
        assert_eq!(json["attributes"]["namespace"], "public");

        let mut descriptor = descriptor();
        descriptor.attributes.clear();
        descriptor.compression = ChunkCompression::None;
        let json = serde_json::to_value(descriptor).unwrap();
        assert!(json.get("attributes").is_none());
        assert_eq!(json["compression"], serde_json::json!({"name": "none"}));
    }

    #[test]
    fn array_descriptor_version() {
        let key = StoreKey::new("a/metadata").unwrap();
        let mut json = serde_json::to_value(descriptor()).unwrap();

        json["format_version"] = 2.into();
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(
            ArrayDescriptor::from_json_slice(&key, &bytes),
            Err(DescriptorError::UnsupportedVersion {
                found: 2,
                supported: 1,
                ..
            })
        ));

        json["format_version"] = 0.into();
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(
            ArrayDescriptor::from_json_slice(&key, &bytes),
            Err(DescriptorError::CorruptMetadata { .. })
        ));

        json.as_object_mut().unwrap().remove("format_version");
        let bytes = serde_json::to_vec(&json).unwrap();
        assert!(matches!(
            ArrayDescriptor::from_json_slice(&key, &bytes),
            Err(DescriptorError::CorruptMetadata { .. })
        ));
    }

    #[test]
    fn array_descriptor_version_checked_before_fields() {
        let key = StoreKey::new("metadata").unwrap();
        let bytes = br#"{"format_version": 7, "something_new": true}"#;
        assert!(matches!(
            ArrayDescriptor::from_json_slice(&key, bytes),
            Err(DescriptorError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn array_descriptor_corrupt() {
        let key = StoreKey::new("metadata").unwrap();
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"format_version": 1}"#,
            br#"{"format_version": 1, "schema": {"attributes": [], "dimensions": []}, "compression": {"name": "none"}, "chunk_encoding": "columnar_v1", "index_split_threshold": 10}"#,
            br#"{"format_version": 1, "schema": {"attributes": [{"name": "v", "data_type": "int64"}], "dimensions": [{"name": "i", "lower_bound": 0, "upper_bound": 9, "chunk_length": 5}]}, "compression": {"name": "gzip", "level": 12}, "chunk_encoding": "columnar_v1", "index_split_threshold": 10}"#,
            br#"{"format_version": 1, "schema": {"attributes": [{"name": "v", "data_type": "int64"}], "dimensions": [{"name": "i", "lower_bound": 0, "upper_bound": 9, "chunk_length": 5}]}, "compression": {"name": "lz4"}, "chunk_encoding": "columnar_v1", "index_split_threshold": 10}"#,
        ];
        for bytes in cases {
            assert!(matches!(
                ArrayDescriptor::from_json_slice(&key, bytes),
                Err(DescriptorError::CorruptMetadata { .. })
            ));
        }
    }

    #[test]
    fn array_descriptor_invalid() {
        let schema: ArraySchema = "<v:int64> [i=0:9]".parse().unwrap();
        assert!(matches!(
            ArrayDescriptor::new(schema.clone(), ChunkCompression::None, 0),
            Err(DescriptorError::InvalidIndexSplitThreshold)
        ));
        assert!(matches!(
            ArrayDescriptor::new(schema, ChunkCompression::Gzip { level: 10 }, 1),
            Err(DescriptorError::InvalidCompression(_))
        ));
    }
}
