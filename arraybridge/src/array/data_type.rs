//! Attribute data types.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The data type of an array attribute.
///
/// Names follow the attribute type names of array databases (e.g. `int64`, `double`, `string`).
/// Dimension columns are always [`DataType::Int64`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// `bool`
    #[display("bool")]
    Bool,
    /// `int8`
    #[display("int8")]
    Int8,
    /// `int16`
    #[display("int16")]
    Int16,
    /// `int32`
    #[display("int32")]
    Int32,
    /// `int64`
    #[display("int64")]
    Int64,
    /// `uint8`
    #[display("uint8")]
    UInt8,
    /// `uint16`
    #[display("uint16")]
    UInt16,
    /// `uint32`
    #[display("uint32")]
    UInt32,
    /// `uint64`
    #[display("uint64")]
    UInt64,
    /// `float`: a 32-bit IEEE 754 floating point number.
    #[display("float")]
    Float,
    /// `double`: a 64-bit IEEE 754 floating point number.
    #[display("double")]
    Double,
    /// `string`: a variable length UTF-8 string.
    #[display("string")]
    String,
}

impl DataType {
    /// All supported data types.
    pub const ALL: [Self; 12] = [
        Self::Bool,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::String,
    ];

    /// Returns the size in bytes of a fixed-size data type, or [`None`] for [`DataType::String`].
    #[must_use]
    pub const fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Float => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double => Some(8),
            Self::String => None,
        }
    }

    /// The tag identifying this data type in an encoded chunk.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Bool => 0,
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 3,
            Self::Int64 => 4,
            Self::UInt8 => 5,
            Self::UInt16 => 6,
            Self::UInt32 => 7,
            Self::UInt64 => 8,
            Self::Float => 9,
            Self::Double => 10,
            Self::String => 11,
        }
    }

    /// Returns the data type with encoded chunk tag `tag`.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|data_type| data_type.tag() == tag)
    }

    /// Parse a data type from its name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.to_string() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names() {
        for data_type in DataType::ALL {
            let name = data_type.to_string();
            assert_eq!(DataType::from_name(&name), Some(data_type));
            assert_eq!(
                serde_json::to_string(&data_type).unwrap(),
                format!("\"{name}\"")
            );
            assert_eq!(DataType::from_tag(data_type.tag()), Some(data_type));
        }
        assert_eq!(DataType::from_name("int128"), None);
        assert_eq!(DataType::from_tag(12), None);
    }

    #[test]
    fn data_type_serde() {
        let data_type: DataType = serde_json::from_str(r#""uint16""#).unwrap();
        assert_eq!(data_type, DataType::UInt16);
        assert!(serde_json::from_str::<DataType>(r#""UInt16""#).is_err());
        assert_eq!(DataType::Double.fixed_size(), Some(8));
        assert_eq!(DataType::String.fixed_size(), None);
    }
}
