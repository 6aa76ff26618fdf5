//! Array schemas: ordered attributes and dimensions.

use std::{collections::HashSet, fmt::Display, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DataType;

/// The default chunk length of a dimension declared as `name=lower:upper`.
pub const DEFAULT_CHUNK_LENGTH: u64 = 1_000_000;

/// An array attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name.
    pub name: String,
    /// The attribute data type.
    pub data_type: DataType,
}

impl Attribute {
    /// Create a new attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An array dimension.
///
/// Cell coordinates along a dimension lie in `[lower_bound, upper_bound]`.
/// Chunk origins are `lower_bound + k * chunk_length`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    /// The dimension name.
    pub name: String,
    /// The inclusive lower bound.
    pub lower_bound: i64,
    /// The inclusive upper bound.
    pub upper_bound: i64,
    /// The chunk length.
    pub chunk_length: u64,
    /// The chunk overlap. Always zero.
    #[serde(default)]
    pub overlap: u64,
}

impl Dimension {
    /// Create a new dimension with zero overlap.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        lower_bound: i64,
        upper_bound: i64,
        chunk_length: u64,
    ) -> Self {
        Self {
            name: name.into(),
            lower_bound,
            upper_bound,
            chunk_length,
            overlap: 0,
        }
    }

    /// The number of cells along the dimension.
    ///
    /// This is zero if the lower bound exceeds the upper bound.
    #[must_use]
    pub fn extent(&self) -> u128 {
        (i128::from(self.upper_bound) - i128::from(self.lower_bound) + 1)
            .try_into()
            .unwrap_or(0)
    }

    /// The number of chunks along the dimension, or [`None`] if it exceeds [`u64::MAX`].
    #[must_use]
    pub fn num_chunks_checked(&self) -> Option<u64> {
        if self.chunk_length == 0 {
            Some(0)
        } else {
            self.extent()
                .div_ceil(u128::from(self.chunk_length))
                .try_into()
                .ok()
        }
    }

    /// The number of chunks along the dimension.
    ///
    /// Saturates at [`u64::MAX`], which is never reached by a dimension of a valid [`ArraySchema`].
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.num_chunks_checked().unwrap_or(u64::MAX)
    }

    /// Returns true if `value` lies within the dimension bounds.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        (self.lower_bound..=self.upper_bound).contains(&value)
    }

    fn validate(&self) -> Result<(), ArraySchemaError> {
        if self.lower_bound > self.upper_bound {
            Err(ArraySchemaError::InvalidBounds {
                name: self.name.clone(),
                lower_bound: self.lower_bound,
                upper_bound: self.upper_bound,
            })
        } else if self.chunk_length == 0 {
            Err(ArraySchemaError::InvalidChunkLength(self.name.clone()))
        } else if self.overlap != 0 {
            Err(ArraySchemaError::UnsupportedOverlap {
                name: self.name.clone(),
                overlap: self.overlap,
            })
        } else {
            Ok(())
        }
    }
}

/// An array schema error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArraySchemaError {
    /// The schema has no attributes.
    #[error("an array schema requires at least one attribute")]
    NoAttributes,
    /// The schema has no dimensions.
    #[error("an array schema requires at least one dimension")]
    NoDimensions,
    /// An attribute or dimension name is empty or repeated.
    #[error("attribute and dimension names must be unique and non-empty, found {0:?}")]
    InvalidName(String),
    /// A dimension lower bound exceeds its upper bound.
    #[error("dimension {name} has lower bound {lower_bound} greater than upper bound {upper_bound}")]
    InvalidBounds {
        /// The dimension name.
        name: String,
        /// The lower bound.
        lower_bound: i64,
        /// The upper bound.
        upper_bound: i64,
    },
    /// A dimension chunk length is zero.
    #[error("dimension {0} has a zero chunk length")]
    InvalidChunkLength(String),
    /// A dimension has a non-zero overlap.
    #[error("dimension {name} has overlap {overlap}, only zero overlap is supported")]
    UnsupportedOverlap {
        /// The dimension name.
        name: String,
        /// The overlap.
        overlap: u64,
    },
    /// The total number of chunks does not fit in a `u64`.
    #[error("the number of chunks of the array exceeds u64::MAX")]
    TooManyChunks,
    /// The schema notation could not be parsed.
    #[error("invalid array schema notation {notation:?}: {reason}")]
    InvalidNotation {
        /// The notation.
        notation: String,
        /// The reason parsing failed.
        reason: String,
    },
}

/// An array schema.
///
/// The textual notation is `<name:type,...> [name=lower:upper:overlap:chunk_length; ...]`, for example
/// ```text
/// <v:int64,w:double> [i=0:9:0:5; j=10:19:0:5]
/// ```
/// A dimension declared as `name=lower:upper` has zero overlap and a chunk length of [`DEFAULT_CHUNK_LENGTH`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArraySchema {
    /// The attributes, in column order.
    pub attributes: Vec<Attribute>,
    /// The dimensions, in column order. The first dimension varies slowest.
    pub dimensions: Vec<Dimension>,
}

impl ArraySchema {
    /// Create a new array schema.
    ///
    /// # Errors
    /// Returns an [`ArraySchemaError`] if the schema is invalid (see [`ArraySchema::validate`]).
    pub fn new(
        attributes: Vec<Attribute>,
        dimensions: Vec<Dimension>,
    ) -> Result<Self, ArraySchemaError> {
        let schema = Self {
            attributes,
            dimensions,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Validate the schema.
    ///
    /// # Errors
    /// Returns an [`ArraySchemaError`] if
    ///  - there are no attributes or no dimensions,
    ///  - a name is empty or shared by more than one attribute or dimension,
    ///  - a dimension has invalid bounds, a zero chunk length, or a non-zero overlap, or
    ///  - the total number of chunks exceeds [`u64::MAX`].
    pub fn validate(&self) -> Result<(), ArraySchemaError> {
        if self.attributes.is_empty() {
            return Err(ArraySchemaError::NoAttributes);
        }
        if self.dimensions.is_empty() {
            return Err(ArraySchemaError::NoDimensions);
        }
        let mut names = HashSet::new();
        for name in self.column_names() {
            if name.is_empty() || !names.insert(name) {
                return Err(ArraySchemaError::InvalidName(name.to_string()));
            }
        }
        for dimension in &self.dimensions {
            dimension.validate()?;
        }
        self.dimensions
            .iter()
            .try_fold(1u64, |acc, dimension| {
                acc.checked_mul(dimension.num_chunks_checked()?)
            })
            .ok_or(ArraySchemaError::TooManyChunks)?;
        Ok(())
    }

    /// The dimensionality of the array.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.dimensions.len()
    }

    /// The column names of a chunk: attributes followed by dimensions.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|attribute| attribute.name.as_str())
            .chain(self.dimensions.iter().map(|dimension| dimension.name.as_str()))
    }

    /// The column names and data types of a chunk: attributes followed by dimensions.
    pub fn columns(&self) -> impl Iterator<Item = (&str, DataType)> {
        self.attributes
            .iter()
            .map(|attribute| (attribute.name.as_str(), attribute.data_type))
            .chain(
                self.dimensions
                    .iter()
                    .map(|dimension| (dimension.name.as_str(), DataType::Int64)),
            )
    }
}

impl Display for ArraySchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{}> [{}]",
            self.attributes
                .iter()
                .map(|attribute| format!("{}:{}", attribute.name, attribute.data_type))
                .join(","),
            self.dimensions
                .iter()
                .map(|dimension| format!(
                    "{}={}:{}:{}:{}",
                    dimension.name,
                    dimension.lower_bound,
                    dimension.upper_bound,
                    dimension.overlap,
                    dimension.chunk_length
                ))
                .join("; ")
        )
    }
}

impl FromStr for ArraySchema {
    type Err = ArraySchemaError;

    fn from_str(notation: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ArraySchemaError::InvalidNotation {
            notation: notation.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = notation.trim();
        let attributes = trimmed
            .strip_prefix('<')
            .ok_or_else(|| invalid("expected `<` before attributes"))?;
        let (attributes, dimensions) = attributes
            .split_once('>')
            .ok_or_else(|| invalid("expected `>` after attributes"))?;
        let dimensions = dimensions
            .trim()
            .strip_prefix('[')
            .and_then(|dimensions| dimensions.strip_suffix(']'))
            .ok_or_else(|| invalid("expected dimensions enclosed in `[` and `]`"))?;

        let attributes = attributes
            .split(',')
            .filter(|attribute| !attribute.trim().is_empty())
            .map(|attribute| {
                let (name, data_type) = attribute
                    .split_once(':')
                    .ok_or_else(|| invalid("expected an attribute of the form `name:type`"))?;
                let data_type = DataType::from_name(data_type.trim())
                    .ok_or_else(|| invalid(&format!("unknown data type {:?}", data_type.trim())))?;
                Ok(Attribute::new(name.trim(), data_type))
            })
            .collect::<Result<Vec<_>, ArraySchemaError>>()?;

        let dimensions = dimensions
            .split(';')
            .filter(|dimension| !dimension.trim().is_empty())
            .map(|dimension| {
                let (name, range) = dimension
                    .split_once('=')
                    .ok_or_else(|| invalid("expected a dimension of the form `name=lower:upper`"))?;
                let parts = range.split(':').map(str::trim).collect_vec();
                let int = |part: &str| {
                    part.parse::<i64>()
                        .map_err(|_| invalid(&format!("invalid integer {part:?}")))
                };
                let uint = |part: &str| {
                    part.parse::<u64>()
                        .map_err(|_| invalid(&format!("invalid unsigned integer {part:?}")))
                };
                match parts.as_slice() {
                    [lower, upper] => Ok(Dimension::new(
                        name.trim(),
                        int(lower)?,
                        int(upper)?,
                        DEFAULT_CHUNK_LENGTH,
                    )),
                    [lower, upper, overlap, chunk_length] => Ok(Dimension {
                        name: name.trim().to_string(),
                        lower_bound: int(lower)?,
                        upper_bound: int(upper)?,
                        chunk_length: uint(chunk_length)?,
                        overlap: uint(overlap)?,
                    }),
                    _ => Err(invalid(
                        "expected `name=lower:upper` or `name=lower:upper:overlap:chunk_length`",
                    )),
                }
            })
            .collect::<Result<Vec<_>, ArraySchemaError>>()?;

        Self::new(attributes, dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_schema_notation() {
        let schema: ArraySchema = "<v:int64,w:double> [i=0:9:0:5; j=10:19:0:5]".parse().unwrap();
        assert_eq!(
            schema.attributes,
            vec![
                Attribute::new("v", DataType::Int64),
                Attribute::new("w", DataType::Double)
            ]
        );
        assert_eq!(
            schema.dimensions,
            vec![Dimension::new("i", 0, 9, 5), Dimension::new("j", 10, 19, 5)]
        );
        assert_eq!(
            schema.to_string(),
            "<v:int64,w:double> [i=0:9:0:5; j=10:19:0:5]"
        );
        assert_eq!(schema.to_string().parse::<ArraySchema>().unwrap(), schema);
        assert_eq!(
            schema.column_names().collect::<Vec<_>>(),
            vec!["v", "w", "i", "j"]
        );
    }

    #[test]
    fn array_schema_notation_default_chunk_length() {
        let schema: ArraySchema = "<x:string> [i=-5:4]".parse().unwrap();
        assert_eq!(schema.dimensions[0].chunk_length, DEFAULT_CHUNK_LENGTH);
        assert_eq!(schema.dimensions[0].extent(), 10);
        assert_eq!(schema.dimensions[0].num_chunks(), 1);
    }

    #[test]
    fn array_schema_notation_invalid() {
        for notation in [
            "v:int64 [i=0:9]",
            "<v:int64 [i=0:9]",
            "<v:int64> i=0:9",
            "<v:int128> [i=0:9]",
            "<v> [i=0:9]",
            "<v:int64> [i=0:9:0]",
            "<v:int64> [i=a:9]",
            "<v:int64> [i]",
        ] {
            assert!(matches!(
                notation.parse::<ArraySchema>(),
                Err(ArraySchemaError::InvalidNotation { .. })
            ));
        }
    }

    #[test]
    fn array_schema_validate() {
        assert_eq!(
            "<> [i=0:9]".parse::<ArraySchema>(),
            Err(ArraySchemaError::NoAttributes)
        );
        assert_eq!(
            "<v:int64> []".parse::<ArraySchema>(),
            Err(ArraySchemaError::NoDimensions)
        );
        assert_eq!(
            "<i:int64> [i=0:9]".parse::<ArraySchema>(),
            Err(ArraySchemaError::InvalidName("i".to_string()))
        );
        assert!(matches!(
            "<v:int64> [i=9:0]".parse::<ArraySchema>(),
            Err(ArraySchemaError::InvalidBounds { .. })
        ));
        assert_eq!(
            "<v:int64> [i=0:9:0:0]".parse::<ArraySchema>(),
            Err(ArraySchemaError::InvalidChunkLength("i".to_string()))
        );
        assert!(matches!(
            "<v:int64> [i=0:9:1:5]".parse::<ArraySchema>(),
            Err(ArraySchemaError::UnsupportedOverlap { .. })
        ));
        let full_range = format!("<v:int64> [i={}:{}:0:1]", i64::MIN, i64::MAX);
        assert_eq!(
            full_range.parse::<ArraySchema>(),
            Err(ArraySchemaError::TooManyChunks)
        );
        assert_eq!(
            "<v:int64> [i=0:4294967295:0:1; j=0:4294967295:0:1; k=0:4294967295:0:1]"
                .parse::<ArraySchema>(),
            Err(ArraySchemaError::TooManyChunks)
        );
    }

    #[test]
    fn dimension_extent() {
        let dimension = Dimension::new("i", 0, 19, 5);
        assert_eq!(dimension.extent(), 20);
        assert_eq!(dimension.num_chunks(), 4);
        let dimension = Dimension::new("i", 0, 20, 5);
        assert_eq!(dimension.num_chunks(), 5);
        assert!(dimension.contains(20));
        assert!(!dimension.contains(21));
    }
}
