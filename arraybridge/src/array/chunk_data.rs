//! Column oriented chunk data.
//!
//! A [`ChunkData`] holds the rows of a chunk (or of many chunks, before [partitioning](ChunkData::partition))
//! as named, typed columns of equal length.

use std::collections::BTreeMap;

use itertools::Itertools;

use super::{ArraySchema, ChunkCodecError, ChunkCoordinate, ChunkGrid, DataType};

macro_rules! column_values {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// The values of a column.
        #[derive(Clone, Debug, PartialEq)]
        pub enum ColumnValues {
            $(
                #[doc = concat!("[`DataType::", stringify!($variant), "`] values.")]
                $variant(Vec<$ty>),
            )*
        }

        impl ColumnValues {
            /// Create an empty column of `data_type`.
            #[must_use]
            pub fn new_empty(data_type: DataType) -> Self {
                match data_type {
                    $(DataType::$variant => Self::$variant(Vec::new()),)*
                }
            }

            /// The data type of the values.
            #[must_use]
            pub fn data_type(&self) -> DataType {
                match self {
                    $(Self::$variant(_) => DataType::$variant,)*
                }
            }

            /// The number of values.
            #[must_use]
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(values) => values.len(),)*
                }
            }

            /// Select the values at `rows`, in order.
            ///
            /// # Panics
            /// Panics if a row is out of bounds.
            #[must_use]
            pub fn select(&self, rows: &[usize]) -> Self {
                match self {
                    $(Self::$variant(values) => {
                        Self::$variant(rows.iter().map(|&row| values[row].clone()).collect())
                    })*
                }
            }
        }

        $(
            impl From<Vec<$ty>> for ColumnValues {
                fn from(values: Vec<$ty>) -> Self {
                    Self::$variant(values)
                }
            }
        )*
    };
}

column_values!(
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
);

impl ColumnValues {
    /// Returns true if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the values if this is an [`Int64`](ColumnValues::Int64) column.
    #[must_use]
    pub fn as_int64(&self) -> Option<&[i64]> {
        if let Self::Int64(values) = self {
            Some(values)
        } else {
            None
        }
    }
}

impl From<Vec<&str>> for ColumnValues {
    fn from(values: Vec<&str>) -> Self {
        Self::String(values.into_iter().map(str::to_string).collect())
    }
}

/// A named column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// The column name.
    pub name: String,
    /// The column values.
    pub values: ColumnValues,
}

impl Column {
    /// Create a new column.
    #[must_use]
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// The rows of a chunk as columns.
///
/// A chunk of an array has one column per attribute followed by one [`DataType::Int64`] column per dimension,
/// holding the cell coordinate of each row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkData {
    columns: Vec<Column>,
}

impl ChunkData {
    /// Create chunk data from `columns`.
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Create chunk data from `(name, values)` pairs.
    pub fn from_columns<N: Into<String>>(
        columns: impl IntoIterator<Item = (N, ColumnValues)>,
    ) -> Self {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }

    /// Create chunk data with no rows and the columns of `schema`.
    #[must_use]
    pub fn new_empty(schema: &ArraySchema) -> Self {
        Self::from_columns(
            schema
                .columns()
                .map(|(name, data_type)| (name, ColumnValues::new_empty(data_type))),
        )
    }

    /// The columns.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Consume the chunk data and return its columns.
    #[must_use]
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// The values of the column named `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| &column.values)
    }

    /// The number of rows, the length of the first column.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |column| column.values.len())
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Select `rows`, in order.
    ///
    /// # Panics
    /// Panics if a row is out of bounds.
    #[must_use]
    pub fn select(&self, rows: &[usize]) -> Self {
        Self::new(
            self.columns
                .iter()
                .map(|column| Column::new(column.name.clone(), column.values.select(rows)))
                .collect(),
        )
    }

    /// Check that the columns match the names, order, and data types of `schema` columns and have equal lengths.
    ///
    /// # Errors
    /// Returns [`ChunkCodecError::SchemaMismatch`] or [`ChunkCodecError::ColumnLengthMismatch`].
    pub fn validate(&self, schema: &ArraySchema) -> Result<(), ChunkCodecError> {
        let matches = self.columns.len() == schema.columns().count()
            && self
                .columns
                .iter()
                .zip(schema.columns())
                .all(|(column, (name, data_type))| {
                    column.name == name && column.values.data_type() == data_type
                });
        if !matches {
            return Err(ChunkCodecError::SchemaMismatch {
                expected: schema
                    .columns()
                    .map(|(name, data_type)| format!("{name}:{data_type}"))
                    .join(","),
                found: self.describe_columns(),
            });
        }
        let num_rows = self.num_rows();
        if let Some(column) = self
            .columns
            .iter()
            .find(|column| column.values.len() != num_rows)
        {
            return Err(ChunkCodecError::ColumnLengthMismatch {
                column: column.name.clone(),
                expected: num_rows,
                found: column.values.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn describe_columns(&self) -> String {
        self.columns
            .iter()
            .map(|column| format!("{}:{}", column.name, column.values.data_type()))
            .join(",")
    }

    pub(crate) fn dimension_columns<'a>(&'a self, schema: &ArraySchema) -> Vec<&'a [i64]> {
        self.columns[schema.attributes.len()..]
            .iter()
            .filter_map(|column| column.values.as_int64())
            .collect()
    }

    /// Split rows covering many chunks into one [`ChunkData`] per chunk, keyed by chunk coordinate.
    ///
    /// The chunk of each row is the chunk containing the cell given by its dimension columns.
    /// Rows keep their relative order, and chunks are returned in rank order.
    ///
    /// # Errors
    /// Returns a [`ChunkCodecError`] if the columns do not match `schema` or a cell is outside the array bounds.
    pub fn partition(
        &self,
        schema: &ArraySchema,
        grid: &ChunkGrid,
    ) -> Result<BTreeMap<ChunkCoordinate, ChunkData>, ChunkCodecError> {
        self.validate(schema)?;
        let dimension_columns = self.dimension_columns(schema);
        let mut rows_per_chunk: BTreeMap<ChunkCoordinate, Vec<usize>> = BTreeMap::new();
        let mut cell = vec![0; dimension_columns.len()];
        for row in 0..self.num_rows() {
            for (value, column) in cell.iter_mut().zip(&dimension_columns) {
                *value = column[row];
            }
            let coordinate = grid.chunk_origin_of_cell(&cell)?;
            rows_per_chunk.entry(coordinate).or_default().push(row);
        }
        Ok(rows_per_chunk
            .into_iter()
            .map(|(coordinate, rows)| (coordinate, self.select(&rows)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ArraySchema {
        "<v:double,s:string> [i=0:19:0:5; j=0:9:0:10]".parse().unwrap()
    }

    fn rows() -> ChunkData {
        ChunkData::from_columns([
            ("v", vec![0.5f64, 1.5, 2.5, 3.5].into()),
            ("s", vec!["a", "b", "c", "d"].into()),
            ("i", vec![12i64, 0, 13, 4].into()),
            ("j", vec![0i64, 1, 2, 3].into()),
        ])
    }

    #[test]
    fn chunk_data_accessors() {
        let rows = rows();
        assert_eq!(rows.num_rows(), 4);
        assert!(!rows.is_empty());
        assert_eq!(rows.column("i").unwrap().as_int64(), Some(&[12, 0, 13, 4][..]));
        assert!(rows.column("x").is_none());
        assert_eq!(
            rows.select(&[3, 1]).column("s"),
            Some(&ColumnValues::from(vec!["d", "b"]))
        );
        assert!(ChunkData::new_empty(&schema()).is_empty());
        assert_eq!(ChunkData::new_empty(&schema()).columns().len(), 4);
    }

    #[test]
    fn chunk_data_validate() {
        let schema = schema();
        rows().validate(&schema).unwrap();

        let reordered = ChunkData::from_columns([
            ("s", vec!["a"].into()),
            ("v", vec![0.5f64].into()),
            ("i", vec![0i64].into()),
            ("j", vec![0i64].into()),
        ]);
        assert!(matches!(
            reordered.validate(&schema),
            Err(ChunkCodecError::SchemaMismatch { .. })
        ));

        let short = ChunkData::from_columns([
            ("v", vec![0.5f64, 1.5].into()),
            ("s", vec!["a", "b"].into()),
            ("i", vec![0i64].into()),
            ("j", vec![0i64, 1].into()),
        ]);
        assert!(matches!(
            short.validate(&schema),
            Err(ChunkCodecError::ColumnLengthMismatch { found: 1, .. })
        ));
    }

    #[test]
    fn chunk_data_partition() {
        let schema = schema();
        let grid = ChunkGrid::new(&schema.dimensions);
        let chunks = rows().partition(&schema, &grid).unwrap();
        assert_eq!(
            chunks.keys().cloned().collect::<Vec<_>>(),
            vec![vec![0, 0], vec![10, 0]]
        );
        assert_eq!(
            chunks[&vec![0, 0]].column("v"),
            Some(&ColumnValues::from(vec![1.5f64, 3.5]))
        );
        assert_eq!(
            chunks[&vec![10, 0]].column("i"),
            Some(&ColumnValues::from(vec![12i64, 13]))
        );

        let outside = ChunkData::from_columns([
            ("v", vec![0.5f64].into()),
            ("s", vec!["a"].into()),
            ("i", vec![20i64].into()),
            ("j", vec![0i64].into()),
        ]);
        assert!(matches!(
            outside.partition(&schema, &grid),
            Err(ChunkCodecError::ChunkGridError(_))
        ));
    }
}
