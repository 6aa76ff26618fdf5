use std::sync::Arc;

use arraybridge_storage::{ReadableStorageTraits, WritableStorageTraits};

use super::{
    Array, ArrayCreateError, ArrayDescriptor, ArraySchema, ChunkCompression, DescriptorError,
};
use crate::config::global_config;

/// An [`Array`] builder.
///
/// [`ArrayBuilder`] is initialised from an array schema.
///  - Chunks and index segments are uncompressed by default.
///  - The default index split threshold is the [global index split threshold](crate::config::Config#index-split-threshold).
///  - Attributes are empty.
///
/// Use the methods in the array builder to change the configuration away from these defaults,
/// and then create the array at a path of some storage with [`ArrayBuilder::create`].
///
/// ### Example
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # use std::sync::Arc;
/// use arraybridge::array::{ArrayBuilder, ChunkCompression};
/// # let store = Arc::new(arraybridge::storage::store::MemoryStore::new());
/// let mut attributes = serde_json::Map::new();
/// attributes.insert("namespace".to_string(), "public".into());
/// let array = ArrayBuilder::new("<v:double> [i=0:99:0:10; j=0:99:0:10]".parse()?)
///     .compression(ChunkCompression::Zstd { level: 3 })
///     .index_split_threshold(1000)
///     .attributes(attributes)
///     .create(store.clone(), "/group/array")?;
/// assert_eq!(array.descriptor().index_split_threshold, 1000);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    schema: ArraySchema,
    compression: ChunkCompression,
    index_split_threshold: Option<u64>,
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl ArrayBuilder {
    /// Create a new array builder for an array with `schema`.
    #[must_use]
    pub fn new(schema: ArraySchema) -> Self {
        Self {
            schema,
            compression: ChunkCompression::None,
            index_split_threshold: None,
            attributes: serde_json::Map::default(),
        }
    }

    /// Set the schema.
    pub fn schema(&mut self, schema: ArraySchema) -> &mut Self {
        self.schema = schema;
        self
    }

    /// Set the compression of chunks and index segments.
    pub fn compression(&mut self, compression: ChunkCompression) -> &mut Self {
        self.compression = compression;
        self
    }

    /// Set the maximum number of chunk coordinates per index segment.
    pub fn index_split_threshold(&mut self, index_split_threshold: u64) -> &mut Self {
        self.index_split_threshold = Some(index_split_threshold);
        self
    }

    /// Set the user attributes.
    pub fn attributes(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Build the array descriptor.
    ///
    /// # Errors
    /// Returns a [`DescriptorError`] if the schema, compression, or index split threshold is invalid.
    pub fn build_descriptor(&self) -> Result<ArrayDescriptor, DescriptorError> {
        let index_split_threshold = self
            .index_split_threshold
            .unwrap_or_else(|| global_config().index_split_threshold());
        let mut descriptor =
            ArrayDescriptor::new(self.schema.clone(), self.compression, index_split_threshold)?;
        descriptor.attributes.clone_from(&self.attributes);
        Ok(descriptor)
    }

    /// Create the array in `storage` at `path`, writing its descriptor.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if the descriptor is invalid, an array already exists at `path`,
    /// or there is an underlying store error.
    pub fn create<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        Array::create(storage, path, self.build_descriptor()?)
    }
}
