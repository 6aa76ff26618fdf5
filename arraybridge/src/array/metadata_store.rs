//! Reading and writing the array descriptor.

use std::sync::Arc;

use arraybridge_storage::{ReadableStorageTraits, StoreKey, WritableStorageTraits};

use super::{ArrayDescriptor, ArrayPath, DescriptorError};

/// How [`MetadataStore::write`] treats an existing descriptor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DescriptorWriteMode {
    /// Fail with [`DescriptorError::AlreadyExists`] if a descriptor exists.
    #[default]
    CreateNew,
    /// Replace any existing descriptor.
    Overwrite,
}

/// Reads and writes the descriptor of the array at a path.
pub struct MetadataStore<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    key: StoreKey,
}

impl<TStorage: ?Sized> MetadataStore<TStorage> {
    /// Create a metadata store for the array at `path`.
    #[must_use]
    pub fn new(storage: Arc<TStorage>, path: &ArrayPath) -> Self {
        Self {
            storage,
            key: path.descriptor_key(),
        }
    }

    /// The key of the descriptor.
    #[must_use]
    pub fn key(&self) -> &StoreKey {
        &self.key
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> MetadataStore<TStorage> {
    /// Returns true if a descriptor exists.
    ///
    /// # Errors
    /// Returns a [`DescriptorError::StorageError`] if there is an underlying storage error.
    pub fn exists(&self) -> Result<bool, DescriptorError> {
        Ok(self.storage.size_key(&self.key)?.is_some())
    }

    /// Read the descriptor.
    ///
    /// # Errors
    /// Returns
    ///  - [`DescriptorError::NotFound`] if there is no descriptor,
    ///  - [`DescriptorError::CorruptMetadata`] or [`DescriptorError::UnsupportedVersion`] if it cannot be parsed, or
    ///  - [`DescriptorError::StorageError`] if there is an underlying storage error.
    pub fn read(&self) -> Result<ArrayDescriptor, DescriptorError> {
        let bytes = self
            .storage
            .get(&self.key)?
            .ok_or_else(|| DescriptorError::NotFound(self.key.clone()))?;
        ArrayDescriptor::from_json_slice(&self.key, &bytes)
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> MetadataStore<TStorage> {
    /// Validate and write `descriptor`.
    ///
    /// # Errors
    /// Returns
    ///  - [`DescriptorError::AlreadyExists`] if `mode` is [`DescriptorWriteMode::CreateNew`] and a descriptor exists,
    ///  - another [`DescriptorError`] if the descriptor is invalid, or
    ///  - [`DescriptorError::StorageError`] if there is an underlying storage error.
    pub fn write(
        &self,
        descriptor: &ArrayDescriptor,
        mode: DescriptorWriteMode,
    ) -> Result<(), DescriptorError> {
        descriptor.validate()?;
        if mode == DescriptorWriteMode::CreateNew && self.exists()? {
            return Err(DescriptorError::AlreadyExists(self.key.clone()));
        }
        let json = descriptor.to_json_vec()?;
        self.storage.set(&self.key, json.into())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use arraybridge_storage::store::MemoryStore;

    use super::*;
    use crate::array::ChunkCompression;

    fn descriptor() -> ArrayDescriptor {
        ArrayDescriptor::new(
            "<v:int64> [i=0:9:0:5]".parse().unwrap(),
            ChunkCompression::None,
            10,
        )
        .unwrap()
    }

    #[test]
    fn metadata_store_write_read() {
        let store = Arc::new(MemoryStore::new());
        let metadata_store = MetadataStore::new(store.clone(), &ArrayPath::new("/a").unwrap());
        assert_eq!(metadata_store.key().as_str(), "a/metadata");
        assert!(!metadata_store.exists().unwrap());
        assert!(matches!(
            metadata_store.read(),
            Err(DescriptorError::NotFound(_))
        ));

        metadata_store
            .write(&descriptor(), DescriptorWriteMode::CreateNew)
            .unwrap();
        assert!(metadata_store.exists().unwrap());
        assert_eq!(metadata_store.read().unwrap(), descriptor());

        assert!(matches!(
            metadata_store.write(&descriptor(), DescriptorWriteMode::CreateNew),
            Err(DescriptorError::AlreadyExists(_))
        ));

        let mut replacement = descriptor();
        replacement.index_split_threshold = 20;
        metadata_store
            .write(&replacement, DescriptorWriteMode::Overwrite)
            .unwrap();
        assert_eq!(metadata_store.read().unwrap().index_split_threshold, 20);
    }

    #[test]
    fn metadata_store_invalid() {
        let store = Arc::new(MemoryStore::new());
        let metadata_store = MetadataStore::new(store.clone(), &ArrayPath::root());
        let mut invalid = descriptor();
        invalid.index_split_threshold = 0;
        assert!(matches!(
            metadata_store.write(&invalid, DescriptorWriteMode::CreateNew),
            Err(DescriptorError::InvalidIndexSplitThreshold)
        ));
        assert!(!metadata_store.exists().unwrap());

        store
            .set(metadata_store.key(), br#"{"format_version": 2}"#.to_vec().into())
            .unwrap();
        assert!(matches!(
            metadata_store.read(),
            Err(DescriptorError::UnsupportedVersion {
                found: 2,
                supported: 1,
                ..
            })
        ));
    }
}
