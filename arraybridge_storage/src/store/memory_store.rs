//! A synchronous in-memory store.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeys, StorePrefix, WritableStorageTraits,
};

/// A synchronous in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: Mutex<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    /// Create a new memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.lock().len()
    }

    /// Returns true if the store holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.lock().is_empty()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.lock().get(key).cloned())
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self
            .data_map
            .lock()
            .get(key)
            .map(|entry| entry.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.data_map.lock().insert(key.clone(), value);
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.lock().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.data_map.lock().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        Ok(self.data_map.lock().keys().cloned().collect())
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .lock()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn memory_set() -> Result<(), Box<dyn Error>> {
        let store = MemoryStore::new();
        let key = "a/b".try_into()?;
        store.set(&key, vec![0, 1, 2].into())?;
        assert_eq!(store.get(&key)?.unwrap(), vec![0, 1, 2]);
        store.set(&key, vec![3].into())?;
        assert_eq!(store.get(&key)?.unwrap(), vec![3]);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn memory_list_prefix() -> Result<(), Box<dyn Error>> {
        let store = MemoryStore::new();
        store.set(&"a/b".try_into()?, Bytes::new())?;
        store.set(&"a/c/d".try_into()?, Bytes::new())?;
        store.set(&"ab".try_into()?, Bytes::new())?;
        store.set(&"b".try_into()?, Bytes::new())?;
        assert_eq!(
            store.list_prefix(&"a/".try_into()?)?,
            &["a/b".try_into()?, "a/c/d".try_into()?]
        );
        assert_eq!(store.list_prefix(&StorePrefix::root())?.len(), 4);
        assert!(store.list_prefix(&"z/".try_into()?)?.is_empty());
        Ok(())
    }

    #[test]
    fn memory_erase_prefix() -> Result<(), Box<dyn Error>> {
        let store = MemoryStore::new();
        store.set(&"a/b".try_into()?, Bytes::new())?;
        store.set(&"a/c".try_into()?, Bytes::new())?;
        store.set(&"b".try_into()?, Bytes::new())?;
        store.erase_prefix(&"a/".try_into()?)?;
        assert_eq!(store.list()?, &["b".try_into()?]);
        Ok(())
    }
}
