#![allow(missing_docs)]

use std::error::Error;

use arraybridge_filesystem::FilesystemStore;
use arraybridge_storage::{ListableStorageTraits, ReadableStorageTraits, WritableStorageTraits};

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let store = FilesystemStore::new(path.path())?.sorted();
    arraybridge_storage::store_test::store_write(&store)?;
    arraybridge_storage::store_test::store_read(&store)?;
    arraybridge_storage::store_test::store_list(&store)?;
    Ok(())
}

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem_missing_base_path() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let store = FilesystemStore::new(path.path().join("not/yet/created"))?;
    assert!(store.list()?.is_empty());
    assert!(store.list_prefix(&"a/".try_into()?)?.is_empty());
    assert!(store.get(&"a/b".try_into()?)?.is_none());
    store.erase_prefix(&"a/".try_into()?)?;
    store.set(&"a/b".try_into()?, vec![1, 2].into())?;
    assert_eq!(store.get(&"a/b".try_into()?)?, Some(vec![1, 2].into()));
    Ok(())
}

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem_shared_between_stores() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let writer = FilesystemStore::new(path.path())?;
    writer.set(&"array/chunks/c_0".try_into()?, vec![7].into())?;
    let reader = FilesystemStore::new(path.path())?;
    assert_eq!(
        reader.list_prefix(&"array/".try_into()?)?,
        &["array/chunks/c_0".try_into()?]
    );
    assert_eq!(reader.size_key(&"array/chunks/c_0".try_into()?)?, Some(1));
    Ok(())
}
