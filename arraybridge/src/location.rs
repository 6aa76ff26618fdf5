//! Array locations as URLs.
//!
//! A location URL selects a store and the array within it:
//!  - `file:///path/to/array`: a [`FilesystemStore`](crate::filesystem::FilesystemStore) rooted at `/path/to/array`, with the array at `/`.
//!
//! Object store URLs such as `s3://bucket/path` are recognised but unsupported.

use std::sync::Arc;

use thiserror::Error;

use arraybridge_storage::{ReadableWritableListableStorage, ReadableWritableListableStorageTraits};

use crate::array::{Array, ArrayCreateError, ArrayDescriptor, ArrayPath};

/// A location error.
#[derive(Debug, Error)]
pub enum LocationError {
    /// The URL could not be parsed or does not identify a valid location.
    #[error("invalid location URL {url}: {reason}")]
    InvalidUrl {
        /// The URL.
        url: String,
        /// The reason the URL is invalid.
        reason: String,
    },
    /// The URL scheme is not supported.
    #[error("unsupported location URL scheme {0}")]
    UnsupportedScheme(String),
    /// The array could not be opened or created.
    #[error(transparent)]
    ArrayCreateError(#[from] ArrayCreateError),
}

/// Create the store for the location `url`, and return it with the path of the array in the store.
///
/// # Errors
/// Returns a [`LocationError`] if the URL is invalid, its scheme is unsupported, or the store cannot be created.
pub fn storage_from_url(
    url: &str,
) -> Result<(ReadableWritableListableStorage, ArrayPath), LocationError> {
    let invalid = |reason: String| LocationError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = url::Url::parse(url).map_err(|err| invalid(err.to_string()))?;
    match parsed.scheme() {
        #[cfg(feature = "filesystem")]
        "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|()| invalid("not an absolute file path".to_string()))?;
            let storage: ReadableWritableListableStorage = Arc::new(
                crate::filesystem::FilesystemStore::new(path)
                    .map_err(|err| invalid(err.to_string()))?,
            );
            Ok((storage, ArrayPath::root()))
        }
        scheme => Err(LocationError::UnsupportedScheme(scheme.to_string())),
    }
}

/// Open the existing array at the location `url`.
///
/// # Errors
/// Returns a [`LocationError`] if the location is invalid or the array cannot be opened.
pub fn open_url(
    url: &str,
) -> Result<Array<dyn ReadableWritableListableStorageTraits>, LocationError> {
    let (storage, path) = storage_from_url(url)?;
    Ok(Array::open(storage, path.as_str())?)
}

/// Create a new array with `descriptor` at the location `url`.
///
/// # Errors
/// Returns a [`LocationError`] if the location is invalid or the array cannot be created.
pub fn create_url(
    url: &str,
    descriptor: ArrayDescriptor,
) -> Result<Array<dyn ReadableWritableListableStorageTraits>, LocationError> {
    let (storage, path) = storage_from_url(url)?;
    Ok(Array::create(storage, path.as_str(), descriptor)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_unsupported() {
        assert!(matches!(
            storage_from_url("s3://bucket/array"),
            Err(LocationError::UnsupportedScheme(scheme)) if scheme == "s3"
        ));
        assert!(matches!(
            storage_from_url("not a url"),
            Err(LocationError::InvalidUrl { .. })
        ));
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn location_file() {
        use crate::array::{ArrayBuilder, ChunkData};

        let directory = tempfile::TempDir::new().unwrap();
        let url = url::Url::from_directory_path(directory.path())
            .unwrap()
            .to_string();
        assert!(matches!(
            open_url(&url),
            Err(LocationError::ArrayCreateError(ArrayCreateError::DescriptorError(_)))
        ));

        let descriptor = ArrayBuilder::new("<v:int64> [i=0:9:0:5]".parse().unwrap())
            .build_descriptor()
            .unwrap();
        let array = create_url(&url, descriptor.clone()).unwrap();
        array
            .put_chunk(
                &[5],
                &ChunkData::from_columns([("v", vec![1i64].into()), ("i", vec![6i64].into())]),
            )
            .unwrap();
        array.finalize().unwrap();

        let array = open_url(&url).unwrap();
        assert_eq!(array.descriptor(), &descriptor);
        assert_eq!(array.list_chunks().unwrap(), vec![vec![5]]);
        assert!(directory.path().join("metadata").is_file());
    }
}
