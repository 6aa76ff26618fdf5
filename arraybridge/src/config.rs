//! `arraybridge` global configuration options.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::OnceLock;

/// Global configuration options for the arraybridge crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Index Split Threshold
/// > default: `100_000`
///
/// The maximum number of chunk coordinates held by a single index segment.
/// Used by [`ArrayBuilder`](crate::array::ArrayBuilder) when a threshold is not set explicitly.
/// Arrays persist their threshold in their descriptor, so changing this does not affect existing arrays.
///
/// ## Chunk Max Size
/// > default: `2_147_483_648` (2 GiB)
///
/// The maximum size in bytes of an encoded chunk.
/// Larger chunks are rejected on write and on read.
///
/// ## Validate Checksums
/// > default: [`true`]
///
/// If enabled, the trailing checksums of chunk objects and index segments are validated on decode.
///
/// ## Chunk Concurrent Limit
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of chunks or index segments retrieved concurrently.
#[derive(Debug)]
pub struct Config {
    index_split_threshold: u64,
    chunk_max_size: u64,
    validate_checksums: bool,
    chunk_concurrent_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_split_threshold: 100_000,
            chunk_max_size: 2_147_483_648,
            validate_checksums: true,
            chunk_concurrent_limit: std::thread::available_parallelism()
                .map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

impl Config {
    /// Get the [index split threshold](#index-split-threshold) configuration.
    #[must_use]
    pub fn index_split_threshold(&self) -> u64 {
        self.index_split_threshold
    }

    /// Set the [index split threshold](#index-split-threshold) configuration.
    ///
    /// A threshold of zero is treated as one.
    pub fn set_index_split_threshold(&mut self, index_split_threshold: u64) -> &mut Self {
        self.index_split_threshold = index_split_threshold.max(1);
        self
    }

    /// Get the [chunk max size](#chunk-max-size) configuration.
    #[must_use]
    pub fn chunk_max_size(&self) -> u64 {
        self.chunk_max_size
    }

    /// Set the [chunk max size](#chunk-max-size) configuration.
    pub fn set_chunk_max_size(&mut self, chunk_max_size: u64) -> &mut Self {
        self.chunk_max_size = chunk_max_size;
        self
    }

    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) -> &mut Self {
        self.validate_checksums = validate_checksums;
        self
    }

    /// Get the [chunk concurrent limit](#chunk-concurrent-limit) configuration.
    #[must_use]
    pub fn chunk_concurrent_limit(&self) -> usize {
        self.chunk_concurrent_limit
    }

    /// Set the [chunk concurrent limit](#chunk-concurrent-limit) configuration.
    ///
    /// A limit of zero is treated as one.
    pub fn set_chunk_concurrent_limit(&mut self, concurrent_limit: usize) -> &mut Self {
        self.chunk_concurrent_limit = concurrent_limit.max(1);
        self
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global arraybridge configuration.
///
/// The global config must not already be held mutably by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global arraybridge configuration.
///
/// The global config must not already be held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn config_validate_checksums() {
        assert!(global_config().validate_checksums());
        global_config_mut().set_validate_checksums(false);
        assert!(!global_config().validate_checksums());
        global_config_mut().set_validate_checksums(true);
    }

    #[test]
    #[serial]
    fn config_index_split_threshold() {
        assert_eq!(global_config().index_split_threshold(), 100_000);
        global_config_mut().set_index_split_threshold(0);
        assert_eq!(global_config().index_split_threshold(), 1);
        global_config_mut().set_index_split_threshold(100_000);
    }

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_max_size(), 2_147_483_648);
        assert!(config.chunk_concurrent_limit() >= 1);
    }
}
