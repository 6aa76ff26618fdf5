//! `arraybridge` is a Rust library for persisting large, possibly sparse, multidimensional arrays
//! as a collection of independently addressable chunk objects in a store.
//!
//! An array is made of three families of objects under its path:
//! - a single JSON *descriptor* (`metadata`) holding the schema, chunk geometry, compression, and format version,
//! - zero or more immutable *index segments* (`index/`) recording which chunks exist, and
//! - one *chunk* object per populated chunk (`chunks/`), holding attribute columns and materialized dimension columns.
//!
//! The chunk index is authoritative: a chunk is only visible to readers once it is recorded in the index,
//! and a chunk object is always durable before its index entry is recorded.
//!
//! ## Example
//! ```
//! # use std::sync::Arc;
//! use arraybridge::array::{Array, ArrayBuilder, ArraySchema, ChunkData};
//! use arraybridge::storage::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let schema: ArraySchema = "<v:int64> [i=0:19:0:5]".parse()?;
//! let array = ArrayBuilder::new(schema)
//!     .index_split_threshold(2)
//!     .create(store.clone(), "/points")?;
//!
//! // Write rows spanning several chunks
//! let rows = ChunkData::from_columns([
//!     ("v", (0..20).map(|x| x * 10).collect::<Vec<i64>>().into()),
//!     ("i", (0..20).collect::<Vec<i64>>().into()),
//! ]);
//! array.put_rows(&rows)?;
//! array.finalize()?;
//!
//! // Read from another handle
//! let array = Array::open(store, "/points")?;
//! assert_eq!(array.list_chunks()?, vec![vec![0], vec![5], vec![10], vec![15]]);
//! let chunk = array.get_chunk(&[10])?;
//! assert_eq!(chunk.num_rows(), 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `filesystem`: Re-export [`arraybridge_filesystem`] as [`arraybridge::filesystem`](crate::filesystem).
//!  - Compression: `gzip`, `zstd`.
//!
//! ## Licence
//! `arraybridge` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::wildcard_enum_match_arm)]

pub mod array;
pub mod config;
pub mod location;

#[cfg(feature = "filesystem")]
pub use arraybridge_filesystem as filesystem;
pub use arraybridge_storage as storage;

use rayon_iter_concurrent_limit::iter_concurrent_limit;
