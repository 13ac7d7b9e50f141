//! purse-storage-json
//!
//! Key-value persistence (`FileKeyValueStore`, `MemoryKeyValueStore`) and the
//! single-document fallback local store (`BlobStore`) built on top of it.

pub mod blob;
pub mod key_value;

pub use blob::BlobStore;
pub use key_value::{FileKeyValueStore, MemoryKeyValueStore};
