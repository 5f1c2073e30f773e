#![forbid(unsafe_code)]
//! stagebuf-staging: the dirty-tracking staging buffer.
//!
//! A `StagingBuffer` owns one backing store seeded with an object's original
//! content and answers two questions without rescanning it: how big is the
//! content now, and below which offset is it still byte-identical to the
//! original. The write-back layer uses `stat()` to choose between a delta and
//! a full upload.

pub mod buffer;
pub mod verify;

pub use buffer::StagingBuffer;
