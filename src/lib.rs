#![forbid(unsafe_code)]
//! stagebuf: local write-back staging buffers.
//!
//! Re-exports the pieces an upload layer needs: create a [`StagingBuffer`]
//! from an object's content, mutate it, and call `stat()` to learn the size
//! and the lowest offset that has diverged from the original.

pub use stagebuf_core::prelude::*;
pub use stagebuf_io::{
    build_factory_from_config, AnonymousFileFactory, AnonymousFileStore, MemoryHandle,
    MemoryStore, MemoryStoreFactory, StoreOp,
};
pub use stagebuf_staging::{verify, StagingBuffer};
