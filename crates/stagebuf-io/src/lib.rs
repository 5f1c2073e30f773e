#![forbid(unsafe_code)]
//! stagebuf-io: concrete backing stores for staging buffers.
//!
//! - `storage::AnonymousFileStore`: unlinked local temp file (default).
//! - `memory_storage::MemoryStore`: in-memory fake with failpoints, for tests.
//!
//! `storage::build_factory_from_config` picks one from a `StagingConfig`.

pub mod memory_storage;
pub mod storage;

pub use memory_storage::{MemoryHandle, MemoryStore, MemoryStoreFactory, StoreOp};
pub use storage::{build_factory_from_config, AnonymousFileFactory, AnonymousFileStore};
