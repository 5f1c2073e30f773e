//! Store factories implementing `stagebuf_core::StoreFactory`.
//!
//! - `fs`: anonymous local files (default).
//!
//! Also exposes a helper that chooses the factory from the configured store
//! URI (e.g. `file:///var/tmp/stage`, `memory://`).

mod fs;
pub use fs::{AnonymousFileFactory, AnonymousFileStore};

use stagebuf_core::config::StagingConfig;
use stagebuf_core::error::{Error, Result};
use stagebuf_core::store::StoreFactory;

use crate::memory_storage::MemoryStoreFactory;

/// Build the correct store factory using the provided configuration.
pub fn build_factory_from_config(cfg: &StagingConfig) -> Result<Box<dyn StoreFactory>> {
    match cfg.scheme() {
        Some("memory") | Some("mem") => Ok(Box::new(MemoryStoreFactory::new())),
        Some("file") | None => {
            // Default to anonymous files (treat URI as file:// or bare path).
            Ok(Box::new(AnonymousFileFactory::new()))
        }
        Some(other) => Err(Error::Config(format!("unsupported store scheme '{other}'"))),
    }
}
